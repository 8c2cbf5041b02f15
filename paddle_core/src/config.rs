//! Configuration types for the controller.
//!
//! These are the runtime configuration structs used by `Controller`.
//! They are separate from the TOML-deserialized config in `paddle_config`.

use core::f32::consts::PI;

use crate::dynamics::{Coefficients, ForceLaw};

/// Signal conditioning applied during preprocessing.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    /// Paddle radians per encoder revolution (gear reduction folded in).
    pub rad_per_rev: f32,
    /// +1.0 or -1.0 so a push in the positive direction reads positive.
    pub force_sign: f32,
    /// Low-pass cutoff for the differentiated velocity.
    pub velocity_cutoff_hz: f32,
    /// Low-pass cutoff for the force reading.
    pub force_cutoff_hz: f32,
    /// When false the raw force is used as-is.
    pub force_filter: bool,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            rad_per_rev: 2.0 * PI / 4.0,
            force_sign: 1.0,
            velocity_cutoff_hz: 30.0,
            force_cutoff_hz: 50.0,
            force_filter: true,
        }
    }
}

/// End-stop search.
#[derive(Debug, Clone)]
pub struct CalibrateCfg {
    /// Command used to push into the end stops (enough to beat friction).
    pub drive_command: f32,
    /// Below this |velocity| [rad/s] the paddle counts as still.
    pub still_velocity: f32,
    /// Stillness longer than this marks an end stop.
    pub dwell_ms: u64,
}

impl Default for CalibrateCfg {
    fn default() -> Self {
        Self {
            drive_command: 0.15,
            still_velocity: 0.1,
            dwell_ms: 1000,
        }
    }
}

/// Virtual dynamics tracking.
#[derive(Debug, Clone)]
pub struct RunCfg {
    /// Virtual position is kept within ±limit [rad].
    pub position_limit: f32,
    /// Initial actuator saturation bound; live value sits in `Params`.
    pub max_command: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Derivative filter cutoff; 0 disables.
    pub derivative_cutoff_hz: f32,
}

impl Default for RunCfg {
    fn default() -> Self {
        Self {
            position_limit: 2.0,
            max_command: 0.5,
            kp: 5.0,
            ki: 0.1,
            kd: 0.0,
            derivative_cutoff_hz: 50.0,
        }
    }
}

/// Re-entry debounce.
#[derive(Debug, Clone)]
pub struct IdleCfg {
    /// Press counter must exceed this to resume Run.
    pub resume_ticks: u32,
}

impl Default for IdleCfg {
    fn default() -> Self {
        Self { resume_ticks: 500 }
    }
}

#[derive(Debug, Clone)]
pub struct DynamicsCfg {
    pub law: ForceLaw,
    pub coefficients: Coefficients,
}

impl Default for DynamicsCfg {
    fn default() -> Self {
        Self {
            law: ForceLaw::SpringDamper,
            coefficients: Coefficients::default(),
        }
    }
}

/// Everything the controller needs besides its devices.
#[derive(Debug, Clone)]
pub struct ControllerCfg {
    /// Loop rate; one `tick()` per period.
    pub sample_rate_hz: u32,
    /// Half-period of the liveness LED.
    pub heartbeat_ms: u64,
    pub sensor: SensorCfg,
    pub dynamics: DynamicsCfg,
    pub calibrate: CalibrateCfg,
    pub run: RunCfg,
    pub idle: IdleCfg,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 500,
            heartbeat_ms: 500,
            sensor: SensorCfg::default(),
            dynamics: DynamicsCfg::default(),
            calibrate: CalibrateCfg::default(),
            run: RunCfg::default(),
            idle: IdleCfg::default(),
        }
    }
}
