//! `From` implementations bridging `paddle_config` types to `paddle_core` types.

use crate::config::{CalibrateCfg, ControllerCfg, DynamicsCfg, IdleCfg, RunCfg, SensorCfg};
use crate::dynamics::{Coefficients, ForceLaw};

impl From<paddle_config::LawKind> for ForceLaw {
    fn from(k: paddle_config::LawKind) -> Self {
        match k {
            paddle_config::LawKind::Damper => ForceLaw::Damper,
            paddle_config::LawKind::SpringDamper => ForceLaw::SpringDamper,
        }
    }
}

impl From<&paddle_config::DynamicsCfg> for DynamicsCfg {
    fn from(c: &paddle_config::DynamicsCfg) -> Self {
        Self {
            law: c.law.into(),
            coefficients: Coefficients {
                mass: c.mass,
                damping: c.damping,
                stiffness: c.stiffness,
            },
        }
    }
}

impl From<&paddle_config::CalibrationCfg> for CalibrateCfg {
    fn from(c: &paddle_config::CalibrationCfg) -> Self {
        Self {
            drive_command: c.drive_command,
            still_velocity: c.still_velocity,
            dwell_ms: c.dwell_ms,
        }
    }
}

impl From<&paddle_config::RunCfg> for RunCfg {
    fn from(c: &paddle_config::RunCfg) -> Self {
        Self {
            position_limit: c.position_limit,
            max_command: c.max_command,
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
            derivative_cutoff_hz: c.derivative_cutoff_hz,
        }
    }
}

impl From<&paddle_config::IdleCfg> for IdleCfg {
    fn from(c: &paddle_config::IdleCfg) -> Self {
        Self {
            resume_ticks: c.resume_ticks,
        }
    }
}

// Sensor conditioning spans two TOML sections.
impl From<&paddle_config::Config> for SensorCfg {
    fn from(c: &paddle_config::Config) -> Self {
        Self {
            rad_per_rev: c.sensor.rad_per_rev,
            force_sign: c.sensor.force_sign,
            velocity_cutoff_hz: c.filter.velocity_cutoff_hz,
            force_cutoff_hz: c.filter.force_cutoff_hz,
            force_filter: c.filter.force_filter,
        }
    }
}

impl From<&paddle_config::Config> for ControllerCfg {
    fn from(c: &paddle_config::Config) -> Self {
        Self {
            sample_rate_hz: c.control_loop.sample_rate_hz,
            heartbeat_ms: c.heartbeat.period_ms,
            sensor: c.into(),
            dynamics: (&c.dynamics).into(),
            calibrate: (&c.calibration).into(),
            run: (&c.run).into(),
            idle: (&c.idle).into(),
        }
    }
}
