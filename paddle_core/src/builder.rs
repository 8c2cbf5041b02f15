//! Builder for `Controller`.
//!
//! Encoder, force sensor, actuator and button are required; LED, telemetry,
//! clock and shared params fall back to no-op devices, the monotonic clock
//! and params derived from the config.

use std::sync::Arc;

use paddle_traits::clock::{Clock, MonotonicClock};
use paddle_traits::{Actuator, Button, Encoder, ForceSensor, Led, Telemetry};

use crate::config::ControllerCfg;
use crate::control::{ButtonLatch, CalibrationProgress, Controller, Devices};
use crate::dynamics::Dynamics;
use crate::error::{BuildError, Result};
use crate::filter::LowPass;
use crate::mocks::{NoopLed, NoopTelemetry};
use crate::params::Params;
use crate::pid::Pid;
use crate::state_machine::StateMachine;
use crate::status::{PaddleState, Snapshot};

#[derive(Default)]
pub struct ControllerBuilder {
    encoder: Option<Box<dyn Encoder>>,
    force: Option<Box<dyn ForceSensor>>,
    actuator: Option<Box<dyn Actuator>>,
    button: Option<Box<dyn Button>>,
    led: Option<Box<dyn Led>>,
    telemetry: Option<Box<dyn Telemetry>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    params: Option<Arc<Params>>,
    cfg: Option<ControllerCfg>,
    initial: Option<PaddleState>,
    offset_rev: f32,
}

impl Controller {
    /// Start building a Controller.
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }
}

impl ControllerBuilder {
    pub fn with_encoder(mut self, e: impl Encoder + 'static) -> Self {
        self.encoder = Some(Box::new(e));
        self
    }

    pub fn with_force_sensor(mut self, f: impl ForceSensor + 'static) -> Self {
        self.force = Some(Box::new(f));
        self
    }

    pub fn with_actuator(mut self, a: impl Actuator + 'static) -> Self {
        self.actuator = Some(Box::new(a));
        self
    }

    pub fn with_button(mut self, b: impl Button + 'static) -> Self {
        self.button = Some(Box::new(b));
        self
    }

    pub fn with_led(mut self, l: impl Led + 'static) -> Self {
        self.led = Some(Box::new(l));
        self
    }

    pub fn with_telemetry(mut self, t: impl Telemetry + 'static) -> Self {
        self.telemetry = Some(Box::new(t));
        self
    }

    /// Inject a clock (tests use a manually advanced one).
    pub fn with_clock(mut self, c: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(c));
        self
    }

    /// Share an existing parameter block instead of creating one from config.
    pub fn with_params(mut self, p: Arc<Params>) -> Self {
        self.params = Some(p);
        self
    }

    pub fn with_config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Initial state; Calibrate unless told otherwise.
    pub fn starting_in(mut self, state: PaddleState) -> Self {
        self.initial = Some(state);
        self
    }

    /// Preset encoder offset, for starting in Run with a known centre.
    pub fn with_offset_rev(mut self, offset_rev: f32) -> Self {
        self.offset_rev = offset_rev;
        self
    }

    pub fn build(self) -> Result<Controller> {
        let encoder = self.encoder.ok_or(BuildError::MissingEncoder)?;
        let force = self.force.ok_or(BuildError::MissingForceSensor)?;
        let actuator = self.actuator.ok_or(BuildError::MissingActuator)?;
        let button = self.button.ok_or(BuildError::MissingButton)?;
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg)?;

        let clock: Arc<dyn Clock + Send + Sync> = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let params = self.params.unwrap_or_else(|| {
            Arc::new(Params::new(
                cfg.dynamics.coefficients,
                cfg.run.max_command,
            ))
        });

        let fs = cfg.sample_rate_hz as f32;
        let dt = crate::util::dt_secs(cfg.sample_rate_hz);
        let dynamics = Dynamics::new(cfg.sample_rate_hz, cfg.dynamics.law, Arc::clone(&params));
        let pid = Pid::new(cfg.run.kp, cfg.run.ki, cfg.run.kd, dt)
            .with_derivative_filter(cfg.run.derivative_cutoff_hz);
        let velocity_filter = LowPass::new(fs, cfg.sensor.velocity_cutoff_hz);
        let force_filter = cfg
            .sensor
            .force_filter
            .then(|| LowPass::new(fs, cfg.sensor.force_cutoff_hz));

        let initial = self.initial.unwrap_or(PaddleState::Calibrate);
        let epoch = clock.now();
        let sm = StateMachine::new(initial, Arc::clone(&clock));
        tracing::info!(
            state = %initial,
            sample_rate_hz = cfg.sample_rate_hz,
            law = cfg.dynamics.law.name(),
            "controller ready"
        );

        Ok(Controller {
            sm,
            devices: Devices {
                encoder,
                force,
                actuator,
                button,
                led: self.led.unwrap_or_else(|| Box::new(NoopLed)),
                telemetry: self.telemetry.unwrap_or_else(|| Box::new(NoopTelemetry)),
            },
            cfg,
            params,
            dynamics,
            pid,
            velocity_filter,
            force_filter,
            clock,
            epoch,
            fs,
            offset_rev: self.offset_rev,
            raw_revs: 0.0,
            prev_position: None,
            raw_force: 0.0,
            snapshot: Snapshot::default(),
            button: ButtonLatch::default(),
            led_on: false,
            last_command: 0.0,
            calibration: CalibrationProgress::default(),
            press_ticks: 0,
            force_read_errors: 0,
            led_write_errors: 0,
            ticks: 0,
        })
    }
}

fn validate(cfg: &ControllerCfg) -> std::result::Result<(), BuildError> {
    if cfg.sample_rate_hz == 0 {
        return Err(BuildError::InvalidConfig("sample_rate_hz must be > 0"));
    }
    if !(cfg.run.position_limit.is_finite() && cfg.run.position_limit > 0.0) {
        return Err(BuildError::InvalidConfig("position_limit must be > 0"));
    }
    if !(cfg.sensor.rad_per_rev.is_finite() && cfg.sensor.rad_per_rev != 0.0) {
        return Err(BuildError::InvalidConfig("rad_per_rev must be non-zero"));
    }
    if !cfg.calibrate.drive_command.is_finite() || !cfg.calibrate.still_velocity.is_finite() {
        return Err(BuildError::InvalidConfig("calibration values must be finite"));
    }
    Ok(())
}
