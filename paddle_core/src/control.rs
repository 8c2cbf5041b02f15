//! The paddle control loop (`Controller`).
//!
//! Every tick runs the common preprocessing (encoder → angle, differentiated
//! and filtered velocity, loadcell force, button latch, heartbeat) and then
//! the body of the active state:
//!
//! - **Calibrate**: push into both end stops and centre the encoder offset.
//! - **Run**: integrate the virtual dynamics with the measured force and
//!   servo the paddle onto the virtual position.
//! - **Idle**: motor off until the button is held long enough.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use paddle_traits::clock::Clock;
use paddle_traits::{Actuator, Button, Encoder, ForceSensor, Led, Telemetry};

use crate::config::ControllerCfg;
use crate::dynamics::Dynamics;
use crate::error::Result;
use crate::filter::LowPass;
use crate::hw_error::map_hw_error;
use crate::params::Params;
use crate::pid::Pid;
use crate::state_machine::{Cooperative, StateMachine};
use crate::status::{PaddleState, Snapshot};
use crate::util::saturate;

/// Telemetry channel layout published in Run.
pub const TELEMETRY_CHANNELS: [&str; 4] = ["virtual_position", "position", "command", "force"];

/// Devices owned by the controller.
pub struct Devices {
    pub encoder: Box<dyn Encoder>,
    pub force: Box<dyn ForceSensor>,
    pub actuator: Box<dyn Actuator>,
    pub button: Box<dyn Button>,
    pub led: Box<dyn Led>,
    pub telemetry: Box<dyn Telemetry>,
}

/// Progress of the end-stop search.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CalibrationProgress {
    pub(crate) clockwise: bool,
    /// State time [ms] at which the paddle was last seen moving.
    pub(crate) moving_at_ms: u64,
    pub(crate) cw_limit_rev: f32,
}

impl Default for CalibrationProgress {
    fn default() -> Self {
        Self {
            clockwise: true,
            moving_at_ms: 0,
            cw_limit_rev: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ButtonLatch {
    pub(crate) pressed: bool,
    pub(crate) was_pressed: bool,
}

impl ButtonLatch {
    /// Pressed this tick and not the tick before.
    #[inline]
    pub(crate) fn edge(&self) -> bool {
        self.pressed && !self.was_pressed
    }
}

pub struct Controller {
    pub(crate) sm: StateMachine<PaddleState>,
    pub(crate) devices: Devices,
    pub(crate) cfg: ControllerCfg,
    pub(crate) params: Arc<Params>,
    pub(crate) dynamics: Dynamics,
    pub(crate) pid: Pid,
    pub(crate) velocity_filter: LowPass,
    pub(crate) force_filter: Option<LowPass>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) fs: f32,

    pub(crate) offset_rev: f32,
    /// Encoder reading taken this tick.
    pub(crate) raw_revs: f32,
    pub(crate) prev_position: Option<f32>,
    pub(crate) raw_force: f32,
    pub(crate) snapshot: Snapshot,
    pub(crate) button: ButtonLatch,
    pub(crate) led_on: bool,
    pub(crate) last_command: f32,
    pub(crate) calibration: CalibrationProgress,
    pub(crate) press_ticks: u32,
    pub(crate) force_read_errors: u64,
    pub(crate) led_write_errors: u64,
    pub(crate) ticks: u64,
}

impl core::fmt::Debug for Controller {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.sm.current())
            .field("position", &self.snapshot.position)
            .field("virtual_position", &self.dynamics.position())
            .field("offset_rev", &self.offset_rev)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl Cooperative for Controller {
    type State = PaddleState;

    fn machine(&self) -> &StateMachine<PaddleState> {
        &self.sm
    }

    fn machine_mut(&mut self) -> &mut StateMachine<PaddleState> {
        &mut self.sm
    }

    fn run_state(&mut self) -> Result<()> {
        self.preprocess()?;
        match self.sm.current() {
            PaddleState::Calibrate => self.state_calibrate(),
            PaddleState::Run => self.state_run(),
            PaddleState::Idle => self.state_idle(),
        }
    }
}

impl Controller {
    /// Run one tick and return the state that will be active for the next one.
    pub fn step(&mut self) -> Result<PaddleState> {
        let res = Cooperative::tick(self);
        self.ticks = self.ticks.wrapping_add(1);
        res.map(|()| self.sm.current())
    }

    /// State whose body runs on the next tick.
    pub fn state(&self) -> PaddleState {
        self.sm.current()
    }

    pub fn is_entering(&self) -> bool {
        self.sm.is_entering()
    }

    pub fn time_in_state(&self) -> Duration {
        self.sm.time_in_state()
    }

    /// Ask for a transition at the end of the next tick.
    pub fn request(&mut self, state: PaddleState) {
        self.sm.request(state);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    pub fn virtual_position(&self) -> f32 {
        self.dynamics.position()
    }

    pub fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    /// Shared tunables; hand a clone to a command surface.
    pub fn params(&self) -> &Arc<Params> {
        &self.params
    }

    /// Encoder revolutions that map to the centre position.
    pub fn offset_rev(&self) -> f32 {
        self.offset_rev
    }

    /// Last value written to the actuator.
    pub fn last_command(&self) -> f32 {
        self.last_command
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    /// Ticks completed since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn force_read_errors(&self) -> u64 {
        self.force_read_errors
    }

    pub fn led_write_errors(&self) -> u64 {
        self.led_write_errors
    }

    pub fn config(&self) -> &ControllerCfg {
        &self.cfg
    }

    /// Write zero to the actuator (best-effort callers may ignore the error).
    pub fn park(&mut self) -> Result<()> {
        self.drive(0.0).map(|_| ())
    }

    // ── Common preprocessing ────────────────────────────────────────────────

    fn preprocess(&mut self) -> Result<()> {
        self.raw_revs = self.devices.encoder.revolutions();
        let position = (self.raw_revs - self.offset_rev) * self.cfg.sensor.rad_per_rev;
        let prev = self.prev_position.unwrap_or(position);
        let velocity = self.velocity_filter.sample(self.fs * (position - prev));
        self.prev_position = Some(position);

        if self.devices.force.is_ready() {
            match self.devices.force.read() {
                Ok(v) => self.raw_force = self.cfg.sensor.force_sign * v,
                Err(e) => {
                    // stale value stays in use, same as a sample that is not ready yet
                    self.force_read_errors = self.force_read_errors.saturating_add(1);
                    tracing::warn!(error = %map_hw_error(&*e), "force read failed; reusing last sample");
                }
            }
        }
        let force = match self.force_filter.as_mut() {
            Some(f) => f.sample(self.raw_force),
            None => self.raw_force,
        };

        self.button.was_pressed = self.button.pressed;
        self.button.pressed = !self.devices.button.is_high();

        self.snapshot = Snapshot {
            position,
            velocity,
            force,
        };
        tracing::trace!(position, velocity, force, "tick input");

        self.heartbeat();
        Ok(())
    }

    /// A dead LED must never stop the state body from running.
    fn heartbeat(&mut self) {
        let period = self.cfg.heartbeat_ms.max(1);
        let now = self.clock.ms_since(self.epoch);
        self.led_on = (now / period) % 2 == 1;
        if let Err(e) = self.devices.led.write(self.led_on) {
            self.led_write_errors = self.led_write_errors.saturating_add(1);
            tracing::warn!(error = %map_hw_error(&*e), "led write failed");
        }
    }

    /// Saturate and send a command; returns what was actually written.
    fn drive(&mut self, command: f32) -> Result<f32> {
        let out = saturate(command, self.params.max_command());
        self.devices
            .actuator
            .set(out)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("actuator set")?;
        self.last_command = out;
        Ok(out)
    }

    /// Move the encoder zero; the previous position is shifted along so the
    /// velocity estimate does not see the jump.
    fn set_offset(&mut self, offset_rev: f32) {
        let shift = (self.offset_rev - offset_rev) * self.cfg.sensor.rad_per_rev;
        self.prev_position = self.prev_position.map(|p| p + shift);
        self.offset_rev = offset_rev;
    }

    // ── CALIBRATE ───────────────────────────────────────────────────────────

    fn state_calibrate(&mut self) -> Result<()> {
        let t = self.sm.ms_in_state();
        if self.sm.is_entering() {
            tracing::info!("calibration: searching end stops");
            self.calibration = CalibrationProgress {
                moving_at_ms: t,
                ..CalibrationProgress::default()
            };
        }

        let drive = self.cfg.calibrate.drive_command;
        self.drive(if self.calibration.clockwise {
            drive
        } else {
            -drive
        })?;

        if self.snapshot.velocity.abs() > self.cfg.calibrate.still_velocity {
            self.calibration.moving_at_ms = t;
        }

        if t.saturating_sub(self.calibration.moving_at_ms) > self.cfg.calibrate.dwell_ms {
            let revs = self.raw_revs;
            if self.calibration.clockwise {
                self.calibration.cw_limit_rev = revs;
                tracing::info!(cw_rev = revs, "calibration: clockwise limit");
            } else {
                let offset = (self.calibration.cw_limit_rev + revs) / 2.0;
                tracing::info!(ccw_rev = revs, offset_rev = offset, "calibration: counter-clockwise limit");
                self.set_offset(offset);
                self.sm.request(PaddleState::Run);
            }
            self.calibration.clockwise = !self.calibration.clockwise;
            self.calibration.moving_at_ms = t;
        }
        Ok(())
    }

    // ── RUN ─────────────────────────────────────────────────────────────────

    fn state_run(&mut self) -> Result<()> {
        if self.sm.is_entering() {
            tracing::info!(position = self.snapshot.position, "run: tracking virtual dynamics");
            self.dynamics.reset(self.snapshot.position);
            self.pid.reset();
            self.drive(0.0)?;
        }

        self.dynamics.advance(self.snapshot.force);

        let limit = self.cfg.run.position_limit;
        let q = self.dynamics.position();
        if q.abs() > limit {
            let bound = limit.copysign(q);
            tracing::debug!(q, bound, "virtual position clamped");
            self.dynamics.reset(bound);
        }
        let q = self.dynamics.position();

        let u = self.pid.control(q - self.snapshot.position);
        let command = self.drive(u)?;

        let values = [q, self.snapshot.position, command, self.snapshot.force];
        let channels = self.devices.telemetry.channels();
        for (i, v) in values.iter().enumerate().take(channels) {
            self.devices.telemetry.set(i, *v);
        }

        // before the flush so a send error cannot drop the stop request
        if self.button.edge() {
            tracing::info!("run: stop button pressed");
            self.sm.request(PaddleState::Idle);
        }

        self.devices
            .telemetry
            .send()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("telemetry send")
    }

    // ── IDLE ────────────────────────────────────────────────────────────────

    fn state_idle(&mut self) -> Result<()> {
        if self.sm.is_entering() {
            tracing::info!("idle: motor off, hold button to resume");
            self.press_ticks = 0;
        }

        self.drive(0.0)?;

        if self.button.pressed {
            self.press_ticks = self.press_ticks.saturating_add(1);
        } else {
            self.press_ticks = self.press_ticks.saturating_sub(1);
        }

        if self.press_ticks > self.cfg.idle.resume_ticks {
            self.sm.request(PaddleState::Run);
        }
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Err(e) = self.devices.actuator.set(0.0) {
            tracing::warn!(error = %map_hw_error(&*e), "actuator park failed on drop");
        }
    }
}
