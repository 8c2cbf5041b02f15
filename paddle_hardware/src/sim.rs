//! Simulated paddle rig.
//!
//! `SimPaddle` is a one-axis plant (inertia, viscous friction, motor torque,
//! a constant hand torque, hard end stops). The plant is integrated lazily up
//! to the injected clock's `now()` whenever a device touches it, so the same
//! rig runs in real time under `MonotonicClock` and deterministically under a
//! test clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use paddle_traits::clock::Clock;
use paddle_traits::{Actuator, Button, DeviceError, Encoder, ForceSensor, Led, Telemetry};

use crate::util::check_command;

/// Internal integration step.
const SUBSTEP: Duration = Duration::from_micros(250);
/// Longest stretch integrated in one catch-up; a stalled caller does not
/// trigger a long burst.
const MAX_CATCH_UP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SimPaddleCfg {
    /// End stops at ±range [rad]
    pub range_rad: f32,
    /// Angle at power-up, relative to the mechanical centre [rad]
    pub start_rad: f32,
    /// Constant torque from the user's hand [N·m]
    pub user_torque: f32,
    /// Paddle inertia [kg·m²]
    pub inertia: f32,
    /// Viscous friction [N·m·s/rad]
    pub friction: f32,
    /// Handle torque at full command [N·m]
    pub torque_gain: f32,
    /// Paddle radians per encoder revolution
    pub rad_per_rev: f32,
    /// Loadcell signals data-ready on every Nth poll
    pub loadcell_every: u32,
}

impl Default for SimPaddleCfg {
    fn default() -> Self {
        Self {
            range_rad: 1.2,
            start_rad: 0.4,
            user_torque: 0.0,
            inertia: 2.0e-3,
            friction: 2.0e-2,
            torque_gain: 0.5,
            rad_per_rev: core::f32::consts::FRAC_PI_2,
            loadcell_every: 6,
        }
    }
}

#[derive(Debug)]
struct Plant {
    cfg: SimPaddleCfg,
    angle: f32,
    velocity: f32,
    command: f32,
    user_torque: f32,
    synced_at: Instant,
}

impl Plant {
    fn advance_to(&mut self, now: Instant) {
        let mut pending = now.saturating_duration_since(self.synced_at);
        if pending > MAX_CATCH_UP {
            tracing::trace!(?pending, "sim plant catch-up truncated");
            pending = MAX_CATCH_UP;
        }
        let h = SUBSTEP.as_secs_f32();
        while pending >= SUBSTEP {
            let torque = self.command * self.cfg.torque_gain + self.user_torque
                - self.cfg.friction * self.velocity;
            self.velocity += torque / self.cfg.inertia * h;
            self.angle += self.velocity * h;
            let r = self.cfg.range_rad;
            if self.angle.abs() >= r {
                self.angle = r.copysign(self.angle);
                // inelastic stop: only motion away from the stop survives
                if self.velocity * self.angle > 0.0 {
                    self.velocity = 0.0;
                }
            }
            pending -= SUBSTEP;
        }
        self.synced_at = now - pending;
    }
}

/// Shared handle to the simulated plant. Clones refer to the same paddle.
#[derive(Clone)]
pub struct SimPaddle {
    plant: Rc<RefCell<Plant>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimPaddle {
    pub fn new(cfg: SimPaddleCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let synced_at = clock.now();
        let plant = Plant {
            angle: cfg.start_rad.clamp(-cfg.range_rad, cfg.range_rad),
            velocity: 0.0,
            command: 0.0,
            user_torque: cfg.user_torque,
            synced_at,
            cfg,
        };
        Self {
            plant: Rc::new(RefCell::new(plant)),
            clock,
        }
    }

    fn sync(&self) -> std::cell::RefMut<'_, Plant> {
        let mut p = self.plant.borrow_mut();
        p.advance_to(self.clock.now());
        p
    }

    /// Paddle angle relative to the mechanical centre [rad].
    pub fn angle(&self) -> f32 {
        self.sync().angle
    }

    pub fn velocity(&self) -> f32 {
        self.sync().velocity
    }

    /// Last command applied by the motor.
    pub fn command(&self) -> f32 {
        self.plant.borrow().command
    }

    /// Change the hand torque from now on.
    pub fn set_user_torque(&self, torque: f32) {
        self.sync().user_torque = torque;
    }

    pub fn encoder(&self) -> SimEncoder {
        let p = self.plant.borrow();
        SimEncoder {
            paddle: self.clone(),
            zero_rad: p.angle,
            rad_per_rev: p.cfg.rad_per_rev,
        }
    }

    pub fn loadcell(&self) -> SimLoadcell {
        let every = self.plant.borrow().cfg.loadcell_every.max(1);
        SimLoadcell {
            paddle: self.clone(),
            every,
            polls: Cell::new(0),
        }
    }

    pub fn motor(&self) -> SimMotor {
        SimMotor {
            paddle: self.clone(),
        }
    }
}

/// Incremental encoder: zero at construction, like a real one at power-up.
pub struct SimEncoder {
    paddle: SimPaddle,
    zero_rad: f32,
    rad_per_rev: f32,
}

impl Encoder for SimEncoder {
    fn revolutions(&self) -> f32 {
        (self.paddle.angle() - self.zero_rad) / self.rad_per_rev
    }
}

/// Loadcell reporting the hand torque; data-ready every N polls.
pub struct SimLoadcell {
    paddle: SimPaddle,
    every: u32,
    polls: Cell<u32>,
}

impl ForceSensor for SimLoadcell {
    fn is_ready(&self) -> bool {
        let n = self.polls.get().saturating_add(1);
        self.polls.set(n);
        n >= self.every
    }

    fn read(&mut self) -> Result<f32, DeviceError> {
        self.polls.set(0);
        Ok(self.paddle.sync().user_torque)
    }
}

pub struct SimMotor {
    paddle: SimPaddle,
}

impl Actuator for SimMotor {
    fn set(&mut self, command: f32) -> Result<(), DeviceError> {
        let command = check_command(command)?;
        self.paddle.sync().command = command;
        Ok(())
    }
}

/// Active-low push button driven through a shared flag.
#[derive(Debug, Clone, Default)]
pub struct SimButton {
    pressed: Arc<AtomicBool>,
}

impl SimButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.pressed.store(true, Ordering::Relaxed);
    }

    pub fn release(&self) {
        self.pressed.store(false, Ordering::Relaxed);
    }
}

impl Button for SimButton {
    fn is_high(&self) -> bool {
        !self.pressed.load(Ordering::Relaxed)
    }
}

/// LED whose state can be observed from another handle.
#[derive(Debug, Clone, Default)]
pub struct SimLed {
    on: Arc<AtomicBool>,
}

impl SimLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}

impl Led for SimLed {
    fn write(&mut self, on: bool) -> Result<(), DeviceError> {
        if self.on.swap(on, Ordering::Relaxed) != on {
            tracing::trace!(on, "sim led");
        }
        Ok(())
    }
}

/// Telemetry sink that keeps every frame in memory.
#[derive(Debug, Clone)]
pub struct MemoryTelemetry {
    current: Vec<f32>,
    frames: Arc<Mutex<Vec<Vec<f32>>>>,
}

impl MemoryTelemetry {
    pub fn new(channels: usize) -> Self {
        Self {
            current: vec![0.0; channels],
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Copy of the frames sent so far.
    pub fn frames(&self) -> Vec<Vec<f32>> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl Telemetry for MemoryTelemetry {
    fn channels(&self) -> usize {
        self.current.len()
    }

    fn set(&mut self, channel: usize, value: f32) {
        if let Some(slot) = self.current.get_mut(channel) {
            *slot = value;
        }
    }

    fn send(&mut self) -> Result<(), DeviceError> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| DeviceError::from("telemetry buffer poisoned"))?;
        frames.push(self.current.clone());
        Ok(())
    }
}
