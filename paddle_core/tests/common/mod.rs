//! Shared-cell test doubles: the test keeps a `Rig`, the controller owns
//! devices that read and write the same cells.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use paddle_core::config::ControllerCfg;
use paddle_core::{Controller, ControllerBuilder, PaddleState};
use paddle_traits::clock::test_clock::TestClock;
use paddle_traits::{Actuator, Button, DeviceError, Encoder, ForceSensor, Led, Telemetry};

#[derive(Clone, Default)]
pub struct Rig {
    pub revs: Rc<Cell<f32>>,
    pub encoder_reads: Rc<Cell<u32>>,
    pub force_ready: Rc<Cell<bool>>,
    pub force_value: Rc<Cell<f32>>,
    pub force_fails: Rc<Cell<bool>>,
    pub force_reads: Rc<Cell<u32>>,
    pub command: Rc<Cell<f32>>,
    pub actuator_writes: Rc<Cell<u32>>,
    pub actuator_fails: Rc<Cell<bool>>,
    pub pressed: Rc<Cell<bool>>,
    pub led: Rc<Cell<bool>>,
    pub led_fails: Rc<Cell<bool>>,
    pub frames: Rc<RefCell<Vec<Vec<f32>>>>,
    pub telemetry_fails: Rc<Cell<bool>>,
    pub clock: TestClock,
}

pub struct RigEncoder {
    revs: Rc<Cell<f32>>,
    reads: Rc<Cell<u32>>,
}
impl Encoder for RigEncoder {
    fn revolutions(&self) -> f32 {
        self.reads.set(self.reads.get() + 1);
        self.revs.get()
    }
}

pub struct RigForce {
    ready: Rc<Cell<bool>>,
    value: Rc<Cell<f32>>,
    fails: Rc<Cell<bool>>,
    reads: Rc<Cell<u32>>,
}
impl ForceSensor for RigForce {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }
    fn read(&mut self) -> Result<f32, DeviceError> {
        self.reads.set(self.reads.get() + 1);
        if self.fails.get() {
            return Err("loadcell checksum".into());
        }
        Ok(self.value.get())
    }
}

pub struct RigActuator {
    command: Rc<Cell<f32>>,
    writes: Rc<Cell<u32>>,
    fails: Rc<Cell<bool>>,
}
impl Actuator for RigActuator {
    fn set(&mut self, command: f32) -> Result<(), DeviceError> {
        if self.fails.get() {
            return Err("driver fault".into());
        }
        self.command.set(command);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Active-low: pressed reads low.
pub struct RigButton(Rc<Cell<bool>>);
impl Button for RigButton {
    fn is_high(&self) -> bool {
        !self.0.get()
    }
}

pub struct RigLed {
    on: Rc<Cell<bool>>,
    fails: Rc<Cell<bool>>,
}
impl Led for RigLed {
    fn write(&mut self, on: bool) -> Result<(), DeviceError> {
        if self.fails.get() {
            return Err("led glitch".into());
        }
        self.on.set(on);
        Ok(())
    }
}

pub struct RigTelemetry {
    channels: usize,
    current: Vec<f32>,
    frames: Rc<RefCell<Vec<Vec<f32>>>>,
    fails: Rc<Cell<bool>>,
}
impl Telemetry for RigTelemetry {
    fn channels(&self) -> usize {
        self.channels
    }
    fn set(&mut self, channel: usize, value: f32) {
        self.current[channel] = value;
    }
    fn send(&mut self) -> Result<(), DeviceError> {
        if self.fails.get() {
            return Err("telemetry link down".into());
        }
        self.frames.borrow_mut().push(self.current.clone());
        Ok(())
    }
}

impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with every device wired to this rig and a 4-channel telemetry sink.
    pub fn builder(&self) -> ControllerBuilder {
        self.builder_with_channels(4)
    }

    pub fn builder_with_channels(&self, channels: usize) -> ControllerBuilder {
        Controller::builder()
            .with_encoder(RigEncoder {
                revs: Rc::clone(&self.revs),
                reads: Rc::clone(&self.encoder_reads),
            })
            .with_force_sensor(RigForce {
                ready: Rc::clone(&self.force_ready),
                value: Rc::clone(&self.force_value),
                fails: Rc::clone(&self.force_fails),
                reads: Rc::clone(&self.force_reads),
            })
            .with_actuator(RigActuator {
                command: Rc::clone(&self.command),
                writes: Rc::clone(&self.actuator_writes),
                fails: Rc::clone(&self.actuator_fails),
            })
            .with_button(RigButton(Rc::clone(&self.pressed)))
            .with_led(RigLed {
                on: Rc::clone(&self.led),
                fails: Rc::clone(&self.led_fails),
            })
            .with_telemetry(RigTelemetry {
                channels,
                current: vec![f32::NAN; channels],
                frames: Rc::clone(&self.frames),
                fails: Rc::clone(&self.telemetry_fails),
            })
            .with_clock(self.clock.clone())
    }

    pub fn controller(&self, cfg: ControllerCfg, state: PaddleState) -> Controller {
        self.builder()
            .with_config(cfg)
            .starting_in(state)
            .build()
            .expect("build controller")
    }

    /// One tick followed by one sample period on the test clock.
    pub fn tick(&self, c: &mut Controller) -> PaddleState {
        let next = c.step().expect("tick");
        self.clock
            .advance(Duration::from_micros(paddle_core::util::period_us(
                c.config().sample_rate_hz,
            )));
        next
    }
}

/// Config with raw (unfiltered) force and one radian per revolution.
pub fn plain_cfg() -> ControllerCfg {
    let mut cfg = ControllerCfg::default();
    cfg.sensor.force_filter = false;
    cfg.sensor.rad_per_rev = 1.0;
    cfg
}
