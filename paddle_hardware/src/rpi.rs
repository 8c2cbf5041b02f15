//! Raspberry Pi devices on `rppal` GPIO.

use std::sync::Arc;

use paddle_traits::{Actuator, Button, DeviceError, Encoder, Led};
use rppal::gpio::{InputPin, Level, OutputPin, Trigger};

use crate::error::Result;
use crate::quadrature::QuadratureCounter;
use crate::util::check_command;

pub use rppal::gpio::Gpio;

/// Software PWM carrier for the H-bridge enable line.
const PWM_HZ: f64 = 20_000.0;

pub fn open_gpio() -> Result<Gpio> {
    Ok(Gpio::new()?)
}

pub struct GpioButton {
    pin: InputPin,
}

impl GpioButton {
    /// Input with pull-up; the button shorts to ground.
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self> {
        Ok(Self {
            pin: gpio.get(pin)?.into_input_pullup(),
        })
    }
}

impl Button for GpioButton {
    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}

pub struct GpioLed {
    pin: OutputPin,
}

impl GpioLed {
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self> {
        Ok(Self {
            pin: gpio.get(pin)?.into_output_low(),
        })
    }
}

impl Led for GpioLed {
    fn write(&mut self, on: bool) -> std::result::Result<(), DeviceError> {
        self.pin.write(if on { Level::High } else { Level::Low });
        Ok(())
    }
}

/// Sign/magnitude H-bridge: direction pin plus PWM duty.
pub struct PwmMotor {
    pwm: OutputPin,
    dir: OutputPin,
}

impl PwmMotor {
    pub fn new(gpio: &Gpio, pwm_pin: u8, dir_pin: u8) -> Result<Self> {
        Ok(Self {
            pwm: gpio.get(pwm_pin)?.into_output_low(),
            dir: gpio.get(dir_pin)?.into_output_low(),
        })
    }
}

impl Actuator for PwmMotor {
    fn set(&mut self, command: f32) -> std::result::Result<(), DeviceError> {
        let command = check_command(command)?;
        self.dir
            .write(if command < 0.0 { Level::High } else { Level::Low });
        if command == 0.0 {
            self.pwm.clear_pwm().map_err(crate::error::HwError::from)?;
            self.pwm.set_low();
        } else {
            self.pwm
                .set_pwm_frequency(PWM_HZ, f64::from(command.abs()))
                .map_err(crate::error::HwError::from)?;
        }
        Ok(())
    }
}

impl Drop for PwmMotor {
    fn drop(&mut self) {
        let _ = self.pwm.clear_pwm();
        self.pwm.set_low();
    }
}

/// Quadrature encoder decoded from both-edge interrupts on A and B.
pub struct QuadratureEncoder {
    counter: Arc<QuadratureCounter>,
    // interrupts stay registered while the pins live
    _a: InputPin,
    _b: InputPin,
}

impl QuadratureEncoder {
    pub fn new(gpio: &Gpio, a_pin: u8, b_pin: u8, counts_per_rev: u32) -> Result<Self> {
        let mut a = gpio.get(a_pin)?.into_input_pullup();
        let mut b = gpio.get(b_pin)?.into_input_pullup();
        let counter = Arc::new(QuadratureCounter::new(
            counts_per_rev,
            a.is_high(),
            b.is_high(),
        ));

        let on_a = Arc::clone(&counter);
        a.set_async_interrupt(Trigger::Both, move |level: Level| {
            on_a.on_a(level == Level::High);
        })?;
        let on_b = Arc::clone(&counter);
        b.set_async_interrupt(Trigger::Both, move |level: Level| {
            on_b.on_b(level == Level::High);
        })?;

        Ok(Self {
            counter,
            _a: a,
            _b: b,
        })
    }

    pub fn missed_edges(&self) -> u64 {
        self.counter.missed()
    }
}

impl Encoder for QuadratureEncoder {
    fn revolutions(&self) -> f32 {
        self.counter.revolutions()
    }
}
