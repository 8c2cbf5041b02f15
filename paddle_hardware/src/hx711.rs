//! HX711 loadcell ADC, polled without blocking the control loop.
//!
//! DT low means a conversion is ready; `read` clocks it out immediately and
//! queues the next conversion with the configured gain pulses.
use std::time::Duration;

use paddle_traits::{DeviceError, ForceSensor};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::{sign_extend_24, wait_until_ready};

pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
}

impl Hx711 {
    pub fn new(dt_pin: InputPin, mut sck_pin: OutputPin, gain_pulses: u8) -> Result<Self> {
        sck_pin.set_low(); // clock idle low
        Ok(Self {
            dt: dt_pin,
            sck: sck_pin,
            gain_pulses: gain_pulses.clamp(25, 27),
        })
    }

    /// Claim the DT (input) and SCK (output) pins.
    pub fn open(gpio: &Gpio, dt_pin: u8, sck_pin: u8, gain_pulses: u8) -> Result<Self> {
        let dt = gpio.get(dt_pin)?.into_input();
        let sck = gpio.get(sck_pin)?.into_output_low();
        Self::new(dt, sck, gain_pulses)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.dt.is_low()
    }

    /// Clock out one 24-bit sample; fails if no conversion is pending.
    pub fn read_raw(&mut self) -> Result<i32> {
        if !self.is_ready() {
            return Err(HwError::DataReadyTimeout);
        }

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        // gain/channel for the next conversion
        for _ in 0..self.gain_pulses.saturating_sub(24) {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        Ok(sign_extend_24(value))
    }

    /// Blocking read for bring-up checks, never from the control loop.
    pub fn read_blocking(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        wait_until_ready(|| dt.is_low(), timeout, Duration::from_micros(200))?;
        self.read_raw()
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}

/// HX711 scaled to torque with a zero offset taken at start-up.
pub struct Hx711Loadcell {
    adc: Hx711,
    scale: f32,
    zero: i32,
}

impl Hx711Loadcell {
    pub fn new(adc: Hx711, scale: f32) -> Self {
        Self {
            adc,
            scale,
            zero: 0,
        }
    }

    /// Average `samples` blocking reads as the unloaded offset.
    pub fn tare(&mut self, samples: u32, timeout: Duration) -> Result<i32> {
        let n = samples.max(1);
        let mut sum = 0i64;
        for _ in 0..n {
            sum += i64::from(self.adc.read_blocking(timeout)?);
        }
        self.zero = (sum / i64::from(n)) as i32;
        tracing::info!(zero = self.zero, "loadcell tared");
        Ok(self.zero)
    }
}

impl ForceSensor for Hx711Loadcell {
    fn is_ready(&self) -> bool {
        self.adc.is_ready()
    }

    fn read(&mut self) -> std::result::Result<f32, DeviceError> {
        let raw = self.adc.read_raw()?;
        trace!(raw, "hx711 sample");
        Ok((raw - self.zero) as f32 * self.scale)
    }
}
