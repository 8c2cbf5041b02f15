//! Device boundaries for the haptic paddle.
//!
//! The control core only talks to hardware through these traits. Fallible
//! I/O returns `Box<dyn Error + Send + Sync>` so drivers can surface whatever
//! error type they have; the core maps them to its own typed error.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type used across the device boundary.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Rotary position sensor (quadrature encoder on the motor shaft).
pub trait Encoder {
    /// Cumulative position in motor revolutions since power-up.
    fn revolutions(&self) -> f32;
}

/// Force/torque sensor that produces samples slower than the loop rate.
pub trait ForceSensor {
    /// True when a fresh sample can be read without blocking.
    fn is_ready(&self) -> bool;
    /// Read the latest sample in calibrated units. Only called when ready.
    fn read(&mut self) -> Result<f32, DeviceError>;
}

/// Motor output taking a signed, normalized command in `[-1, 1]`.
pub trait Actuator {
    fn set(&mut self, command: f32) -> Result<(), DeviceError>;
}

/// Push button wired with a pull-up: `false` means pressed.
pub trait Button {
    fn is_high(&self) -> bool;
}

/// Status LED.
pub trait Led {
    fn write(&mut self, on: bool) -> Result<(), DeviceError>;
}

/// Multi-channel plot sink; `set` fills channels, `send` flushes one sample.
pub trait Telemetry {
    fn channels(&self) -> usize;
    fn set(&mut self, channel: usize, value: f32);
    fn send(&mut self) -> Result<(), DeviceError>;
}
