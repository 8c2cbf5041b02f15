//! Stand-in devices for optional outputs.

use paddle_traits::{DeviceError, Led, Telemetry};

/// LED that goes nowhere; used when the builder gets no LED.
pub struct NoopLed;

impl Led for NoopLed {
    fn write(&mut self, _on: bool) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Telemetry sink that drops every sample.
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn channels(&self) -> usize {
        0
    }
    fn set(&mut self, _channel: usize, _value: f32) {}
    fn send(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
