//! PID position controller with a first-order filter on the derivative term.

use core::f32::consts::PI;

#[derive(Debug, Clone)]
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    dt: f32,
    /// Smoothing factor for the derivative; 1.0 means unfiltered.
    d_alpha: f32,
    integral: f32,
    prev_error: Option<f32>,
    derivative: f32,
}

impl Pid {
    pub fn new(kp: f32, ki: f32, kd: f32, dt: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            dt,
            d_alpha: 1.0,
            integral: 0.0,
            prev_error: None,
            derivative: 0.0,
        }
    }

    /// Low-pass the derivative term at `cutoff_hz`; 0 or less disables it.
    pub fn with_derivative_filter(mut self, cutoff_hz: f32) -> Self {
        self.d_alpha = if cutoff_hz > 0.0 && cutoff_hz.is_finite() {
            let rc = 1.0 / (2.0 * PI * cutoff_hz);
            self.dt / (self.dt + rc)
        } else {
            1.0
        };
        self
    }

    /// One controller update for the given error; output is not saturated.
    pub fn control(&mut self, error: f32) -> f32 {
        self.integral += error * self.dt;

        let raw_d = match self.prev_error {
            Some(prev) if self.dt > 0.0 => (error - prev) / self.dt,
            _ => 0.0,
        };
        self.derivative += self.d_alpha * (raw_d - self.derivative);
        self.prev_error = Some(error);

        self.kp * error + self.ki * self.integral + self.kd * self.derivative
    }

    /// Clear integral and derivative history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
        self.derivative = 0.0;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }
}
