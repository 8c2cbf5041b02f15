//! Second-order low-pass (biquad) used to condition velocity and force.
//!
//! Coefficients follow the RBJ audio-EQ cookbook with Q = 1/√2 (Butterworth)
//! and the filter runs in transposed direct form II.

use core::f32::consts::{FRAC_1_SQRT_2, PI};

#[derive(Debug, Clone)]
pub struct LowPass {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl LowPass {
    /// Butterworth low-pass at `cutoff_hz` for a loop running at `sample_rate_hz`.
    ///
    /// The cutoff is clamped just below Nyquist; config validation rejects
    /// anything that would actually hit the clamp.
    pub fn new(sample_rate_hz: f32, cutoff_hz: f32) -> Self {
        let fs = sample_rate_hz.max(1.0);
        let fc = cutoff_hz.clamp(1.0e-3, 0.499 * fs);
        let w0 = 2.0 * PI * fc / fs;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * FRAC_1_SQRT_2);

        let a0 = 1.0 + alpha;
        let b1 = (1.0 - cos_w0) / a0;
        Self {
            b0: b1 * 0.5,
            b1,
            b2: b1 * 0.5,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Push one sample through the filter and return the output.
    #[inline]
    pub fn sample(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    /// Forget history.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}
