//! Runtime-tunable parameters shared between the loop and a command surface.
//!
//! Each value lives in its own atomic cell. Writers on another thread never
//! block the loop; a write lands either in the current tick or the next one,
//! and a single scalar is never torn.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::dynamics::Coefficients;

/// An `f32` stored as its bit pattern in an `AtomicU32`.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Virtual dynamics coefficients plus the actuator saturation bound.
#[derive(Debug)]
pub struct Params {
    mass: AtomicF32,
    damping: AtomicF32,
    stiffness: AtomicF32,
    max_command: AtomicF32,
}

impl Params {
    pub fn new(coefficients: Coefficients, max_command: f32) -> Self {
        Self {
            mass: AtomicF32::new(coefficients.mass),
            damping: AtomicF32::new(coefficients.damping),
            stiffness: AtomicF32::new(coefficients.stiffness),
            max_command: AtomicF32::new(max_command),
        }
    }

    /// Consistent-enough copy of the coefficients for one integration step.
    pub fn coefficients(&self) -> Coefficients {
        Coefficients {
            mass: self.mass.load(),
            damping: self.damping.load(),
            stiffness: self.stiffness.load(),
        }
    }

    pub fn mass(&self) -> f32 {
        self.mass.load()
    }
    pub fn damping(&self) -> f32 {
        self.damping.load()
    }
    pub fn stiffness(&self) -> f32 {
        self.stiffness.load()
    }
    pub fn max_command(&self) -> f32 {
        self.max_command.load()
    }

    pub fn set_mass(&self, v: f32) {
        self.mass.store(v);
    }
    pub fn set_damping(&self, v: f32) {
        self.damping.store(v);
    }
    pub fn set_stiffness(&self, v: f32) {
        self.stiffness.store(v);
    }
    pub fn set_max_command(&self, v: f32) {
        self.max_command.store(v);
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new(Coefficients::default(), 0.5)
    }
}
