//! X4 quadrature decoding fed from edge interrupts.
//!
//! Each channel callback publishes its new level; the combined two-bit Gray
//! state is swapped atomically so edges from both channels may arrive on
//! different threads.

use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering};

use paddle_traits::Encoder;

/// Count delta indexed by `prev_state << 2 | new_state`; 0 for no change
/// or an impossible double step.
const STEP: [i8; 16] = [0, 1, -1, 0, -1, 0, 0, 1, 1, 0, 0, -1, 0, -1, 1, 0];

#[derive(Debug)]
pub struct QuadratureCounter {
    state: AtomicU8,
    count: AtomicI64,
    missed: AtomicU64,
    counts_per_rev: f32,
}

impl QuadratureCounter {
    /// `counts_per_rev` is the number of X4 edges per revolution.
    pub fn new(counts_per_rev: u32, a: bool, b: bool) -> Self {
        Self {
            state: AtomicU8::new(u8::from(a) << 1 | u8::from(b)),
            count: AtomicI64::new(0),
            missed: AtomicU64::new(0),
            counts_per_rev: counts_per_rev.max(1) as f32,
        }
    }

    pub fn on_a(&self, level: bool) {
        self.apply(0b10, level);
    }

    pub fn on_b(&self, level: bool) {
        self.apply(0b01, level);
    }

    fn apply(&self, mask: u8, level: bool) {
        let set = if level { mask } else { 0 };
        let Ok(prev) = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| Some((s & !mask) | set))
        else {
            return;
        };
        let next = (prev & !mask) | set;
        if prev == next {
            return;
        }
        match STEP[usize::from(prev << 2 | next)] {
            0 => {
                self.missed.fetch_add(1, Ordering::Relaxed);
            }
            d => {
                self.count.fetch_add(i64::from(d), Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Transitions that skipped a state (edge lost or noise).
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }
}

impl Encoder for QuadratureCounter {
    fn revolutions(&self) -> f32 {
        self.count() as f32 / self.counts_per_rev
    }
}
