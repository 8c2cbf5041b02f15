//! Virtual mechanical model integrated once per tick.
//!
//! One generalized coordinate `q` with velocity `dq` and acceleration `ddq`.
//! The force law is swappable, the integrator is always a single explicit
//! Euler step of `dt = 1 / Fs`:
//!
//! ```text
//! ddq = law(F, q, dq)
//! dq += ddq * dt
//! q  += dq * dt
//! ```
//!
//! Coefficients are kept in the units the device is tuned in (g·m², mN·m·s/rad,
//! mN·m/rad). The built-in laws convert to SI before use.

use std::sync::Arc;

use crate::params::Params;

/// Factor from the configured engineering units to SI.
const MILLI: f32 = 1.0e-3;

/// Mass, damping and stiffness in engineering units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Virtual inertia [g·m²]
    pub mass: f32,
    /// Virtual damping [mN·m·s/rad]
    pub damping: f32,
    /// Virtual spring stiffness [mN·m/rad]
    pub stiffness: f32,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            mass: 0.5,
            damping: 30.0,
            stiffness: 50.0,
        }
    }
}

/// Strategy signature: `(coefficients, force, q, dq) -> ddq`.
pub type LawFn = fn(&Coefficients, f32, f32, f32) -> f32;

/// Force law selected at construction.
#[derive(Clone, Copy, Default)]
pub enum ForceLaw {
    /// `ddq = (F - d·dq) / m`
    Damper,
    /// `ddq = (F - k·q - d·dq) / m`
    #[default]
    SpringDamper,
    /// Caller-provided law; unit scaling is its own business.
    Custom(LawFn),
}

impl ForceLaw {
    #[inline]
    pub fn acceleration(&self, c: &Coefficients, force: f32, q: f32, dq: f32) -> f32 {
        match self {
            ForceLaw::Damper => (force - c.damping * MILLI * dq) / (c.mass * MILLI),
            ForceLaw::SpringDamper => {
                let resist = c.stiffness * MILLI * q + c.damping * MILLI * dq;
                (force - resist) / (c.mass * MILLI)
            }
            ForceLaw::Custom(f) => f(c, force, q, dq),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ForceLaw::Damper => "damper",
            ForceLaw::SpringDamper => "spring_damper",
            ForceLaw::Custom(_) => "custom",
        }
    }
}

impl core::fmt::Debug for ForceLaw {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Scalar second-order system advanced with explicit Euler.
#[derive(Debug)]
pub struct Dynamics {
    dt: f32,
    law: ForceLaw,
    params: Arc<Params>,
    q: f32,
    dq: f32,
    ddq: f32,
}

impl Dynamics {
    /// Zero state, step `1 / sample_rate_hz`, coefficients read from `params`
    /// on every `advance`.
    pub fn new(sample_rate_hz: u32, law: ForceLaw, params: Arc<Params>) -> Self {
        Self {
            dt: crate::util::dt_secs(sample_rate_hz),
            law,
            params,
            q: 0.0,
            dq: 0.0,
            ddq: 0.0,
        }
    }

    /// Integrate one step with `force` as the external generalized force.
    ///
    /// No guarding: a zero or negative mass yields non-finite state.
    pub fn advance(&mut self, force: f32) {
        let c = self.params.coefficients();
        self.ddq = self.law.acceleration(&c, force, self.q, self.dq);
        self.dq += self.ddq * self.dt;
        self.q += self.dq * self.dt;
    }

    /// Jump to `position` at rest.
    pub fn reset(&mut self, position: f32) {
        self.q = position;
        self.dq = 0.0;
    }

    #[inline]
    pub fn position(&self) -> f32 {
        self.q
    }

    #[inline]
    pub fn velocity(&self) -> f32 {
        self.dq
    }

    #[inline]
    pub fn acceleration(&self) -> f32 {
        self.ddq
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn law(&self) -> ForceLaw {
        self.law
    }

    pub fn params(&self) -> &Arc<Params> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_mass(law: ForceLaw, damping: f32, stiffness: f32, hz: u32) -> Dynamics {
        // 1000 g·m² is 1 kg·m² after scaling
        let p = Params::new(
            Coefficients {
                mass: 1000.0,
                damping,
                stiffness,
            },
            0.5,
        );
        Dynamics::new(hz, law, Arc::new(p))
    }

    #[test]
    fn hand_computed_euler_steps() {
        let mut d = unit_mass(ForceLaw::SpringDamper, 0.0, 0.0, 2);
        d.advance(1.0);
        assert_eq!(d.acceleration(), 1.0);
        assert_eq!(d.velocity(), 0.5);
        assert_eq!(d.position(), 0.25);
        d.advance(1.0);
        assert_eq!(d.velocity(), 1.0);
        assert_eq!(d.position(), 0.75);
        d.advance(0.0);
        assert_eq!(d.acceleration(), 0.0);
        assert_eq!(d.velocity(), 1.0);
        assert_eq!(d.position(), 1.25);
    }

    #[test]
    fn reset_then_zero_force_does_not_drift() {
        let mut d = unit_mass(ForceLaw::SpringDamper, 0.0, 0.0, 500);
        d.advance(3.0);
        d.advance(-1.0);
        d.reset(0.731);
        d.advance(0.0);
        assert_eq!(d.velocity(), 0.0);
        assert_eq!(d.position(), 0.731);
    }

    #[test]
    fn spring_pulls_back_toward_zero() {
        let mut d = unit_mass(ForceLaw::SpringDamper, 0.0, 1000.0, 100);
        d.reset(1.0);
        d.advance(0.0);
        assert_eq!(d.acceleration(), -1.0);
        assert!(d.position() < 1.0);
    }

    #[test]
    fn damper_ignores_stiffness() {
        let mut d = unit_mass(ForceLaw::Damper, 0.0, 1000.0, 100);
        d.reset(1.0);
        d.advance(0.0);
        assert_eq!(d.acceleration(), 0.0);
        assert_eq!(d.position(), 1.0);
    }

    #[test]
    fn custom_law_is_used_verbatim() {
        fn constant(_: &Coefficients, _: f32, _: f32, _: f32) -> f32 {
            4.0
        }
        let mut d = unit_mass(ForceLaw::Custom(constant), 0.0, 0.0, 2);
        d.advance(123.0);
        assert_eq!(d.acceleration(), 4.0);
        assert_eq!(d.velocity(), 2.0);
        assert_eq!(d.position(), 1.0);
        assert_eq!(format!("{:?}", d.law()), "custom");
    }

    #[test]
    fn coefficient_changes_apply_on_next_step() {
        let mut d = unit_mass(ForceLaw::SpringDamper, 0.0, 0.0, 2);
        d.params().set_mass(2000.0);
        d.advance(1.0);
        assert_eq!(d.acceleration(), 0.5);
    }
}
