//! Device states and the per-tick sensor snapshot.

/// States of the paddle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaddleState {
    /// Drive into both end stops and centre the encoder offset.
    Calibrate,
    /// Track the virtual dynamics.
    Run,
    /// Motor off, waiting for a sustained press.
    Idle,
}

impl PaddleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaddleState::Calibrate => "calibrate",
            PaddleState::Run => "run",
            PaddleState::Idle => "idle",
        }
    }
}

impl core::fmt::Display for PaddleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conditioned sensor values for the current tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    /// Paddle angle relative to the calibrated centre [rad]
    pub position: f32,
    /// Low-passed angular velocity [rad/s]
    pub velocity: f32,
    /// Sign-corrected, low-passed torque at the handle [N·m]
    pub force: f32,
}
