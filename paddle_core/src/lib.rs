#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core of the haptic paddle (hardware-agnostic).
//!
//! All device access goes through the `paddle_traits` seams, so the same
//! controller drives the Raspberry Pi rig, the simulator and test doubles.
//!
//! ## Architecture
//!
//! - **Dynamics**: explicit-Euler virtual mass/spring/damper (`dynamics`)
//! - **State machine**: tick-boundary transitions with entry flag (`state_machine`)
//! - **Control loop**: Calibrate / Run / Idle bodies over a shared
//!   per-tick snapshot (`Controller`, built via `ControllerBuilder`)
//! - **Tuning**: lock-free shared coefficients (`params`) and a
//!   line-oriented command surface (`command`)
//! - **Signal conditioning**: biquad low-pass (`filter`) and PID (`pid`)

pub mod builder;
pub mod command;
pub mod config;
pub mod control;
pub mod conversions;
pub mod dynamics;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod params;
pub mod pid;
pub mod state_machine;
pub mod status;
pub mod util;

pub use builder::ControllerBuilder;
pub use command::{Command, CommandError, CommandReader};
pub use config::ControllerCfg;
pub use control::{Controller, TELEMETRY_CHANNELS};
pub use dynamics::{Coefficients, Dynamics, ForceLaw};
pub use error::{BuildError, PaddleError, Result};
pub use params::Params;
pub use state_machine::{Cooperative, StateMachine};
pub use status::{PaddleState, Snapshot};
