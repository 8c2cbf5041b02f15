//! Device implementations for the haptic paddle.
//!
//! - `sim`: a simulated plant and devices; always available.
//! - `rpi` / `hx711`: Raspberry Pi drivers behind the `hardware` feature.
pub mod error;
pub mod quadrature;
pub mod sim;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;

pub use sim::{
    MemoryTelemetry, SimButton, SimEncoder, SimLed, SimLoadcell, SimMotor, SimPaddle, SimPaddleCfg,
};
