//! Typed errors of the control core.
//!
//! Device failures reach callers as `eyre::Report` wrapping a `PaddleError`
//! plus context naming the operation (`"actuator set"`, `"telemetry send"`, ...).

use thiserror::Error;

/// A collaborator failed during a tick.
#[derive(Debug, Error, Clone)]
pub enum PaddleError {
    /// Error from a device we cannot classify further.
    #[error("device error: {0}")]
    Hardware(String),
    /// Driver-level fault (GPIO, I/O).
    #[error("driver fault: {0}")]
    HardwareFault(String),
    #[error("device did not respond in time")]
    Timeout,
    /// The driver refused a value the core handed it.
    #[error("driver rejected value: {0}")]
    Rejected(String),
}

/// `ControllerBuilder::build` could not produce a controller.
#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing encoder")]
    MissingEncoder,
    #[error("missing force sensor")]
    MissingForceSensor,
    #[error("missing actuator")]
    MissingActuator,
    #[error("missing button")]
    MissingButton,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
