//! Human-readable error descriptions and structured JSON error formatting.

use paddle_core::error::{BuildError, PaddleError};

/// Stable process exit codes.
pub mod exit {
    pub const OK: i32 = 0;
    pub const ERROR: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const HARDWARE: i32 = 4;
    pub const TIMEOUT: i32 = 5;
}

/// Marker for errors that originate in config loading or validation.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<ConfigError>() {
        return format!(
            "What happened: The configuration was rejected ({ce}).\nLikely causes: A missing file, a TOML typo, or an out-of-range value.\nHow to fix: Run `paddle check-config --config <FILE>` and fix the key it names."
        );
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: The controller refused its configuration ({msg}).\nLikely causes: Values that pass TOML parsing but cannot drive the loop.\nHow to fix: Edit the config file, then rerun."
            ),
            other => format!(
                "What happened: The controller could not be assembled ({other}).\nLikely causes: A device failed to initialise and was not passed to the builder.\nHow to fix: Check the [pins] section and the wiring, then rerun self-check."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PaddleError>() {
        return match pe {
            PaddleError::Timeout => "What happened: A device did not respond in time.\nLikely causes: HX711 not wired or unpowered, wrong DT/SCK pins.\nHow to fix: Verify [pins] hx711_dt / hx711_sck and 5V/GND, then run self-check.".to_string(),
            PaddleError::Hardware(m) | PaddleError::HardwareFault(m) => format!(
                "What happened: A device reported a fault ({m}).\nLikely causes: Motor driver or GPIO error, or a command the driver rejected.\nHow to fix: Check the H-bridge wiring and GPIO permissions; re-run with --log-level=debug."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("gpio") {
        return "What happened: Failed to initialize GPIO pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access /dev/gpiomem.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Exit code for an error, by the first typed cause found in the chain.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    for cause in err.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return exit::CONFIG;
        }
        if let Some(be) = cause.downcast_ref::<BuildError>() {
            return match be {
                BuildError::InvalidConfig(_) => exit::CONFIG,
                _ => exit::HARDWARE,
            };
        }
        if let Some(pe) = cause.downcast_ref::<PaddleError>() {
            return match pe {
                PaddleError::Timeout => exit::TIMEOUT,
                PaddleError::Hardware(_) | PaddleError::HardwareFault(_) => exit::HARDWARE,
                PaddleError::Rejected(_) => exit::ERROR,
            };
        }
    }
    exit::ERROR
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match exit_code_for_error(err) {
        exit::CONFIG => "Config",
        exit::HARDWARE => "Hardware",
        exit::TIMEOUT => "Timeout",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
        "chain": err.chain().map(|c| c.to_string()).collect::<Vec<_>>(),
    })
    .to_string()
}
