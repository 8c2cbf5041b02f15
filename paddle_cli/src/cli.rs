//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "paddle", version, about = "Haptic paddle controller")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/paddle.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Use the simulated rig even when built with hardware support
    #[arg(long, action = ArgAction::SetTrue)]
    pub sim: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority, pins the process to one CPU and locks its address space with mlockall. Needs CAP_SYS_NICE / CAP_IPC_LOCK (or root); failures are logged and the loop keeps running without them."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority (clamped to the system range; default: max)
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to (default 0)
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop
    Run {
        /// Stop after this many ticks
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Stop after this many seconds
        #[arg(long = "duration-s", value_name = "S")]
        duration_s: Option<f64>,
        /// Start in Run with the encoder zero as centre
        #[arg(long, action = ArgAction::SetTrue)]
        skip_calibration: bool,
        /// Record Run telemetry frames to a CSV file
        #[arg(long, value_name = "FILE")]
        telemetry_csv: Option<PathBuf>,
        /// Accept tuning commands (mass|damping|stiffness|max|show) on stdin
        #[arg(long, action = ArgAction::SetTrue)]
        commands: bool,
        /// Print loop latency and deadline stats
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Load and validate the config, then print the effective values
    CheckConfig,
    /// Instantiate the devices and run a short smoke test
    SelfCheck,
}
