#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod devices;
mod error_fmt;
mod rt;
mod run;
mod telemetry;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use paddle_config::Config;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{ConfigError, exit, exit_code_for_error, format_error_json, humanize};
use crate::run::{RunOptions, run, self_check};

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let _ = JSON_MODE.set(json);
    if !json {
        // pretty reports for humans; JSON mode prints its own error object
        let _ = color_eyre::install();
    }

    if let Err(err) = real_main(cli) {
        if json {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
            tracing::debug!(error = ?err, "exiting with error");
        }
        std::process::exit(exit_code_for_error(&err));
    }
    std::process::exit(exit::OK);
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = paddle_config::load_file(&cli.config)
        .map_err(|e| eyre::Report::new(ConfigError(e.to_string())))?;
    init_tracing(&cli, &cfg)?;
    tracing::debug!(config = ?cli.config, "config loaded");

    match cli.cmd {
        Commands::Run {
            ticks,
            duration_s,
            skip_calibration,
            telemetry_csv,
            commands,
            stats,
            rt,
        } => {
            let duration = match duration_s {
                Some(s) if !(s.is_finite() && s > 0.0) => {
                    eyre::bail!("--duration-s must be a positive number of seconds")
                }
                Some(s) => Some(Duration::from_secs_f64(s)),
                None => None,
            };

            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;

            let opts = RunOptions {
                ticks,
                duration,
                skip_calibration,
                telemetry_csv,
                commands,
                stats,
                rt,
                force_sim: cli.sim,
            };
            let summary = run(&cfg, opts, shutdown)?;
            if cli.json {
                println!("{}", summary.to_json());
            } else {
                summary.print_text();
            }
        }
        Commands::CheckConfig => {
            if cli.json {
                println!("{}", effective_json(&cfg));
            } else {
                print_effective(&cfg);
            }
        }
        Commands::SelfCheck => {
            let report = self_check(&cfg, cli.sim)?;
            if cli.json {
                println!("{}", serde_json::json!({ "self_check": "ok", "report": report }));
            } else {
                println!("{report}");
            }
        }
    }
    Ok(())
}

/// Console layer on stderr plus an optional JSON file layer from `[logging]`.
fn init_tracing(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .boxed()
    };

    let file = match cfg.logging.file.as_deref() {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
            let appender = match cfg.logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("initialise logging")
}

fn effective_json(cfg: &Config) -> serde_json::Value {
    serde_json::json!({
        "loop": { "sample_rate_hz": cfg.control_loop.sample_rate_hz },
        "dynamics": {
            "law": format!("{:?}", cfg.dynamics.law).to_lowercase(),
            "mass": cfg.dynamics.mass,
            "damping": cfg.dynamics.damping,
            "stiffness": cfg.dynamics.stiffness,
        },
        "sensor": {
            "rad_per_rev": cfg.sensor.rad_per_rev,
            "counts_per_rev": cfg.sensor.counts_per_rev,
            "force_sign": cfg.sensor.force_sign,
            "force_scale": cfg.sensor.force_scale,
        },
        "filter": {
            "velocity_cutoff_hz": cfg.filter.velocity_cutoff_hz,
            "force_cutoff_hz": cfg.filter.force_cutoff_hz,
            "force_filter": cfg.filter.force_filter,
        },
        "calibration": {
            "drive_command": cfg.calibration.drive_command,
            "still_velocity": cfg.calibration.still_velocity,
            "dwell_ms": cfg.calibration.dwell_ms,
        },
        "run": {
            "position_limit": cfg.run.position_limit,
            "max_command": cfg.run.max_command,
            "kp": cfg.run.kp,
            "ki": cfg.run.ki,
            "kd": cfg.run.kd,
            "derivative_cutoff_hz": cfg.run.derivative_cutoff_hz,
        },
        "idle": { "resume_ticks": cfg.idle.resume_ticks },
        "heartbeat": { "period_ms": cfg.heartbeat.period_ms },
        "pins": cfg.pins.is_some(),
    })
}

fn print_effective(cfg: &Config) {
    println!("config ok");
    println!("loop: {} Hz", cfg.control_loop.sample_rate_hz);
    println!(
        "dynamics: {:?} mass={} damping={} stiffness={}",
        cfg.dynamics.law, cfg.dynamics.mass, cfg.dynamics.damping, cfg.dynamics.stiffness
    );
    println!(
        "sensor: rad_per_rev={} counts_per_rev={} force_sign={} force_scale={}",
        cfg.sensor.rad_per_rev,
        cfg.sensor.counts_per_rev,
        cfg.sensor.force_sign,
        cfg.sensor.force_scale
    );
    println!(
        "calibration: drive={} still<{} rad/s for {} ms",
        cfg.calibration.drive_command, cfg.calibration.still_velocity, cfg.calibration.dwell_ms
    );
    println!(
        "run: limit=±{} rad max_command={} pid=({}, {}, {})",
        cfg.run.position_limit, cfg.run.max_command, cfg.run.kp, cfg.run.ki, cfg.run.kd
    );
    println!(
        "idle: resume after {} ticks; heartbeat {} ms",
        cfg.idle.resume_ticks, cfg.heartbeat.period_ms
    );
    if cfg.pins.is_none() {
        println!("pins: none (simulator only)");
    }
}
