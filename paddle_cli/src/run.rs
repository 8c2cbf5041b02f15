//! Fixed-rate loop driver, run statistics and the smoke test.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use paddle_config::Config;
use paddle_core::{CommandReader, PaddleState};
use paddle_hardware::MemoryTelemetry;

use crate::cli::RtArgs;
use crate::devices::assemble;
use crate::rt::{RtOutcome, setup_rt_once};
use crate::telemetry::CsvRecorder;

/// Sleep until this close to the deadline, then spin.
const SPIN_MARGIN: Duration = Duration::from_micros(200);

pub struct RunOptions {
    pub ticks: Option<u64>,
    pub duration: Option<Duration>,
    pub skip_calibration: bool,
    pub telemetry_csv: Option<PathBuf>,
    pub commands: bool,
    pub stats: bool,
    pub rt: RtArgs,
    pub force_sim: bool,
}

/// Step latency and wake-up statistics in microseconds.
#[derive(Debug, Default)]
pub struct LoopStats {
    latencies_us: Vec<u64>,
    pub missed_deadlines: u64,
    pub max_lateness_us: u64,
}

impl LoopStats {
    fn record(&mut self, latency: Duration, lateness: Duration, period: Duration) {
        self.latencies_us.push(latency.as_micros() as u64);
        let late_us = lateness.as_micros() as u64;
        self.max_lateness_us = self.max_lateness_us.max(late_us);
        if lateness + latency > period {
            self.missed_deadlines += 1;
        }
    }

    pub fn samples(&self) -> usize {
        self.latencies_us.len()
    }

    /// (min, avg, max, stdev)
    pub fn latency(&self) -> (u64, f64, u64, f64) {
        let n = self.latencies_us.len();
        if n == 0 {
            return (0, 0.0, 0, 0.0);
        }
        let min = self.latencies_us.iter().copied().min().unwrap_or(0);
        let max = self.latencies_us.iter().copied().max().unwrap_or(0);
        let avg = self.latencies_us.iter().sum::<u64>() as f64 / n as f64;
        let stdev = if n > 1 {
            let var = self
                .latencies_us
                .iter()
                .map(|&x| (x as f64 - avg).powi(2))
                .sum::<f64>()
                / (n as f64 - 1.0);
            var.sqrt()
        } else {
            0.0
        };
        (min, avg, max, stdev)
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub backend: &'static str,
    pub ticks: u64,
    pub duration: Duration,
    pub final_state: PaddleState,
    pub offset_rev: f32,
    pub position: f32,
    pub virtual_position: f32,
    pub force_read_errors: u64,
    pub led_write_errors: u64,
    pub telemetry_rows: Option<u64>,
    pub commands_applied: Option<u64>,
    pub stats: LoopStats,
    pub rt: RtOutcome,
    pub sample_rate_hz: u32,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Value {
        let (min, avg, max, stdev) = self.stats.latency();
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        serde_json::json!({
            "timestamp": ts,
            "backend": self.backend,
            "ticks": self.ticks,
            "duration_ms": self.duration.as_millis() as u64,
            "final_state": self.final_state.as_str(),
            "offset_rev": self.offset_rev,
            "position": self.position,
            "virtual_position": self.virtual_position,
            "force_read_errors": self.force_read_errors,
            "led_write_errors": self.led_write_errors,
            "telemetry_rows": self.telemetry_rows,
            "commands_applied": self.commands_applied,
            "missed_deadlines": self.stats.missed_deadlines,
            "latency_us": { "min": min, "avg": avg, "max": max, "stdev": stdev },
            "rt": {
                "mem_locked": self.rt.mem_locked,
                "fifo_prio": self.rt.fifo_prio,
                "cpu": self.rt.cpu,
            },
        })
    }

    pub fn print_text(&self) {
        println!(
            "run complete: {} ticks in {:.3} s ({} backend), final state {}",
            self.ticks,
            self.duration.as_secs_f64(),
            self.backend,
            self.final_state
        );
        println!(
            "offset_rev={:.4} position={:.4} rad virtual={:.4} rad force_read_errors={}",
            self.offset_rev, self.position, self.virtual_position, self.force_read_errors
        );
        if self.led_write_errors > 0 {
            println!("led_write_errors={}", self.led_write_errors);
        }
        if let Some(rows) = self.telemetry_rows {
            println!("telemetry rows written: {rows}");
        }
    }

    /// Latency/jitter stats to stderr.
    pub fn print_stats(&self) {
        let (min, avg, max, stdev) = self.stats.latency();
        let period_us = paddle_core::util::period_us(self.sample_rate_hz);
        eprintln!("\n--- Paddle Loop Stats ---");
        eprintln!("Samples: {}", self.stats.samples());
        eprintln!("Period (us): {period_us}");
        eprintln!("Step latency min/avg/max/stdev (us): {min} / {avg:.1} / {max} / {stdev:.1}");
        eprintln!("Max wake-up lateness (us): {}", self.stats.max_lateness_us);
        eprintln!("Missed deadlines (> period): {}", self.stats.missed_deadlines);
        eprintln!("-------------------------\n");
    }
}

/// Sleep most of the way to `deadline`, spin the rest.
fn wait_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now + SPIN_MARGIN {
        std::thread::sleep(deadline - now - SPIN_MARGIN);
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

pub fn run(cfg: &Config, opts: RunOptions, shutdown: Arc<AtomicBool>) -> eyre::Result<RunSummary> {
    let rt = setup_rt_once(&opts.rt);
    let assembled = assemble(cfg, opts.skip_calibration, opts.force_sim)?;
    let backend = assembled.backend;

    let (builder, recorder) = match opts.telemetry_csv.as_deref() {
        Some(path) => {
            let (sink, rec) = CsvRecorder::spawn(path)?;
            (assembled.builder.with_telemetry(sink), Some(rec))
        }
        None => (assembled.builder, None),
    };
    let mut controller = builder.build().wrap_err("build controller")?;

    let commands = if opts.commands {
        let reader = CommandReader::spawn(
            std::io::BufReader::new(std::io::stdin()),
            std::io::stderr(),
            Arc::clone(controller.params()),
        )
        .wrap_err("start command reader")?;
        tracing::info!("accepting tuning commands on stdin");
        Some(reader)
    } else {
        None
    };

    let sample_rate_hz = cfg.control_loop.sample_rate_hz;
    let period = Duration::from_micros(paddle_core::util::period_us(sample_rate_hz));
    let started = Instant::now();
    let stop_at = opts.duration.map(|d| started + d);
    let mut stats = LoopStats::default();
    let mut deadline = started;
    let mut last_state = controller.state();

    tracing::info!(
        sample_rate_hz,
        ticks = ?opts.ticks,
        duration_s = ?opts.duration.map(|d| d.as_secs_f64()),
        "control loop start"
    );

    let outcome = loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break Ok(());
        }
        if opts.ticks.is_some_and(|n| controller.ticks() >= n) {
            break Ok(());
        }
        if stop_at.is_some_and(|t| Instant::now() >= t) {
            break Ok(());
        }

        wait_until(deadline);
        let woke = Instant::now();
        let res = controller.step();
        let done = Instant::now();
        stats.record(done - woke, woke.saturating_duration_since(deadline), period);

        match res {
            Ok(state) => {
                if state != last_state {
                    tracing::debug!(from = %last_state, to = %state, tick = controller.ticks(), "transition");
                    last_state = state;
                }
            }
            Err(e) => break Err(e),
        }

        deadline += period;
        // after an overrun, resynchronise instead of bursting to catch up
        if done > deadline + period {
            deadline = done;
        }
    };

    let parked = controller.park();
    let snapshot = controller.snapshot();
    let summary_base = (
        controller.ticks(),
        controller.state(),
        controller.offset_rev(),
        controller.virtual_position(),
        controller.force_read_errors(),
        controller.led_write_errors(),
    );
    // dropping the controller drops the telemetry sender and closes the writer
    drop(controller);
    outcome?;
    parked.wrap_err("park actuator")?;

    let telemetry_rows = match recorder {
        Some(rec) => Some(rec.finish()?),
        None => None,
    };
    let commands_applied = match commands {
        Some(reader) if reader.is_finished() => Some(reader.join()?),
        _ => None,
    };

    let (ticks, final_state, offset_rev, virtual_position, force_read_errors, led_write_errors) =
        summary_base;
    let summary = RunSummary {
        backend,
        ticks,
        duration: started.elapsed(),
        final_state,
        offset_rev,
        position: snapshot.position,
        virtual_position,
        force_read_errors,
        led_write_errors,
        telemetry_rows,
        commands_applied,
        stats,
        rt,
        sample_rate_hz,
    };
    if opts.stats {
        summary.print_stats();
    }
    Ok(summary)
}

/// Instantiate the devices, run a few ticks in Run, and on the simulator
/// check that a button press hands over to Idle with the motor off.
pub fn self_check(cfg: &Config, force_sim: bool) -> eyre::Result<String> {
    const SMOKE_TICKS: u64 = 25;

    let assembled = assemble(cfg, true, force_sim)?;
    let backend = assembled.backend;
    let sim = assembled.sim.clone();
    let telemetry = MemoryTelemetry::new(paddle_core::TELEMETRY_CHANNELS.len());
    let frames = telemetry.clone();
    let mut controller = assembled
        .builder
        .with_telemetry(telemetry)
        .build()
        .wrap_err("build controller")?;

    let period = Duration::from_micros(paddle_core::util::period_us(
        cfg.control_loop.sample_rate_hz,
    ));
    for _ in 0..SMOKE_TICKS {
        controller.step()?;
        std::thread::sleep(period);
    }
    if controller.force_read_errors() > 0 {
        eyre::bail!(
            "loadcell read failed {} times during self-check",
            controller.force_read_errors()
        );
    }
    let sent = frames.frames().len();
    if sent as u64 != SMOKE_TICKS {
        eyre::bail!("expected {SMOKE_TICKS} telemetry frames in Run, got {sent}");
    }

    if let Some(sim) = sim {
        sim.button.press();
        let state = controller.step()?;
        sim.button.release();
        if state != PaddleState::Idle {
            eyre::bail!("button press did not stop the paddle (state {state})");
        }
        controller.step()?;
        if controller.last_command() != 0.0 || sim.paddle.command() != 0.0 {
            eyre::bail!("actuator not parked in Idle");
        }
    }
    controller.park()?;
    Ok(format!(
        "self-check ok: backend={backend} ticks={} frames={sent} position={:.4} rad",
        controller.ticks(),
        controller.snapshot().position
    ))
}
