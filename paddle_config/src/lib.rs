#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the haptic paddle.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; an empty file yields the bench defaults
//!   (500 Hz loop, 0.5 g·m² / 30 / 50 spring-damper, ±2 rad, ±0.5 command).
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoopCfg {
    /// Control loop rate; the virtual dynamics step is 1 / rate.
    pub sample_rate_hz: u32,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LawKind {
    Damper,
    #[default]
    SpringDamper,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DynamicsCfg {
    pub law: LawKind,
    /// Virtual inertia [g·m²]
    pub mass: f32,
    /// Virtual damping [mN·m·s/rad]
    pub damping: f32,
    /// Virtual stiffness [mN·m/rad]; ignored by the damper law
    pub stiffness: f32,
}

impl Default for DynamicsCfg {
    fn default() -> Self {
        Self {
            law: LawKind::SpringDamper,
            mass: 0.5,
            damping: 30.0,
            stiffness: 50.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    /// Paddle radians per encoder revolution (2π / gear ratio)
    pub rad_per_rev: f32,
    /// Encoder counts per motor revolution (X4 decoded)
    pub counts_per_rev: u32,
    /// +1 or -1 to align the loadcell with the position convention
    pub force_sign: f32,
    /// Loadcell units per raw count
    pub force_scale: f32,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            rad_per_rev: std::f32::consts::FRAC_PI_2,
            counts_per_rev: 4096,
            force_sign: 1.0,
            force_scale: 0.0001,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterCfg {
    pub velocity_cutoff_hz: f32,
    pub force_cutoff_hz: f32,
    /// Disable to feed the raw loadcell value to the dynamics.
    pub force_filter: bool,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            velocity_cutoff_hz: 30.0,
            force_cutoff_hz: 50.0,
            force_filter: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    pub drive_command: f32,
    pub still_velocity: f32,
    pub dwell_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            drive_command: 0.15,
            still_velocity: 0.1,
            dwell_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunCfg {
    pub position_limit: f32,
    pub max_command: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Derivative filter cutoff; 0 disables the filter
    pub derivative_cutoff_hz: f32,
}

impl Default for RunCfg {
    fn default() -> Self {
        Self {
            position_limit: 2.0,
            max_command: 0.5,
            kp: 5.0,
            ki: 0.1,
            kd: 0.0,
            derivative_cutoff_hz: 50.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IdleCfg {
    pub resume_ticks: u32,
}

impl Default for IdleCfg {
    fn default() -> Self {
        Self { resume_ticks: 500 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HeartbeatCfg {
    pub period_ms: u64,
}

impl Default for HeartbeatCfg {
    fn default() -> Self {
        Self { period_ms: 500 }
    }
}

/// BCM pin numbers for the hardware backend.
#[derive(Debug, Deserialize)]
pub struct Pins {
    pub encoder_a: u8,
    pub encoder_b: u8,
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub motor_pwm: u8,
    pub motor_dir: u8,
    pub button: u8,
    pub led: Option<u8>,
}

/// Simulated plant used when no hardware backend is compiled in.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimCfg {
    /// End stops at ±range [rad]
    pub range_rad: f32,
    /// Paddle angle at power-up relative to the mechanical centre [rad]
    pub start_rad: f32,
    /// Constant torque applied by the "hand" [N·m]
    pub user_torque: f32,
    /// Loadcell produces a sample every N polls
    pub loadcell_every: u32,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            range_rad: 1.2,
            start_rad: 0.4,
            user_torque: 0.0,
            loadcell_every: 6,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default, rename = "loop")]
    pub control_loop: LoopCfg,
    #[serde(default)]
    pub dynamics: DynamicsCfg,
    #[serde(default)]
    pub sensor: SensorCfg,
    #[serde(default)]
    pub filter: FilterCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub run: RunCfg,
    #[serde(default)]
    pub idle: IdleCfg,
    #[serde(default)]
    pub heartbeat: HeartbeatCfg,
    /// Required only by the hardware backend.
    #[serde(default)]
    pub pins: Option<Pins>,
    #[serde(default)]
    pub sim: SimCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn finite_positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Loop
        let fs = self.control_loop.sample_rate_hz;
        if fs == 0 {
            eyre::bail!("loop.sample_rate_hz must be > 0");
        }
        if fs > 20_000 {
            eyre::bail!("loop.sample_rate_hz is unreasonably large (>20 kHz)");
        }
        let nyquist = fs as f32 / 2.0;

        // Dynamics
        if !finite_positive(self.dynamics.mass) {
            eyre::bail!("dynamics.mass must be > 0");
        }
        if !(self.dynamics.damping.is_finite() && self.dynamics.damping >= 0.0) {
            eyre::bail!("dynamics.damping must be >= 0");
        }
        if !(self.dynamics.stiffness.is_finite() && self.dynamics.stiffness >= 0.0) {
            eyre::bail!("dynamics.stiffness must be >= 0");
        }

        // Sensor
        if !(self.sensor.rad_per_rev.is_finite() && self.sensor.rad_per_rev != 0.0) {
            eyre::bail!("sensor.rad_per_rev must be non-zero");
        }
        if self.sensor.counts_per_rev == 0 {
            eyre::bail!("sensor.counts_per_rev must be >= 1");
        }
        if self.sensor.force_sign != 1.0 && self.sensor.force_sign != -1.0 {
            eyre::bail!("sensor.force_sign must be 1.0 or -1.0");
        }
        if !(self.sensor.force_scale.is_finite() && self.sensor.force_scale != 0.0) {
            eyre::bail!("sensor.force_scale must be non-zero");
        }

        // Filter
        for (name, fc) in [
            ("filter.velocity_cutoff_hz", self.filter.velocity_cutoff_hz),
            ("filter.force_cutoff_hz", self.filter.force_cutoff_hz),
        ] {
            if !finite_positive(fc) || fc >= nyquist {
                eyre::bail!("{name} must be in (0, sample_rate_hz / 2)");
            }
        }

        // Calibration
        if !(finite_positive(self.calibration.drive_command) && self.calibration.drive_command <= 1.0)
        {
            eyre::bail!("calibration.drive_command must be in (0.0, 1.0]");
        }
        if !finite_positive(self.calibration.still_velocity) {
            eyre::bail!("calibration.still_velocity must be > 0");
        }
        if self.calibration.dwell_ms == 0 {
            eyre::bail!("calibration.dwell_ms must be >= 1");
        }

        // Run
        if !finite_positive(self.run.position_limit) {
            eyre::bail!("run.position_limit must be > 0");
        }
        if !(finite_positive(self.run.max_command) && self.run.max_command <= 1.0) {
            eyre::bail!("run.max_command must be in (0.0, 1.0]");
        }
        if self.calibration.drive_command > self.run.max_command {
            eyre::bail!("calibration.drive_command must not exceed run.max_command");
        }
        for (name, g) in [
            ("run.kp", self.run.kp),
            ("run.ki", self.run.ki),
            ("run.kd", self.run.kd),
        ] {
            if !(g.is_finite() && g >= 0.0) {
                eyre::bail!("{name} must be >= 0");
            }
        }
        let dc = self.run.derivative_cutoff_hz;
        if !(dc.is_finite() && dc >= 0.0 && dc < nyquist) {
            eyre::bail!("run.derivative_cutoff_hz must be in [0, sample_rate_hz / 2)");
        }

        // Idle
        if self.idle.resume_ticks == 0 {
            eyre::bail!("idle.resume_ticks must be >= 1");
        }

        // Heartbeat
        if self.heartbeat.period_ms == 0 {
            eyre::bail!("heartbeat.period_ms must be >= 1");
        }

        // Sim
        if !finite_positive(self.sim.range_rad) {
            eyre::bail!("sim.range_rad must be > 0");
        }
        if !(self.sim.start_rad.is_finite() && self.sim.start_rad.abs() <= self.sim.range_rad) {
            eyre::bail!("sim.start_rad must lie within ±sim.range_rad");
        }
        if self.sim.loadcell_every == 0 {
            eyre::bail!("sim.loadcell_every must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = load_toml("").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.control_loop.sample_rate_hz, 500);
        assert_eq!(cfg.dynamics.law, LawKind::SpringDamper);
        assert_eq!(cfg.idle.resume_ticks, 500);
        assert!(cfg.pins.is_none());
    }

    #[test]
    fn law_parses_snake_case() {
        let cfg = load_toml("[dynamics]\nlaw = \"damper\"\n").unwrap();
        assert_eq!(cfg.dynamics.law, LawKind::Damper);
        assert!(load_toml("[dynamics]\nlaw = \"spring\"\n").is_err());
    }
}
