//! Device assembly: config → a `ControllerBuilder` with every device wired.

use std::sync::Arc;

use paddle_config::Config;
use paddle_core::{ControllerBuilder, ControllerCfg, PaddleState};
use paddle_hardware::{SimButton, SimLed, SimPaddle, SimPaddleCfg};
use paddle_traits::clock::{Clock, MonotonicClock};

/// Handles kept by the CLI to observe or poke the simulated rig.
#[derive(Clone)]
pub struct SimHandles {
    pub paddle: SimPaddle,
    pub button: SimButton,
    pub led: SimLed,
}

pub struct Assembled {
    pub builder: ControllerBuilder,
    /// Present for the simulator backend only.
    pub sim: Option<SimHandles>,
    /// Encoder revolutions at the mechanical centre, if known without calibrating.
    pub centre_rev: f32,
    pub backend: &'static str,
}

pub fn sim_paddle_cfg(cfg: &Config) -> SimPaddleCfg {
    SimPaddleCfg {
        range_rad: cfg.sim.range_rad,
        start_rad: cfg.sim.start_rad,
        user_torque: cfg.sim.user_torque,
        rad_per_rev: cfg.sensor.rad_per_rev,
        loadcell_every: cfg.sim.loadcell_every,
        ..SimPaddleCfg::default()
    }
}

fn base_builder(cfg: &Config, skip_calibration: bool) -> ControllerBuilder {
    let initial = if skip_calibration {
        PaddleState::Run
    } else {
        PaddleState::Calibrate
    };
    ControllerBuilder::default()
        .with_config(ControllerCfg::from(cfg))
        .with_clock(MonotonicClock::new())
        .starting_in(initial)
}

/// Simulated rig running against the wall clock.
pub fn assemble_sim(cfg: &Config, skip_calibration: bool) -> Assembled {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let paddle = SimPaddle::new(sim_paddle_cfg(cfg), clock);
    let button = SimButton::new();
    let led = SimLed::new();
    // the sim encoder reads zero at the start angle
    let centre_rev = -cfg.sim.start_rad / cfg.sensor.rad_per_rev;

    let builder = base_builder(cfg, skip_calibration)
        .with_encoder(paddle.encoder())
        .with_force_sensor(paddle.loadcell())
        .with_actuator(paddle.motor())
        .with_button(button.clone())
        .with_led(led.clone())
        .with_offset_rev(if skip_calibration { centre_rev } else { 0.0 });

    tracing::info!(backend = "sim", "devices ready");
    Assembled {
        builder,
        sim: Some(SimHandles { paddle, button, led }),
        centre_rev,
        backend: "sim",
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn assemble_hardware(cfg: &Config, skip_calibration: bool) -> eyre::Result<Assembled> {
    use eyre::WrapErr;
    use paddle_hardware::hx711::{Hx711, Hx711Loadcell};
    use paddle_hardware::rpi::{GpioButton, GpioLed, PwmMotor, QuadratureEncoder, open_gpio};
    use std::time::Duration;

    let Some(pins) = cfg.pins.as_ref() else {
        eyre::bail!("[pins] section is required for the hardware backend");
    };
    let gpio = open_gpio().wrap_err("open gpio")?;

    let encoder = QuadratureEncoder::new(
        &gpio,
        pins.encoder_a,
        pins.encoder_b,
        cfg.sensor.counts_per_rev,
    )
    .wrap_err("open encoder pins")?;
    let mut loadcell = Hx711Loadcell::new(
        Hx711::open(&gpio, pins.hx711_dt, pins.hx711_sck, 25).wrap_err("open hx711")?,
        cfg.sensor.force_scale,
    );
    loadcell
        .tare(16, Duration::from_millis(200))
        .wrap_err("tare loadcell")?;
    let motor =
        PwmMotor::new(&gpio, pins.motor_pwm, pins.motor_dir).wrap_err("open motor pins")?;
    let button = GpioButton::new(&gpio, pins.button).wrap_err("open button pin")?;

    let mut builder = base_builder(cfg, skip_calibration)
        .with_encoder(encoder)
        .with_force_sensor(loadcell)
        .with_actuator(motor)
        .with_button(button);
    if let Some(led) = pins.led {
        builder = builder.with_led(GpioLed::new(&gpio, led).wrap_err("open led pin")?);
    }

    tracing::info!(backend = "rpi", "devices ready");
    Ok(Assembled {
        builder,
        sim: None,
        // assumes the paddle was centred at power-up
        centre_rev: 0.0,
        backend: "rpi",
    })
}

/// Hardware backend when compiled in and not overridden, the simulator otherwise.
pub fn assemble(cfg: &Config, skip_calibration: bool, force_sim: bool) -> eyre::Result<Assembled> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        if !force_sim {
            return assemble_hardware(cfg, skip_calibration);
        }
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let _ = force_sim;
    Ok(assemble_sim(cfg, skip_calibration))
}
