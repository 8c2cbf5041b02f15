mod common;

use std::time::Duration;

use common::{Rig, plain_cfg};
use paddle_core::config::{ControllerCfg, DynamicsCfg};
use paddle_core::dynamics::{Coefficients, ForceLaw};
use paddle_core::{PaddleError, PaddleState, TELEMETRY_CHANNELS};
use rstest::rstest;

fn still(_: &Coefficients, _: f32, _: f32, _: f32) -> f32 {
    0.0
}

/// Virtual dynamics that never move on their own.
fn frozen_cfg() -> ControllerCfg {
    ControllerCfg {
        dynamics: DynamicsCfg {
            law: ForceLaw::Custom(still),
            coefficients: Coefficients::default(),
        },
        ..plain_cfg()
    }
}

#[rstest]
#[case(1.0, 1.0)]
#[case(2.0, 2.0)]
#[case(2.5, 2.0)]
#[case(-3.0, -2.0)]
fn virtual_position_is_held_within_limit(#[case] start_rad: f32, #[case] expected: f32) {
    let rig = Rig::new();
    rig.revs.set(start_rad);
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    rig.tick(&mut c);
    assert_eq!(c.virtual_position(), expected);
    assert_eq!(c.dynamics().velocity(), 0.0);
}

#[test]
fn sustained_push_pins_virtual_position_at_limit() {
    let rig = Rig::new();
    rig.force_ready.set(true);
    rig.force_value.set(10.0);
    let mut c = rig.controller(plain_cfg(), PaddleState::Run);
    for _ in 0..200 {
        rig.tick(&mut c);
        assert!(c.virtual_position().abs() <= 2.0);
    }
    assert_eq!(c.virtual_position(), 2.0);
}

#[test]
fn run_entry_starts_dynamics_at_paddle_and_parks_motor() {
    let rig = Rig::new();
    rig.revs.set(0.75);
    rig.command.set(0.3);
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    assert!(c.is_entering());
    rig.tick(&mut c);
    assert!(!c.is_entering());
    assert_eq!(c.virtual_position(), 0.75);
    // zero error on the entry tick
    assert_eq!(c.last_command(), 0.0);
    // entry write plus the servo write
    assert_eq!(rig.actuator_writes.get(), 2);
}

#[test]
fn servo_output_saturates_at_live_bound() {
    let rig = Rig::new();
    let mut cfg = frozen_cfg();
    cfg.run.kp = 100.0;
    let mut c = rig.controller(cfg, PaddleState::Run);
    rig.tick(&mut c);
    // paddle displaced from the virtual position
    rig.revs.set(-1.0);
    rig.tick(&mut c);
    assert_eq!(rig.command.get(), 0.5);

    c.params().set_max_command(0.2);
    rig.tick(&mut c);
    assert_eq!(rig.command.get(), 0.2);

    c.params().set_max_command(f32::NAN);
    rig.tick(&mut c);
    assert_eq!(rig.command.get(), 0.0);
}

#[test]
fn run_publishes_telemetry_frame_each_tick() {
    let rig = Rig::new();
    rig.revs.set(0.5);
    rig.force_ready.set(true);
    rig.force_value.set(0.25);
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    rig.tick(&mut c);
    rig.tick(&mut c);
    let frames = rig.frames.borrow();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].len(), TELEMETRY_CHANNELS.len());
    assert_eq!(frames[1], vec![0.5, 0.5, 0.0, 0.25]);
}

#[test]
fn narrow_telemetry_gets_leading_channels_only() {
    let rig = Rig::new();
    rig.revs.set(0.5);
    let mut c = rig
        .builder_with_channels(2)
        .with_config(frozen_cfg())
        .starting_in(PaddleState::Run)
        .build()
        .unwrap();
    rig.tick(&mut c);
    assert_eq!(rig.frames.borrow()[0], vec![0.5, 0.5]);
}

#[test]
fn button_edge_in_run_moves_to_idle_once() {
    let rig = Rig::new();
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    for _ in 0..5 {
        assert_eq!(rig.tick(&mut c), PaddleState::Run);
    }
    rig.pressed.set(true);
    assert_eq!(rig.tick(&mut c), PaddleState::Idle);
    assert!(c.is_entering());
    // held press: Idle counts it, no further transitions
    for _ in 0..10 {
        assert_eq!(rig.tick(&mut c), PaddleState::Idle);
        assert_eq!(rig.command.get(), 0.0);
    }
}

#[test]
fn idle_resumes_after_debounce() {
    let rig = Rig::new();
    rig.pressed.set(true);
    let mut c = rig.controller(frozen_cfg(), PaddleState::Idle);
    for _ in 0..500 {
        assert_eq!(rig.tick(&mut c), PaddleState::Idle);
    }
    assert_eq!(rig.tick(&mut c), PaddleState::Run);
    // still held on entering Run: no edge, no bounce back
    for _ in 0..10 {
        assert_eq!(rig.tick(&mut c), PaddleState::Run);
    }
}

#[test]
fn idle_release_counts_down() {
    let rig = Rig::new();
    let mut c = rig.controller(frozen_cfg(), PaddleState::Idle);
    rig.pressed.set(true);
    for _ in 0..300 {
        rig.tick(&mut c);
    }
    rig.pressed.set(false);
    for _ in 0..100 {
        assert_eq!(rig.tick(&mut c), PaddleState::Idle);
    }
    rig.pressed.set(true);
    // counter is at 200 and needs to exceed 500
    for _ in 0..300 {
        assert_eq!(rig.tick(&mut c), PaddleState::Idle);
    }
    assert_eq!(rig.tick(&mut c), PaddleState::Run);
}

#[test]
fn force_is_held_between_samples() {
    let rig = Rig::new();
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    rig.force_ready.set(true);
    rig.force_value.set(3.0);
    rig.tick(&mut c);
    assert_eq!(c.snapshot().force, 3.0);

    rig.force_ready.set(false);
    rig.force_value.set(7.0);
    rig.tick(&mut c);
    assert_eq!(c.snapshot().force, 3.0);
    assert_eq!(rig.force_reads.get(), 1);
}

#[test]
fn failed_force_read_keeps_stale_value() {
    let rig = Rig::new();
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    rig.force_ready.set(true);
    rig.force_value.set(1.5);
    rig.tick(&mut c);
    rig.force_fails.set(true);
    rig.tick(&mut c);
    rig.tick(&mut c);
    assert_eq!(c.snapshot().force, 1.5);
    assert_eq!(c.force_read_errors(), 2);
}

#[test]
fn force_sign_flips_reading() {
    let rig = Rig::new();
    let mut cfg = frozen_cfg();
    cfg.sensor.force_sign = -1.0;
    let mut c = rig.controller(cfg, PaddleState::Run);
    rig.force_ready.set(true);
    rig.force_value.set(0.4);
    rig.tick(&mut c);
    assert_eq!(c.snapshot().force, -0.4);
}

#[test]
fn first_tick_velocity_is_zero() {
    let rig = Rig::new();
    rig.revs.set(1.25);
    let mut c = rig.controller(frozen_cfg(), PaddleState::Idle);
    rig.tick(&mut c);
    assert_eq!(c.snapshot().position, 1.25);
    assert_eq!(c.snapshot().velocity, 0.0);
    rig.revs.set(1.5);
    rig.tick(&mut c);
    assert!(c.snapshot().velocity > 0.0);
}

#[test]
fn heartbeat_toggles_with_wall_time() {
    let rig = Rig::new();
    let mut c = rig.controller(frozen_cfg(), PaddleState::Idle);
    c.step().unwrap();
    assert!(!rig.led.get());
    rig.clock.advance(Duration::from_millis(500));
    c.step().unwrap();
    assert!(rig.led.get());
    assert!(c.led_on());
    rig.clock.advance(Duration::from_millis(499));
    c.step().unwrap();
    assert!(rig.led.get());
    rig.clock.advance(Duration::from_millis(1));
    c.step().unwrap();
    assert!(!rig.led.get());
}

#[test]
fn actuator_fault_surfaces_but_tick_completes() {
    let rig = Rig::new();
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    c.request(PaddleState::Idle);
    rig.actuator_fails.set(true);
    let err = c.step().unwrap_err();
    assert!(format!("{err:#}").contains("actuator set"));
    assert!(matches!(
        err.downcast_ref::<PaddleError>(),
        Some(PaddleError::Hardware(_))
    ));
    assert_eq!(c.state(), PaddleState::Idle);
    assert_eq!(c.ticks(), 1);
}

#[test]
fn led_fault_on_run_entry_still_resets_dynamics() {
    let rig = Rig::new();
    rig.revs.set(0.75);
    rig.led_fails.set(true);
    let mut cfg = frozen_cfg();
    cfg.run.kp = 5.0;
    let mut c = rig.controller(cfg, PaddleState::Run);
    assert_eq!(rig.tick(&mut c), PaddleState::Run);
    assert!(!c.is_entering());
    assert_eq!(c.led_write_errors(), 1);
    assert_eq!(c.virtual_position(), 0.75);
    assert_eq!(c.last_command(), 0.0);

    // no stale target to chase on the following tick
    rig.tick(&mut c);
    assert_eq!(c.virtual_position(), 0.75);
    assert_eq!(rig.command.get(), 0.0);
    assert_eq!(c.led_write_errors(), 2);
}

#[rstest]
#[case(PaddleState::Calibrate, 0.15)]
#[case(PaddleState::Run, 0.0)]
#[case(PaddleState::Idle, 0.0)]
fn led_fault_never_skips_entry(#[case] state: PaddleState, #[case] command: f32) {
    let rig = Rig::new();
    rig.command.set(0.3);
    rig.led_fails.set(true);
    let mut c = rig.controller(frozen_cfg(), state);
    assert_eq!(rig.tick(&mut c), state);
    assert!(!c.is_entering());
    assert_eq!(rig.command.get(), command);
    assert_eq!(c.led_write_errors(), 1);
    assert!(!rig.led.get());
}

#[test]
fn led_recovers_without_touching_state() {
    let rig = Rig::new();
    let mut c = rig.controller(frozen_cfg(), PaddleState::Idle);
    rig.led_fails.set(true);
    rig.clock.advance(Duration::from_millis(500));
    c.step().unwrap();
    assert!(c.led_on());
    assert!(!rig.led.get());
    rig.led_fails.set(false);
    c.step().unwrap();
    assert!(rig.led.get());
    assert_eq!(c.led_write_errors(), 1);
    assert_eq!(c.state(), PaddleState::Idle);
}

#[test]
fn telemetry_fault_keeps_stop_request() {
    let rig = Rig::new();
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    for _ in 0..3 {
        rig.tick(&mut c);
    }
    rig.telemetry_fails.set(true);
    rig.pressed.set(true);
    let err = c.step().unwrap_err();
    assert!(format!("{err:#}").contains("telemetry send"));
    assert!(matches!(
        err.downcast_ref::<PaddleError>(),
        Some(PaddleError::Hardware(m)) if m == "telemetry link down"
    ));
    assert_eq!(c.state(), PaddleState::Idle);
    assert!(c.is_entering());

    // Idle publishes nothing, so the dead link no longer fails ticks
    assert_eq!(rig.tick(&mut c), PaddleState::Idle);
    assert_eq!(rig.command.get(), 0.0);
    assert_eq!(rig.frames.borrow().len(), 3);
}

#[test]
fn telemetry_fault_on_run_entry_still_resets_dynamics() {
    let rig = Rig::new();
    rig.revs.set(0.75);
    rig.command.set(0.3);
    rig.telemetry_fails.set(true);
    let mut c = rig.controller(frozen_cfg(), PaddleState::Run);
    assert!(c.step().is_err());
    assert!(!c.is_entering());
    assert_eq!(c.state(), PaddleState::Run);
    assert_eq!(c.virtual_position(), 0.75);
    assert_eq!(rig.command.get(), 0.0);
    assert!(rig.frames.borrow().is_empty());
}

#[test]
fn drop_parks_the_actuator() {
    let rig = Rig::new();
    let mut cfg = frozen_cfg();
    cfg.run.kp = 100.0;
    let mut c = rig.controller(cfg, PaddleState::Run);
    rig.tick(&mut c);
    rig.revs.set(1.0);
    rig.tick(&mut c);
    assert!(rig.command.get() < 0.0);
    drop(c);
    assert_eq!(rig.command.get(), 0.0);
}

#[test]
fn tuning_changes_apply_on_next_tick() {
    let rig = Rig::new();
    rig.force_ready.set(true);
    rig.force_value.set(0.01);
    let mut c = rig.controller(plain_cfg(), PaddleState::Run);
    rig.tick(&mut c);
    let a0 = c.dynamics().acceleration();
    c.params().set_mass(1.0);
    rig.tick(&mut c);
    let a1 = c.dynamics().acceleration();
    assert!(a1 < a0 / 1.5, "heavier mass should slow the response: {a0} -> {a1}");
}
