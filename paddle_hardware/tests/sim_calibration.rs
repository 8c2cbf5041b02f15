//! The simulated plant closes the loop: end stops are found and the
//! virtual spring pulls toward the hand torque equilibrium.
use std::sync::Arc;
use std::time::Duration;

use paddle_hardware::sim::{SimPaddle, SimPaddleCfg};
use paddle_traits::clock::test_clock::TestClock;
use paddle_traits::{Actuator, Encoder, ForceSensor};

#[test]
fn drive_into_both_stops_reports_symmetric_range() {
    let clock = TestClock::new();
    let paddle = SimPaddle::new(SimPaddleCfg::default(), Arc::new(clock.clone()));
    let enc = paddle.encoder();
    let mut motor = paddle.motor();

    let mut settle = |command: f32| {
        motor.set(command).unwrap();
        for _ in 0..200 {
            clock.advance(Duration::from_millis(10));
            let _ = enc.revolutions();
        }
        enc.revolutions()
    };
    let cw = settle(0.15);
    let ccw = settle(-0.15);
    let centre = (cw + ccw) / 2.0;
    // start angle was 0.4 rad from the centre
    let expected = -0.4 / core::f32::consts::FRAC_PI_2;
    assert!((centre - expected).abs() < 1e-3, "centre {centre}");
}

#[test]
fn loadcell_follows_user_torque_changes() {
    let clock = TestClock::new();
    let paddle = SimPaddle::new(
        SimPaddleCfg {
            loadcell_every: 1,
            ..SimPaddleCfg::default()
        },
        Arc::new(clock.clone()),
    );
    let mut lc = paddle.loadcell();
    paddle.set_user_torque(0.05);
    assert!(lc.is_ready());
    assert_eq!(lc.read().unwrap(), 0.05);
}
