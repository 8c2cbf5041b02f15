use paddle_config::{LawKind, load_file, load_toml};
use rstest::rstest;
use std::io::Write;

const BENCH: &str = r#"
[loop]
sample_rate_hz = 500

[dynamics]
law = "spring_damper"
mass = 0.5
damping = 30.0
stiffness = 50.0

[sensor]
rad_per_rev = 1.5707964
force_sign = -1.0
force_scale = 0.0001

[filter]
velocity_cutoff_hz = 30.0
force_cutoff_hz = 50.0

[calibration]
drive_command = 0.15
still_velocity = 0.1
dwell_ms = 1000

[run]
position_limit = 2.0
max_command = 0.5

[idle]
resume_ticks = 500

[pins]
encoder_a = 17
encoder_b = 27
hx711_dt = 5
hx711_sck = 6
motor_pwm = 12
motor_dir = 24
button = 22
led = 25
"#;

#[test]
fn accepts_bench_config() {
    let cfg = load_toml(BENCH).expect("parse TOML");
    cfg.validate().expect("bench config is valid");
    assert_eq!(cfg.sensor.force_sign, -1.0);
    let pins = cfg.pins.expect("pins present");
    assert_eq!(pins.led, Some(25));
}

#[rstest]
#[case("[loop]\nsample_rate_hz = 0\n", "loop.sample_rate_hz must be > 0")]
#[case("[dynamics]\nmass = 0.0\n", "dynamics.mass must be > 0")]
#[case("[dynamics]\ndamping = -1.0\n", "dynamics.damping must be >= 0")]
#[case("[dynamics]\nstiffness = -0.5\n", "dynamics.stiffness must be >= 0")]
#[case("[sensor]\nrad_per_rev = 0.0\n", "sensor.rad_per_rev must be non-zero")]
#[case("[sensor]\nforce_sign = 0.5\n", "sensor.force_sign must be 1.0 or -1.0")]
#[case("[filter]\nvelocity_cutoff_hz = 250.0\n", "filter.velocity_cutoff_hz")]
#[case("[filter]\nforce_cutoff_hz = 0.0\n", "filter.force_cutoff_hz")]
#[case("[run]\nmax_command = 1.5\n", "run.max_command must be in (0.0, 1.0]")]
#[case("[run]\nmax_command = 0.1\n", "calibration.drive_command must not exceed")]
#[case("[run]\nposition_limit = 0.0\n", "run.position_limit must be > 0")]
#[case("[run]\nkp = -1.0\n", "run.kp must be >= 0")]
#[case("[idle]\nresume_ticks = 0\n", "idle.resume_ticks must be >= 1")]
#[case("[heartbeat]\nperiod_ms = 0\n", "heartbeat.period_ms must be >= 1")]
#[case("[calibration]\ndwell_ms = 0\n", "calibration.dwell_ms must be >= 1")]
#[case("[sim]\nstart_rad = 3.0\n", "sim.start_rad must lie within")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        err.to_string().contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn damper_law_ignores_stiffness_but_still_checks_it() {
    let cfg = load_toml("[dynamics]\nlaw = \"damper\"\nstiffness = 0.0\n").unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.dynamics.law, LawKind::Damper);
}

#[test]
fn unknown_section_field_type_is_a_parse_error() {
    assert!(load_toml("[loop]\nsample_rate_hz = \"fast\"\n").is_err());
}

#[test]
fn load_file_parses_and_validates() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(BENCH.as_bytes()).unwrap();
    let cfg = load_file(f.path()).unwrap();
    assert_eq!(cfg.control_loop.sample_rate_hz, 500);

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    bad.write_all(b"[dynamics]\nmass = -1.0\n").unwrap();
    let err = load_file(bad.path()).unwrap_err();
    assert!(err.to_string().contains("dynamics.mass"));
}

#[test]
fn load_file_reports_missing_path() {
    let err = load_file(std::path::Path::new("/nonexistent/paddle.toml")).unwrap_err();
    assert!(err.to_string().contains("read config"));
}

#[test]
fn shipped_config_loads_with_default_values() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../etc/paddle.toml");
    let cfg = load_file(&path).expect("etc/paddle.toml is valid");
    assert_eq!(cfg.control_loop.sample_rate_hz, 500);
    assert_eq!(cfg.dynamics.law, LawKind::SpringDamper);
    assert_eq!(cfg.run.max_command, 0.5);
    assert_eq!(cfg.idle.resume_ticks, 500);
    assert!(cfg.pins.is_none());
    assert_eq!(cfg.logging.rotation.as_deref(), Some("never"));
}
