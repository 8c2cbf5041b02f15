use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `ready` until it returns true or `timeout` expires. Sleeps in
/// `poll_interval` steps to avoid spinning.
pub fn wait_until_ready(
    mut ready: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !ready() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Reject commands the H-bridge cannot represent.
#[inline]
pub fn check_command(command: f32) -> Result<f32> {
    if command.is_finite() && (-1.0..=1.0).contains(&command) {
        Ok(command)
    } else {
        Err(HwError::InvalidCommand(command))
    }
}

/// Two's-complement sign extension of a 24-bit ADC word.
#[inline]
pub fn sign_extend_24(value: i32) -> i32 {
    if (value & 0x80_0000) != 0 {
        value | !0xFF_FFFF
    } else {
        value & 0xFF_FFFF
    }
}
