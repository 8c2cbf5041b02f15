//! Trait-boundary errors into `PaddleError`.
//!
//! Device traits return `Box<dyn Error + Send + Sync>`. With the
//! `hardware-errors` feature the driver's `HwError` is matched exactly;
//! anything else is classified by its message.

use crate::error::PaddleError;

pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PaddleError {
    #[cfg(feature = "hardware-errors")]
    {
        use paddle_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => PaddleError::Timeout,
                HwError::InvalidCommand(_) => PaddleError::Rejected(hw.to_string()),
                HwError::Gpio(_) | HwError::Io(_) => PaddleError::HardwareFault(hw.to_string()),
            };
        }
    }

    let msg = e.to_string();
    if msg.to_ascii_lowercase().contains("timeout") {
        PaddleError::Timeout
    } else {
        PaddleError::Hardware(msg)
    }
}
