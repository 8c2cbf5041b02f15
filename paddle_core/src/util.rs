//! Loop timing and output saturation helpers.

/// Loop period in whole microseconds; never 0.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    debug_assert!(hz > 0, "sample_rate_hz must be > 0");
    (1_000_000 / u64::from(hz.max(1))).max(1)
}

/// Integration step in seconds for a loop rate in Hz.
#[inline]
pub fn dt_secs(hz: u32) -> f32 {
    1.0 / hz.max(1) as f32
}

/// Symmetric saturation that never panics.
///
/// A non-finite `value` maps to 0; a non-finite `bound` is treated as 0 so a
/// corrupted limit parks the output instead of letting it through.
#[inline]
pub fn saturate(value: f32, bound: f32) -> f32 {
    let bound = if bound.is_finite() { bound.abs() } else { 0.0 };
    if !value.is_finite() {
        return 0.0;
    }
    value.max(-bound).min(bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_and_dt_match_rate() {
        assert_eq!(period_us(500), 2000);
        assert_eq!(period_us(3_000_000), 1);
        assert_eq!(dt_secs(500), 0.002);
        assert_eq!(dt_secs(2), 0.5);
    }

    #[test]
    fn saturate_is_symmetric() {
        assert_eq!(saturate(0.7, 0.5), 0.5);
        assert_eq!(saturate(-0.7, 0.5), -0.5);
        assert_eq!(saturate(0.2, 0.5), 0.2);
        assert_eq!(saturate(0.2, -0.5), 0.2);
    }

    #[test]
    fn saturate_handles_non_finite() {
        assert_eq!(saturate(f32::NAN, 0.5), 0.0);
        assert_eq!(saturate(f32::INFINITY, 0.5), 0.0);
        assert_eq!(saturate(0.3, f32::NAN), 0.0);
    }
}
