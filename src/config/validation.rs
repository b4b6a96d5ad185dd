//! Configuration validation.

use crate::config::SystemConfig;
use crate::error::ConfigError;
use crate::exec::SEGMENT_RING_CAPACITY;

/// Longest motion window a full segment ring may represent, in milliseconds.
///
/// The preparer runs cooperatively from the main loop; the ring must drain
/// slowly enough that one main-loop pass can always refill it in time.
const MAX_RING_WINDOW_MS: u32 = 60;

/// Validate a system configuration.
///
/// # Errors
///
/// Returns the first `ConfigError` found. Checks the timebase rates, the
/// pulse width, and that a full segment ring stays within the refill window
/// the preparer can guarantee.
pub fn validate_config(config: &SystemConfig) -> Result<(), ConfigError> {
    let timing = &config.timing;

    if timing.isr_rate_hz == 0 {
        return Err(ConfigError::InvalidIsrRate(timing.isr_rate_hz));
    }
    if timing.accel_ticks_per_sec == 0 || timing.accel_ticks_per_sec > timing.isr_rate_hz {
        return Err(ConfigError::InvalidAccelTicks {
            accel_ticks_per_sec: timing.accel_ticks_per_sec,
            isr_rate_hz: timing.isr_rate_hz,
        });
    }
    if timing.pulse_microseconds == 0 {
        return Err(ConfigError::InvalidPulseWidth(timing.pulse_microseconds));
    }

    let dt_segment = timing.accel_ticks_per_sec as f32 / timing.isr_rate_hz as f32;
    let window_ms = (SEGMENT_RING_CAPACITY as f32 * dt_segment * 1000.0) as u32;
    if window_ms > MAX_RING_WINDOW_MS {
        return Err(ConfigError::SegmentWindowTooLong {
            window_ms,
            limit_ms: MAX_RING_WINDOW_MS,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SystemConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_isr_rate_rejected() {
        let mut config = SystemConfig::default();
        config.timing.isr_rate_hz = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidIsrRate(0))
        ));
    }

    #[test]
    fn test_accel_ticks_above_isr_rate_rejected() {
        let mut config = SystemConfig::default();
        config.timing.accel_ticks_per_sec = config.timing.isr_rate_hz + 1;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidAccelTicks { .. })
        ));
    }

    #[test]
    fn test_zero_pulse_width_rejected() {
        let mut config = SystemConfig::default();
        config.timing.pulse_microseconds = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPulseWidth(0))
        ));
    }

    #[test]
    fn test_oversized_ring_window_rejected() {
        // 120 accel ticks/s over a 1 kHz step timer: 120 ms segments.
        let mut config = SystemConfig::default();
        config.timing.isr_rate_hz = 1_000;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::SegmentWindowTooLong { .. })
        ));
    }
}
