//! Derived runtime settings computed from the system configuration.

use crate::config::SystemConfig;
use crate::hal::{direction_bit, step_bit};
use crate::planner::Axis;

/// Scaling factor for the inverse-time distance counters.
///
/// One counter unit is `1 / INV_TIME_MULTIPLIER` mm. A power of two keeps
/// the single-precision scaling in the preparer exact; the value is large
/// enough that the per-tick decrement stays integer-accurate at slow feed
/// rates and small enough that the per-step reload fits `u32` for any block
/// the planner boundary accepts.
pub const INV_TIME_MULTIPLIER: u32 = 1 << 24;

/// Runtime settings derived once at initialization and shared by the
/// preparer and the step generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Step timer rate in Hz.
    pub isr_rate: u32,

    /// Duration of one prepared segment, in seconds.
    pub dt_segment: f32,

    /// Step pulse width in microseconds.
    pub pulse_microseconds: u8,

    /// Invert mask for the whole stepping port, XOR'd into every write.
    pub invert_mask: u8,

    /// Dwell before releasing the steppers after motion stops; `None` keeps
    /// them energized.
    pub idle_lock_ms: Option<u16>,
}

impl Settings {
    /// Compute derived settings from a validated configuration.
    pub fn from_config(config: &SystemConfig) -> Self {
        let mut invert_mask = 0u8;
        for axis in Axis::ALL {
            if config.ports.invert_step[axis.index()] {
                invert_mask |= step_bit(axis);
            }
            if config.ports.invert_direction[axis.index()] {
                invert_mask |= direction_bit(axis);
            }
        }

        Self {
            isr_rate: config.timing.isr_rate_hz,
            dt_segment: config.timing.accel_ticks_per_sec as f32
                / config.timing.isr_rate_hz as f32,
            pulse_microseconds: config.timing.pulse_microseconds,
            invert_mask,
            idle_lock_ms: config.ports.idle_lock_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{DIRECTION_MASK, STEP_MASK};

    #[test]
    fn test_dt_segment_from_rates() {
        let settings = Settings::from_config(&SystemConfig::default());
        // 120 / 30000
        assert!((settings.dt_segment - 0.004).abs() < 1e-7);
    }

    #[test]
    fn test_invert_mask_layout() {
        let mut config = SystemConfig::default();
        config.ports.invert_step = [true, false, true];
        config.ports.invert_direction = [false, true, false];
        let settings = Settings::from_config(&config);

        assert_eq!(settings.invert_mask & STEP_MASK, step_bit(Axis::X) | step_bit(Axis::Z));
        assert_eq!(settings.invert_mask & DIRECTION_MASK, direction_bit(Axis::Y));
    }
}
