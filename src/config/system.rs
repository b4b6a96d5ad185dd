//! System configuration - root configuration structure.

use serde::Deserialize;

use crate::planner::N_AXIS;

/// Timebase and pulse timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Step timer rate in Hz: how often the step generator runs.
    pub isr_rate_hz: u32,

    /// Acceleration update rate; together with `isr_rate_hz` it fixes the
    /// duration of one prepared segment.
    pub accel_ticks_per_sec: u32,

    /// Step pulse width in microseconds.
    pub pulse_microseconds: u8,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            isr_rate_hz: 30_000,
            accel_ticks_per_sec: 120,
            pulse_microseconds: 10,
        }
    }
}

/// Output port polarity and idle behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Per-axis step line inversion (active-low step pulses).
    pub invert_step: [bool; N_AXIS],

    /// Per-axis direction line inversion.
    pub invert_direction: [bool; N_AXIS],

    /// Whether the stepper enable line is active-low.
    pub invert_enable: bool,

    /// Dwell before releasing the steppers after motion stops, in ms.
    /// `None` keeps the steppers energized indefinitely.
    pub idle_lock_ms: Option<u16>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            invert_step: [false; N_AXIS],
            invert_direction: [false; N_AXIS],
            invert_enable: false,
            idle_lock_ms: Some(25),
        }
    }
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Timebase and pulse timing.
    pub timing: TimingConfig,

    /// Output port polarity and idle behavior.
    pub ports: PortConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SystemConfig::default();
        assert_eq!(config.timing.isr_rate_hz, 30_000);
        assert_eq!(config.timing.accel_ticks_per_sec, 120);
        assert_eq!(config.timing.pulse_microseconds, 10);
        assert_eq!(config.ports.idle_lock_ms, Some(25));
        assert!(!config.ports.invert_enable);
    }
}
