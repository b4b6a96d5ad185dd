//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::SystemConfig;

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// configuration fails validation.
///
/// # Example
///
/// ```rust,ignore
/// use motion_exec::load_config;
///
/// let config = load_config("machine.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SystemConfig> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        let msg = heapless::String::try_from(e.to_string().as_str()).unwrap_or_default();
        Error::Config(ConfigError::IoError(msg))
    })?;

    parse_config(&content)
}

/// Parse configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<SystemConfig> {
    let config: SystemConfig = toml::from_str(content).map_err(|e| {
        let msg = heapless::String::try_from(e.message()).unwrap_or_default();
        Error::Config(ConfigError::ParseError(msg))
    })?;

    super::validation::validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    fn test_parse_timing_section() {
        let toml = r#"
[timing]
isr_rate_hz = 20000
accel_ticks_per_sec = 100
pulse_microseconds = 5
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.timing.isr_rate_hz, 20_000);
        assert_eq!(config.timing.accel_ticks_per_sec, 100);
        assert_eq!(config.timing.pulse_microseconds, 5);
    }

    #[test]
    fn test_parse_port_section() {
        let toml = r#"
[ports]
invert_step = [true, false, false]
invert_direction = [false, false, true]
invert_enable = true
idle_lock_ms = 50
"#;

        let config = parse_config(toml).unwrap();
        assert!(config.ports.invert_step[0]);
        assert!(config.ports.invert_direction[2]);
        assert!(config.ports.invert_enable);
        assert_eq!(config.ports.idle_lock_ms, Some(50));
    }

    #[test]
    fn test_parse_rejects_invalid_timebase() {
        let toml = r#"
[timing]
isr_rate_hz = 1000
"#;

        // Default 120 accel ticks/s at 1 kHz exceeds the ring window.
        assert!(parse_config(toml).is_err());
    }
}
