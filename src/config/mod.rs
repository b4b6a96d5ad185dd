//! Configuration module for motion-exec.
//!
//! Provides the TOML-backed system configuration (with the `std` feature),
//! its validation pass, and the derived runtime settings shared by the
//! preparer and the step generator.

mod settings;
mod system;
mod validation;
#[cfg(feature = "std")]
mod loader;

pub use settings::{Settings, INV_TIME_MULTIPLIER};
pub use system::{PortConfig, SystemConfig, TimingConfig};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};
