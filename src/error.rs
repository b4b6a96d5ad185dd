//! Error types for motion-exec.
//!
//! Provides unified error handling across configuration, planner-boundary
//! validation, and cycle-state operations. The step generator itself never
//! returns errors: ring starvation is an orderly stop and re-entrance is a
//! silent no-op, both observable only through the system state word.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all motion-exec operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Planner block or queue error
    Planner(PlannerError),
    /// Operation rejected in the current system state
    State(StateError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Step timer rate must be non-zero
    InvalidIsrRate(u32),
    /// Acceleration tick rate must be non-zero and no faster than the step timer
    InvalidAccelTicks {
        /// Configured acceleration ticks per second
        accel_ticks_per_sec: u32,
        /// Configured step timer rate in Hz
        isr_rate_hz: u32,
    },
    /// Step pulse width must be at least one microsecond
    InvalidPulseWidth(u8),
    /// A full segment ring would span more motion time than the preparer can guarantee to refill
    SegmentWindowTooLong {
        /// Time represented by a full ring, in milliseconds
        window_ms: u32,
        /// Maximum allowed window, in milliseconds
        limit_ms: u32,
    },
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Planner-boundary errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// Block queue has no free slot
    QueueFull,
    /// Block carries no step events on any axis
    EmptyBlock,
    /// Path length must be > 0 mm
    InvalidLength(f32),
    /// Acceleration must be > 0 mm/s²
    InvalidAcceleration(f32),
    /// Nominal speed must be > 0 mm/s
    InvalidNominalSpeed(f32),
    /// Entry speed above nominal violates the planner contract
    EntrySpeedExceedsNominal {
        /// Requested entry speed in mm/s
        entry: f32,
        /// Block nominal speed in mm/s
        nominal: f32,
    },
    /// Block exceeds the step count trackable in single precision
    BlockTooLong {
        /// Requested step event count
        step_events: u32,
    },
}

/// Cycle-state errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// System is in alarm and must be reset first
    Alarmed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Planner(e) => write!(f, "Planner error: {}", e),
            Error::State(e) => write!(f, "State error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidIsrRate(v) => {
                write!(f, "Invalid step timer rate: {} Hz. Must be > 0", v)
            }
            ConfigError::InvalidAccelTicks {
                accel_ticks_per_sec,
                isr_rate_hz,
            } => write!(
                f,
                "Invalid acceleration tick rate: {}. Must be 1..={} (the step timer rate)",
                accel_ticks_per_sec, isr_rate_hz
            ),
            ConfigError::InvalidPulseWidth(v) => {
                write!(f, "Invalid step pulse width: {} us. Must be >= 1", v)
            }
            ConfigError::SegmentWindowTooLong { window_ms, limit_ms } => write!(
                f,
                "Full segment ring spans {} ms of motion, limit is {} ms",
                window_ms, limit_ms
            ),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::QueueFull => write!(f, "Block queue is full"),
            PlannerError::EmptyBlock => write!(f, "Block has zero step events"),
            PlannerError::InvalidLength(v) => {
                write!(f, "Invalid path length: {} mm. Must be > 0", v)
            }
            PlannerError::InvalidAcceleration(v) => {
                write!(f, "Invalid acceleration: {} mm/s^2. Must be > 0", v)
            }
            PlannerError::InvalidNominalSpeed(v) => {
                write!(f, "Invalid nominal speed: {} mm/s. Must be > 0", v)
            }
            PlannerError::EntrySpeedExceedsNominal { entry, nominal } => {
                write!(f, "Entry speed {} exceeds nominal speed {}", entry, nominal)
            }
            PlannerError::BlockTooLong { step_events } => write!(
                f,
                "Block of {} step events exceeds the single-precision tracking limit",
                step_events
            ),
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Alarmed => write!(f, "System is in alarm state"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<PlannerError> for Error {
    fn from(e: PlannerError) -> Self {
        Error::Planner(e)
    }
}

impl From<StateError> for Error {
    fn from(e: StateError) -> Self {
        Error::State(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for PlannerError {}

#[cfg(feature = "std")]
impl std::error::Error for StateError {}
