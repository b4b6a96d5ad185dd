//! # motion-exec
//!
//! Real-time motion execution core for a three-axis stepper machine:
//! consumes a queue of planned motion blocks and produces precisely timed
//! step and direction pulses along trapezoidal velocity profiles.
//!
//! ## Architecture
//!
//! Two tiers coupled through a bounded lock-free ring:
//!
//! - The **segment preparer** runs cooperatively in the main loop. It checks
//!   step events out of the first planner blocks and slices their velocity
//!   profiles into fixed-time segments, each carrying a step rate and a step
//!   count.
//! - The **step generator** runs from a periodic timer interrupt. It plays
//!   segments out with a dual Bresenham: an inverse-time counter schedules
//!   step events, a per-axis Bresenham distributes each event so every axis
//!   emits exactly its planned step total.
//!
//! Cycle start, feed hold, and alarm arrive asynchronously and mutate a
//! shared state word both tiers observe between iterations.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use motion_exec::{Block, BlockQueue, MotionCore, SystemConfig};
//!
//! let config: SystemConfig = motion_exec::load_config("machine.toml")?;
//! let mut core = MotionCore::new(&config, BlockQueue::<18>::new(), driver)?;
//!
//! core.push_block(Block::new([800, 800, 0], 10.0, 0.0, 40.0, 500.0)?)?;
//! core.cycle_start();
//!
//! // main loop:            core.prepare_segments();
//! // step timer interrupt: core.isr_tick();
//! // pulse timer overflow: core.finish_step_pulse();
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `defmt`: Enables defmt formatting for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

// Core modules
pub mod config;
pub mod error;
pub mod exec;
pub mod hal;
pub mod planner;

// Re-exports for ergonomic API
pub use config::{validate_config, PortConfig, Settings, SystemConfig, TimingConfig};
pub use config::INV_TIME_MULTIPLIER;
pub use error::{ConfigError, Error, PlannerError, Result, StateError};
pub use exec::{
    ExecFlags, MotionCore, PartialBlockReport, ProfileShape, SysState, VelocityProfile,
    SEGMENT_RING_CAPACITY,
};
pub use hal::{PinDriver, StepDriver};
pub use planner::{Axis, Block, BlockQueue, Planner, MAX_BLOCK_STEP_EVENTS, N_AXIS};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};
