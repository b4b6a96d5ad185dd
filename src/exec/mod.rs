//! Execution pipeline for motion-exec.
//!
//! Couples the non-real-time segment preparer to the hard-real-time step
//! generator through a bounded single-producer single-consumer segment ring,
//! under the cycle-control state machine.

mod cycle;
mod generator;
mod prep;
mod profile;
mod ring;
mod segment;
mod state;

#[cfg(test)]
pub(crate) mod testutil;

pub use cycle::MotionCore;
pub use prep::PartialBlockReport;
pub use profile::{ProfileShape, VelocityProfile};
pub use ring::SEGMENT_RING_CAPACITY;
pub use state::{ExecFlags, SysState};
