//! Planner module for motion-exec.
//!
//! Provides validated motion blocks, the planner interface contract, and the
//! bounded reference block queue.

mod block;
mod queue;

pub use block::{Axis, Block, MAX_BLOCK_STEP_EVENTS, N_AXIS};
pub use queue::{BlockQueue, Planner};
