//! Planner motion blocks.
//!
//! A block is one linear multi-axis move with a trapezoidal velocity profile
//! planned upstream. Blocks are validated at construction and become immutable
//! once checked out by the step generator; the planner may still recompute the
//! speed fields of blocks that have not been checked out.

use crate::error::PlannerError;
use crate::hal;

/// Number of controlled linear axes.
pub const N_AXIS: usize = 3;

/// Largest step event count a block may carry.
///
/// The preparer tracks the remaining step events of the executing block in
/// single precision; beyond roughly ten million steps the float can no longer
/// represent every step exactly, so oversized blocks are rejected at the
/// planner boundary instead.
pub const MAX_BLOCK_STEP_EVENTS: u32 = 10_000_000;

/// A machine axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// X axis
    X = 0,
    /// Y axis
    Y = 1,
    /// Z axis
    Z = 2,
}

impl Axis {
    /// All axes, in port bit order.
    pub const ALL: [Axis; N_AXIS] = [Axis::X, Axis::Y, Axis::Z];

    /// Array index for per-axis data.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One planned linear move.
///
/// Speeds are stored squared, in (mm/s)², the form the upstream junction
/// planner naturally produces and consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Block {
    /// Step events per axis (absolute counts).
    pub steps: [u32; N_AXIS],

    /// Maximum of the per-axis step counts; the Bresenham major count.
    pub step_event_count: u32,

    /// Direction bit per axis, in stepping-port layout (set = negative travel).
    pub direction_bits: u8,

    /// Euclidean path length in mm.
    pub millimeters: f32,

    /// Squared speed entering the block, (mm/s)².
    pub entry_speed_sqr: f32,

    /// Squared programmed speed for the block, (mm/s)².
    pub nominal_speed_sqr: f32,

    /// Acceleration along the path, mm/s².
    pub acceleration: f32,
}

impl Block {
    /// Build a validated block from signed per-axis step counts.
    ///
    /// `entry_speed` and `nominal_speed` are in mm/s, `acceleration` in mm/s².
    ///
    /// # Errors
    ///
    /// Rejects blocks with no steps, non-positive length, speed or
    /// acceleration outside the planner contract, or more step events than
    /// single-precision tracking supports.
    pub fn new(
        steps: [i32; N_AXIS],
        millimeters: f32,
        entry_speed: f32,
        nominal_speed: f32,
        acceleration: f32,
    ) -> Result<Self, PlannerError> {
        let mut abs_steps = [0u32; N_AXIS];
        let mut direction_bits = 0u8;
        for axis in Axis::ALL {
            let s = steps[axis.index()];
            abs_steps[axis.index()] = s.unsigned_abs();
            if s < 0 {
                direction_bits |= hal::direction_bit(axis);
            }
        }

        let step_event_count = abs_steps[0].max(abs_steps[1]).max(abs_steps[2]);
        if step_event_count == 0 {
            return Err(PlannerError::EmptyBlock);
        }
        if step_event_count > MAX_BLOCK_STEP_EVENTS {
            return Err(PlannerError::BlockTooLong {
                step_events: step_event_count,
            });
        }
        if !(millimeters > 0.0) {
            return Err(PlannerError::InvalidLength(millimeters));
        }
        if !(acceleration > 0.0) {
            return Err(PlannerError::InvalidAcceleration(acceleration));
        }
        if !(nominal_speed > 0.0) {
            return Err(PlannerError::InvalidNominalSpeed(nominal_speed));
        }
        if entry_speed < 0.0 || entry_speed > nominal_speed {
            return Err(PlannerError::EntrySpeedExceedsNominal {
                entry: entry_speed,
                nominal: nominal_speed,
            });
        }

        Ok(Self {
            steps: abs_steps,
            step_event_count,
            direction_bits,
            millimeters,
            entry_speed_sqr: entry_speed * entry_speed,
            nominal_speed_sqr: nominal_speed * nominal_speed,
            acceleration,
        })
    }

    /// Whether the block travels in the negative direction on `axis`.
    #[inline]
    pub fn is_reverse(&self, axis: Axis) -> bool {
        self.direction_bits & hal::direction_bit(axis) != 0
    }

    /// Step resolution of this block, in steps per mm of path.
    #[inline]
    pub fn step_per_mm(&self) -> f32 {
        self.step_event_count as f32 / self.millimeters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_bits_from_signs() {
        let block = Block::new([100, -50, 0], 10.0, 0.0, 20.0, 100.0).unwrap();
        assert!(!block.is_reverse(Axis::X));
        assert!(block.is_reverse(Axis::Y));
        assert!(!block.is_reverse(Axis::Z));
        assert_eq!(block.steps, [100, 50, 0]);
    }

    #[test]
    fn test_step_event_count_is_major_axis() {
        let block = Block::new([7, -30, 12], 3.0, 0.0, 10.0, 50.0).unwrap();
        assert_eq!(block.step_event_count, 30);
    }

    #[test]
    fn test_speeds_stored_squared() {
        let block = Block::new([100, 0, 0], 10.0, 5.0, 20.0, 100.0).unwrap();
        assert!((block.entry_speed_sqr - 25.0).abs() < 1e-6);
        assert!((block.nominal_speed_sqr - 400.0).abs() < 1e-4);
    }

    #[test]
    fn test_rejects_empty_block() {
        assert_eq!(
            Block::new([0, 0, 0], 1.0, 0.0, 10.0, 50.0),
            Err(PlannerError::EmptyBlock)
        );
    }

    #[test]
    fn test_rejects_entry_above_nominal() {
        assert!(matches!(
            Block::new([10, 0, 0], 1.0, 20.0, 10.0, 50.0),
            Err(PlannerError::EntrySpeedExceedsNominal { .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_block() {
        assert!(matches!(
            Block::new([20_000_000, 0, 0], 25_000.0, 0.0, 50.0, 100.0),
            Err(PlannerError::BlockTooLong { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_scalars() {
        assert!(Block::new([10, 0, 0], 0.0, 0.0, 10.0, 50.0).is_err());
        assert!(Block::new([10, 0, 0], 1.0, 0.0, 0.0, 50.0).is_err());
        assert!(Block::new([10, 0, 0], 1.0, 0.0, 10.0, 0.0).is_err());
    }
}
