//! Velocity profile classification.
//!
//! Classifies a planner block's remaining velocity profile into one of seven
//! shapes and computes the ramp boundaries the preparer slices against. All
//! values here are in mm; the preparer converts to step units afterwards.

use libm::sqrtf;

use crate::planner::Block;

/// The seven possible shapes of a block's velocity profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileShape {
    /// Entry, nominal, and exit speeds all equal: constant rate throughout.
    Cruise,
    /// Enters at nominal, decelerates to the exit speed at the end.
    CruiseDecel,
    /// Accelerates to nominal, holds it to the end.
    AccelCruise,
    /// Accelerates to nominal, cruises, decelerates.
    Trapezoid,
    /// Accelerates then decelerates without reaching nominal.
    Triangle,
    /// Accelerates for the whole block without reaching nominal.
    AccelOnly,
    /// Decelerates for the whole block.
    DecelOnly,
}

/// Ramp boundaries of a block's velocity profile, in mm.
///
/// `accelerate_until` and `decelerate_after` are remaining path lengths:
/// acceleration runs while more than `accelerate_until` mm remain, and
/// deceleration runs once no more than `decelerate_after` mm remain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VelocityProfile {
    /// Remaining distance at which acceleration ends.
    pub accelerate_until: f32,

    /// Remaining distance at which deceleration begins.
    pub decelerate_after: f32,

    /// Peak speed reached by the profile, mm/s.
    pub maximum_rate: f32,

    /// Which of the seven shapes this profile is.
    pub shape: ProfileShape,
}

impl VelocityProfile {
    /// Classify the profile of `block` given the squared exit speed, which is
    /// the entry speed of the following block or zero at the end of the plan.
    pub fn for_block(block: &Block, exit_speed_sqr: f32) -> Self {
        let length = block.millimeters;
        let entry_sqr = block.entry_speed_sqr;
        let nominal_sqr = block.nominal_speed_sqr;
        let two_a = 2.0 * block.acceleration;

        if entry_sqr == nominal_sqr {
            if exit_speed_sqr == nominal_sqr {
                return Self {
                    accelerate_until: length,
                    decelerate_after: 0.0,
                    maximum_rate: sqrtf(nominal_sqr),
                    shape: ProfileShape::Cruise,
                };
            }
            return Self {
                accelerate_until: length,
                decelerate_after: (nominal_sqr - exit_speed_sqr) / two_a,
                maximum_rate: sqrtf(nominal_sqr),
                shape: ProfileShape::CruiseDecel,
            };
        }

        if exit_speed_sqr == nominal_sqr {
            return Self {
                accelerate_until: length - (nominal_sqr - entry_sqr) / two_a,
                decelerate_after: 0.0,
                maximum_rate: sqrtf(nominal_sqr),
                shape: ProfileShape::AccelCruise,
            };
        }

        // Where an all-acceleration ramp from the entry speed would meet an
        // all-deceleration ramp into the exit speed, as remaining distance.
        let intersection = 0.5 * (length + (entry_sqr - exit_speed_sqr) / two_a);

        if intersection <= 0.0 {
            return Self {
                accelerate_until: 0.0,
                decelerate_after: 0.0,
                maximum_rate: sqrtf(exit_speed_sqr),
                shape: ProfileShape::AccelOnly,
            };
        }
        if intersection >= length {
            return Self {
                accelerate_until: length,
                decelerate_after: length,
                maximum_rate: sqrtf(entry_sqr),
                shape: ProfileShape::DecelOnly,
            };
        }

        let decelerate_after = (nominal_sqr - exit_speed_sqr) / two_a;
        if decelerate_after < intersection {
            Self {
                accelerate_until: length - (nominal_sqr - entry_sqr) / two_a,
                decelerate_after,
                maximum_rate: sqrtf(nominal_sqr),
                shape: ProfileShape::Trapezoid,
            }
        } else {
            Self {
                accelerate_until: length - intersection,
                decelerate_after: intersection,
                maximum_rate: sqrtf(two_a * intersection + exit_speed_sqr),
                shape: ProfileShape::Triangle,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(
        millimeters: f32,
        entry: f32,
        nominal: f32,
        acceleration: f32,
    ) -> Block {
        Block::new([1000, 0, 0], millimeters, entry, nominal, acceleration).unwrap()
    }

    #[test]
    fn test_cruise() {
        let b = block(10.0, 10.0, 10.0, 100.0);
        let p = VelocityProfile::for_block(&b, 100.0);
        assert_eq!(p.shape, ProfileShape::Cruise);
        assert_eq!(p.accelerate_until, 10.0);
        assert_eq!(p.decelerate_after, 0.0);
        assert!((p.maximum_rate - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_cruise_decel() {
        let b = block(10.0, 10.0, 10.0, 100.0);
        let p = VelocityProfile::for_block(&b, 0.0);
        assert_eq!(p.shape, ProfileShape::CruiseDecel);
        assert_eq!(p.accelerate_until, 10.0);
        // (100 - 0) / (2 * 100)
        assert!((p.decelerate_after - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_accel_cruise() {
        let b = block(10.0, 0.0, 10.0, 100.0);
        let p = VelocityProfile::for_block(&b, 100.0);
        assert_eq!(p.shape, ProfileShape::AccelCruise);
        assert!((p.accelerate_until - 9.5).abs() < 1e-5);
        assert_eq!(p.decelerate_after, 0.0);
    }

    #[test]
    fn test_symmetric_trapezoid() {
        // 100 mm, rest to rest, 50 mm/s nominal, 500 mm/s².
        let b = block(100.0, 0.0, 50.0, 500.0);
        let p = VelocityProfile::for_block(&b, 0.0);
        assert_eq!(p.shape, ProfileShape::Trapezoid);
        assert!((p.accelerate_until - 97.5).abs() < 1e-3);
        assert!((p.decelerate_after - 2.5).abs() < 1e-4);
        assert!((p.maximum_rate - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_triangle_peak_below_nominal() {
        // 1 mm, rest to rest, nominal far out of reach.
        let b = block(1.0, 0.0, 100.0, 500.0);
        let p = VelocityProfile::for_block(&b, 0.0);
        assert_eq!(p.shape, ProfileShape::Triangle);
        assert!((p.decelerate_after - 0.5).abs() < 1e-5);
        assert!((p.accelerate_until - 0.5).abs() < 1e-5);
        // sqrt(2 * 500 * 0.5) = sqrt(500)
        assert!((p.maximum_rate - 22.3607).abs() < 1e-3);
        assert!(p.maximum_rate < 100.0);
    }

    #[test]
    fn test_accel_only() {
        // Exit faster than the ramp can reach from entry over this length.
        let b = block(0.5, 0.0, 40.0, 100.0);
        let p = VelocityProfile::for_block(&b, 400.0);
        assert_eq!(p.shape, ProfileShape::AccelOnly);
        assert_eq!(p.accelerate_until, 0.0);
        assert_eq!(p.decelerate_after, 0.0);
        assert!((p.maximum_rate - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_decel_only() {
        // Entry so fast the whole block is deceleration.
        let b = block(0.5, 20.0, 40.0, 100.0);
        let p = VelocityProfile::for_block(&b, 0.0);
        assert_eq!(p.shape, ProfileShape::DecelOnly);
        assert_eq!(p.decelerate_after, 0.5);
        assert!((p.maximum_rate - 20.0).abs() < 1e-4);
    }
}
