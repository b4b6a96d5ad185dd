//! Segment preparer.
//!
//! Runs cooperatively in the main loop whenever a cycle is active. Each call
//! checks step events out of the first planner blocks and slices their
//! velocity profiles into fixed-time segments until the ring is full or the
//! planner drains. Computations are carried out in steps and seconds to keep
//! the single-precision round-off bounded.

use libm::{ceilf, sqrtf};

use crate::config::INV_TIME_MULTIPLIER;
use crate::hal::StepDriver;
use crate::planner::Planner;

use super::cycle::MotionCore;
use super::profile::VelocityProfile;
use super::ring::DATA_RING_CAPACITY;
use super::segment::{BlockRuntime, Segment, SegmentFlags};
use super::state::{PrepState, SysState};

/// Floor applied to rate sums in terminal-time computations, in steps/s.
/// Keeps the slice time finite when a deceleration runs all the way to zero.
const MINIMUM_STEP_RATE: f32 = 1.0;

/// Preparer bookkeeping: which planner block is being sliced and where its
/// shared runtime lives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Preparer {
    pub state: PrepState,
    /// Planner slot index of the block being prepped.
    pub block_index: usize,
    /// Shared block data slot the current block's segments reference.
    pub data_index: usize,
}

impl Preparer {
    pub fn new(block_index: usize) -> Self {
        Self {
            state: PrepState::FreshBlock,
            block_index,
            data_index: 0,
        }
    }

    pub fn reset(&mut self, block_index: usize) {
        self.state = PrepState::FreshBlock;
        self.block_index = block_index;
        self.data_index = 0;
    }
}

/// Snapshot handed to the planner when it reclaims the in-flight block for
/// replanning.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PartialBlockReport {
    /// Path length not yet checked out into segments, in mm.
    pub millimeters_remaining: f32,

    /// Whether the checked-out profile is already past its deceleration
    /// point.
    pub is_decelerating: bool,
}

impl<P: Planner, D: StepDriver> MotionCore<P, D> {
    /// Fill the segment ring from the planner queue.
    ///
    /// Call from every main-loop pass while motion is active; the step
    /// generator drains the ring from interrupt context. Returns without
    /// work unless the state is `Cycle` or `Hold`; under `Hold` the bound
    /// block is finished but no new block is taken in.
    pub fn prepare_segments(&mut self) {
        if !matches!(self.state, SysState::Cycle | SysState::Hold) {
            return;
        }
        loop {
            if self.ring.is_full() {
                return;
            }
            if self.prep.state != PrepState::Draining && !self.intake_block() {
                return;
            }
            if !self.slice_segment() {
                return;
            }
        }
    }

    /// Reclaim the block being prepped so the planner can recompute it.
    ///
    /// Reports the path length not yet sliced into segments and whether the
    /// sliced profile is already decelerating, then flags the preparer to
    /// re-enter the block through the partial-block continuation. Returns
    /// `None` when `block_index` is not the block being prepped (in
    /// particular, right after a block boundary).
    pub fn fetch_partial_block(&mut self, block_index: usize) -> Option<PartialBlockReport> {
        if self.prep.state != PrepState::Draining || block_index != self.prep.block_index {
            return None;
        }
        let data = &self.block_data[self.prep.data_index];
        let report = PartialBlockReport {
            millimeters_remaining: data.step_events_remaining / data.step_per_mm,
            is_decelerating: data.step_events_remaining < data.decelerate_after,
        };
        self.prep.state = PrepState::PartialBlock;
        Some(report)
    }

    /// Planner slot index of the block currently being prepped.
    #[inline]
    pub fn prep_block_index(&self) -> usize {
        self.prep.block_index
    }

    /// Bind the next planner block and build its shared runtime. Returns
    /// `false` when no block is available.
    fn intake_block(&mut self) -> bool {
        // Finish the bound block while holding, but start nothing new.
        if self.state == SysState::Hold {
            return false;
        }
        let block = match self.planner.block(self.prep.block_index) {
            Some(b) => *b,
            None => return false,
        };

        let prev = self.block_data[self.prep.data_index];
        self.prep.data_index = (self.prep.data_index + 1) % DATA_RING_CAPACITY;

        let mut data = if self.prep.state == PrepState::PartialBlock {
            // The planner recomputed this block mid-execution; the executed
            // share of its step events must not be re-emitted.
            BlockRuntime {
                step_events_remaining: prev.step_events_remaining,
                dist_per_step: prev.dist_per_step,
                step_per_mm: prev.step_per_mm,
                acceleration: prev.acceleration,
                ..BlockRuntime::default()
            }
        } else {
            let step_per_mm = block.step_per_mm();
            BlockRuntime {
                step_events_remaining: block.step_event_count as f32,
                dist_per_step: ceilf(INV_TIME_MULTIPLIER as f32 / step_per_mm) as u32,
                step_per_mm,
                acceleration: step_per_mm * block.acceleration,
                ..BlockRuntime::default()
            }
        };

        // Exit speed is the next block's entry speed, or zero at the end of
        // the plan.
        let next_index = self.planner.next_index(self.prep.block_index);
        let exit_speed_sqr = self
            .planner
            .block(next_index)
            .map(|b| b.entry_speed_sqr)
            .unwrap_or(0.0);

        let profile = VelocityProfile::for_block(&block, exit_speed_sqr);
        data.current_rate = data.step_per_mm * sqrtf(block.entry_speed_sqr);
        data.exit_rate = data.step_per_mm * sqrtf(exit_speed_sqr);
        data.maximum_rate = data.step_per_mm * profile.maximum_rate;
        data.accelerate_until = data.step_per_mm * profile.accelerate_until;
        data.decelerate_after = data.step_per_mm * profile.decelerate_after;

        self.block_data[self.prep.data_index] = data;
        self.prep.state = PrepState::Draining;
        true
    }

    /// Slice one segment off the bound block and publish it. Returns `false`
    /// without publishing when the profile has stalled at zero speed (feed
    /// hold) and the tail must wait for the partial-block handoff.
    fn slice_segment(&mut self) -> bool {
        let dt_quantum = self.settings.dt_segment;
        let index = self.prep.data_index;
        let mut data = self.block_data[index];

        let steps_start = data.step_events_remaining;
        let mut remaining = steps_start;
        let mut dt = 0.0f32;

        // Advance in whole time quanta until the slice carries at least one
        // whole step event.
        loop {
            dt += advance_quantum(&mut data, &mut remaining, dt_quantum);
            if remaining <= 0.0 {
                break;
            }
            if ceilf(steps_start) - ceilf(remaining) >= 1.0 {
                break;
            }
            if data.current_rate < MINIMUM_STEP_RATE && remaining <= data.decelerate_after {
                // Deceleration reached zero speed short of the block end.
                data.step_events_remaining = remaining;
                self.block_data[index] = data;
                return false;
            }
        }

        let steps_consumed = steps_start - remaining;
        let mm_rate = steps_consumed / dt / data.step_per_mm;
        let dist_per_tick =
            ceilf(mm_rate * (INV_TIME_MULTIPLIER as f32 / self.settings.isr_rate as f32)) as u32;

        let mut flags = SegmentFlags::default();
        let n_step;
        let n_phase_tick;
        if remaining > 0.0 {
            n_step = (ceilf(steps_start) - ceilf(remaining)).min(255.0) as u8;
            // Ticks covering the fractional step left at the boundary, so
            // the next segment's first pulse lands on the step period.
            let leftover_dist = (ceilf(remaining) - remaining) * data.dist_per_step as f32;
            n_phase_tick = ceilf(leftover_dist / dist_per_tick as f32).min(255.0) as u8;
        } else {
            n_step = ceilf(steps_start).min(255.0) as u8;
            n_phase_tick = 0;
            flags.set_end_of_block();
            self.prep.block_index = self.planner.next_index(self.prep.block_index);
            self.prep.state = PrepState::FreshBlock;
        }

        data.step_events_remaining = remaining;
        self.block_data[index] = data;
        self.ring.push(Segment {
            n_step,
            n_phase_tick,
            dist_per_tick,
            data_index: index,
            flags,
        });
        true
    }
}

/// Advance the profile simulation by up to one time quantum, crossing ramp
/// boundaries with the trapezoid-area forms. Updates `remaining` and the
/// runtime rate; returns the time actually consumed.
fn advance_quantum(data: &mut BlockRuntime, remaining: &mut f32, quantum: f32) -> f32 {
    let mut dt = 0.0f32;
    let mut budget = quantum;

    // Acceleration ramp.
    if *remaining > data.accelerate_until {
        let travel = data.current_rate * budget + 0.5 * data.acceleration * budget * budget;
        if *remaining - travel < data.accelerate_until {
            // Ramp ends inside this quantum.
            let consumed = *remaining - data.accelerate_until;
            *remaining = data.accelerate_until;
            let t = 2.0 * consumed / (data.current_rate + data.maximum_rate);
            data.current_rate = data.maximum_rate;
            dt += t;
            budget = (budget - t).max(0.0);
        } else {
            *remaining -= travel;
            data.current_rate += data.acceleration * budget;
            return dt + budget;
        }
    }

    // Cruise.
    if budget > 0.0 && *remaining > 0.0 && *remaining > data.decelerate_after {
        let travel = data.maximum_rate * budget;
        if *remaining - travel < data.decelerate_after {
            let consumed = *remaining - data.decelerate_after;
            *remaining = data.decelerate_after;
            let t = consumed / data.maximum_rate;
            dt += t;
            budget = (budget - t).max(0.0);
        } else {
            *remaining -= travel;
            return dt + budget;
        }
    }

    // Deceleration ramp.
    if budget > 0.0 && *remaining > 0.0 {
        let travel = budget * (data.current_rate - 0.5 * data.acceleration * budget);
        let next_rate = data.current_rate - data.acceleration * budget;
        if *remaining - travel <= 0.0 {
            // Block end inside this quantum.
            let rate_sum = (data.current_rate + data.exit_rate).max(MINIMUM_STEP_RATE);
            dt += 2.0 * *remaining / rate_sum;
            *remaining = 0.0;
            data.current_rate = data.exit_rate;
        } else if next_rate <= data.exit_rate {
            // The ramp meets the exit speed inside this quantum.
            let rate_sum = (data.current_rate + data.exit_rate).max(MINIMUM_STEP_RATE);
            let ramp_steps = ((data.current_rate * data.current_rate
                - data.exit_rate * data.exit_rate)
                / (2.0 * data.acceleration))
                .max(0.0);
            if *remaining - ramp_steps < 1.0 {
                // Close enough to the block end to finish it out.
                dt += 2.0 * *remaining / rate_sum;
                *remaining = 0.0;
            } else {
                // Zero speed ahead of the block end (feed hold): consume
                // what the ramp covers and leave the tail.
                dt += 2.0 * ramp_steps / rate_sum;
                *remaining -= ramp_steps;
            }
            data.current_rate = data.exit_rate;
        } else {
            *remaining -= travel;
            data.current_rate = next_rate;
            dt += budget;
        }
    }

    dt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::exec::testutil::RecordingDriver;
    use crate::planner::{Block, BlockQueue};

    type TestCore = MotionCore<BlockQueue<8>, RecordingDriver>;

    fn make_core() -> TestCore {
        MotionCore::new(
            &SystemConfig::default(),
            BlockQueue::new(),
            RecordingDriver::default(),
        )
        .unwrap()
    }

    fn drain_block_counting_steps(core: &mut TestCore) -> u32 {
        let mut total = 0u32;
        loop {
            core.prepare_segments();
            let Some(seg) = core.ring.peek() else {
                panic!("ring starved before end of block");
            };
            assert!(seg.n_step >= 1, "zero-step segment published");
            total += seg.n_step as u32;
            core.ring.advance_tail();
            if seg.flags.end_of_block() {
                return total;
            }
        }
    }

    #[test]
    fn test_segments_carry_at_least_one_step() {
        let mut core = make_core();
        // 10 steps/mm at 10 mm/s: 100 steps/s, 0.4 steps per quantum.
        core.push_block(Block::new([100, 0, 0], 10.0, 10.0, 10.0, 100.0).unwrap())
            .unwrap();
        core.cycle_start();

        assert!(core.ring.len() > 0);
        for seg in core.ring.queued() {
            assert!(seg.n_step >= 1);
        }
    }

    #[test]
    fn test_exact_step_total_for_trapezoid() {
        let mut core = make_core();
        core.push_block(Block::new([1000, 1000, 0], 100.0, 0.0, 50.0, 500.0).unwrap())
            .unwrap();
        core.cycle_start();

        assert_eq!(drain_block_counting_steps(&mut core), 1000);
    }

    #[test]
    fn test_exact_step_total_for_single_step_block() {
        let mut core = make_core();
        core.push_block(Block::new([1, 0, 0], 0.1, 0.0, 10.0, 100.0).unwrap())
            .unwrap();
        core.cycle_start();

        let seg = core.ring.peek().unwrap();
        assert_eq!(seg.n_step, 1);
        assert_eq!(seg.n_phase_tick, 0);
        assert!(seg.flags.end_of_block());
        // One segment is the whole block.
        assert_eq!(core.ring.len(), 1);
    }

    #[test]
    fn test_partial_block_handoff_carries_runtime() {
        let mut core = make_core();
        core.push_block(Block::new([1000, 0, 0], 100.0, 0.0, 50.0, 500.0).unwrap())
            .unwrap();
        core.cycle_start();

        let index = core.prep_block_index();
        let sliced: u32 = core.ring.queued().map(|s| s.n_step as u32).sum();
        let old_data = core.block_data[core.prep.data_index];

        let report = core.fetch_partial_block(index).unwrap();
        assert!(
            (report.millimeters_remaining - old_data.step_events_remaining / 10.0).abs() < 1e-3
        );
        assert!(report.millimeters_remaining < 100.0);
        assert!(report.millimeters_remaining > 100.0 - (sliced as f32 + 1.0) / 10.0);

        // Fetching twice without a re-prep is a no-op.
        assert!(core.fetch_partial_block(index).is_none());

        // Replan: shrink the block to the reported remainder, entry from
        // rest (as after a hold).
        {
            let block = core.planner.block_mut(index).unwrap();
            block.millimeters = report.millimeters_remaining;
            block.entry_speed_sqr = 0.0;
        }

        // Make room so the preparer re-enters intake.
        core.ring.advance_tail();
        core.prepare_segments();

        let new_data = core.block_data[core.prep.data_index];
        assert_eq!(new_data.dist_per_step, old_data.dist_per_step);
        assert!((new_data.step_per_mm - old_data.step_per_mm).abs() < 1e-6);
        // The executed share is not re-emitted.
        assert!(new_data.step_events_remaining <= old_data.step_events_remaining);
    }

    #[test]
    fn test_feed_hold_stalls_short_of_block_end() {
        let mut core = make_core();
        // Long cruise at 500 steps/s; the hold ramp covers ~25 steps.
        core.push_block(Block::new([2000, 0, 0], 200.0, 50.0, 50.0, 500.0).unwrap())
            .unwrap();
        core.cycle_start();
        core.feed_hold();

        // Drain and re-prep until the preparer stalls at zero speed.
        for _ in 0..200 {
            while core.ring.peek().is_some() {
                assert!(core.ring.peek().unwrap().n_step >= 1);
                core.ring.advance_tail();
            }
            core.prepare_segments();
            if core.ring.peek().is_none() {
                break;
            }
        }

        assert!(core.ring.peek().is_none());
        let data = core.block_data[core.prep.data_index];
        assert!(data.step_events_remaining > 0.0);
        assert!(data.current_rate < MINIMUM_STEP_RATE);

        // The stalled tail is reclaimable.
        let report = core.fetch_partial_block(core.prep_block_index()).unwrap();
        assert!(report.is_decelerating);
        assert!(report.millimeters_remaining > 0.0);
    }

    #[test]
    fn test_prepare_is_noop_outside_cycle() {
        let mut core = make_core();
        core.push_block(Block::new([100, 0, 0], 10.0, 0.0, 10.0, 100.0).unwrap())
            .unwrap();
        // Queued, not started.
        core.prepare_segments();
        assert_eq!(core.ring.len(), 0);
    }
}
