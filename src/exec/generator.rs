//! Step generator: the hard-real-time tick handler.
//!
//! An inverse-time counter tracks when a step event is due while a per-axis
//! Bresenham distributes each event across the axes, guaranteeing the exact
//! per-axis step totals of the planner block with integer adds and compares
//! only. Each tick performs a constant bounded amount of work; all floating
//! point stays in the preparer.
//!
//! The tick handler pops segments from the ring and plays them out. A
//! companion one-shot timer ends each step pulse through
//! [`MotionCore::finish_step_pulse`], which must complete before the next
//! tick.

use crate::hal::{direction_bit, step_bit, StepDriver, DIRECTION_MASK, STEP_MASK};
use crate::planner::{Axis, Block, Planner, N_AXIS};

use super::cycle::MotionCore;
use super::segment::Segment;
use super::state::{ExecFlags, LoadRequest, SysState};

/// Mutable runtime of the step generator. Owned exclusively by the tick
/// handler; the preparer never touches it.
#[derive(Debug)]
pub(crate) struct StepKernel {
    /// Per-axis Bresenham counters.
    counters: [i64; N_AXIS],
    /// Inverse-time distance counter; a step event is due when it drops
    /// below zero.
    counter_dist: i64,
    /// Inverse-time reload per step, from the segment's shared block data.
    dist_per_step: u32,
    /// Step events left in the loaded segment.
    step_count: u8,
    /// Stepless phase ticks left after the segment's last step.
    phase_count: u8,
    /// A port write is pending for the next tick's rising edge.
    pub execute_step: bool,
    /// Next stepping-port bits, invert mask applied.
    pub out_bits: u8,
    /// What to load at the top of the next tick.
    pub load: LoadRequest,
    /// Re-entrance guard; set while a tick is executing.
    pub busy: bool,
    /// The loaded segment.
    segment: Segment,
    /// The planner block being executed, bound at block load.
    block: Option<Block>,
}

impl StepKernel {
    pub fn new() -> Self {
        Self {
            counters: [0; N_AXIS],
            counter_dist: 0,
            dist_per_step: 0,
            step_count: 0,
            phase_count: 0,
            execute_step: false,
            out_bits: 0,
            load: LoadRequest::Block,
            busy: false,
            segment: Segment::EMPTY,
            block: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl<P: Planner, D: StepDriver> MotionCore<P, D> {
    /// One invocation of the periodic step timer handler.
    ///
    /// Call at the configured step timer rate from interrupt context. On
    /// targets with nested interrupts, re-enable them after the pulse write
    /// so [`MotionCore::finish_step_pulse`] can preempt the remainder; the
    /// `busy` guard makes a nested tick a silent no-op.
    pub fn isr_tick(&mut self) {
        if self.state == SysState::Alarm {
            self.driver.stop_step_timer();
            return;
        }
        if self.kernel.busy {
            // CPU overrun: the previous tick is still running.
            return;
        }

        // Rising edge. A new block's direction bits always go out one tick
        // before its first step pulse.
        if self.kernel.execute_step {
            self.kernel.execute_step = false;
            self.driver
                .set_direction_port(self.kernel.out_bits & DIRECTION_MASK);
            self.driver.set_step_port(self.kernel.out_bits & STEP_MASK);
            self.driver
                .arm_pulse_timer(self.settings.pulse_microseconds);
        }

        self.kernel.busy = true;

        // Load the next segment if the previous one finished.
        if self.kernel.load != LoadRequest::None {
            match self.ring.peek() {
                Some(segment) => {
                    self.kernel.segment = segment;
                    self.kernel.step_count = segment.n_step;
                    self.kernel.phase_count = segment.n_phase_tick;
                    self.kernel.dist_per_step = self.block_data[segment.data_index].dist_per_step;

                    if self.kernel.load == LoadRequest::Block {
                        match self.planner.current().copied() {
                            Some(block) => {
                                // Direction lines settle one tick ahead of
                                // the first pulse.
                                self.kernel.out_bits =
                                    block.direction_bits ^ self.settings.invert_mask;
                                self.kernel.execute_step = true;

                                let half = (block.step_event_count >> 1) as i64;
                                self.kernel.counters = [half; N_AXIS];
                                self.kernel.counter_dist = self.kernel.dist_per_step as i64;
                                self.kernel.block = Some(block);
                            }
                            None => {
                                // Segments without a planner block: the
                                // pipeline was torn down around us.
                                self.stop_cycle();
                                self.kernel.busy = false;
                                return;
                            }
                        }
                    }
                    self.kernel.load = LoadRequest::None;
                }
                None => {
                    // Ring starved. Orderly stop; the main program re-primes
                    // and restarts.
                    self.stop_cycle();
                    self.kernel.busy = false;
                    return;
                }
            }
        }

        // Inverse time: one segment-rate decrement per tick.
        self.kernel.counter_dist -= self.kernel.segment.dist_per_tick as i64;

        // A step event is due. Phase ticks swallow due events after the
        // segment's step budget is spent.
        if self.kernel.counter_dist < 0 && self.kernel.step_count > 0 {
            self.kernel.counter_dist += self.kernel.dist_per_step as i64;

            if let Some(block) = self.kernel.block {
                self.kernel.out_bits = block.direction_bits;
                self.kernel.execute_step = true;

                for axis in Axis::ALL {
                    let a = axis.index();
                    self.kernel.counters[a] -= block.steps[a] as i64;
                    if self.kernel.counters[a] < 0 {
                        self.kernel.out_bits |= step_bit(axis);
                        self.kernel.counters[a] += block.step_event_count as i64;
                        if block.direction_bits & direction_bit(axis) != 0 {
                            self.position[a] -= 1;
                        } else {
                            self.position[a] += 1;
                        }
                    }
                }

                self.kernel.step_count -= 1;
                self.kernel.out_bits ^= self.settings.invert_mask;
            }
        }

        if self.kernel.step_count == 0 {
            if self.kernel.phase_count == 0 {
                // Segment complete. The inverse-time counter carries over
                // unless the next segment starts a new block.
                if self.kernel.segment.flags.end_of_block() {
                    self.planner.discard_current();
                    self.kernel.load = LoadRequest::Block;
                } else {
                    self.kernel.load = LoadRequest::Segment;
                }
                self.ring.advance_tail();
            } else {
                self.kernel.phase_count -= 1;
            }
        }

        self.kernel.busy = false;
    }

    /// Pulse falling edge: return the step lines to their inactive level.
    ///
    /// Call from the one-shot pulse timer's interrupt. Independent of the
    /// tick handler; must complete before the next tick.
    pub fn finish_step_pulse(&mut self) {
        self.driver
            .set_step_port(self.settings.invert_mask & STEP_MASK);
    }

    /// Orderly stop on ring starvation: park the hardware, flag the main
    /// program, and leave `Hold` in place for its resume protocol.
    fn stop_cycle(&mut self) {
        self.go_idle();
        self.exec.set(ExecFlags::CYCLE_STOP);
        if self.state == SysState::Cycle {
            self.state = SysState::Idle;
        }
    }
}
