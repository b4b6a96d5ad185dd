//! Segment and shared block data records.
//!
//! A segment is a fixed-time slice of a planner block carrying a constant
//! step rate to the step generator. Segments are immutable once published to
//! the ring. The shared block data holds the per-block values every segment
//! of that block needs, so a segment stays small enough to publish cheaply.

/// Special-execution bit-flags on a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SegmentFlags(u8);

impl SegmentFlags {
    const END_OF_BLOCK: u8 = 1 << 0;

    /// Mark this segment as the last of its planner block.
    #[inline]
    pub fn set_end_of_block(&mut self) {
        self.0 |= Self::END_OF_BLOCK;
    }

    /// Whether this segment ends its planner block.
    #[inline]
    pub fn end_of_block(self) -> bool {
        self.0 & Self::END_OF_BLOCK != 0
    }
}

/// One executable slice of a planner block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Segment {
    /// Step events this segment emits. Always at least 1.
    pub n_step: u8,

    /// Stepless timer ticks run after the last step, preserving pulse
    /// spacing into the next segment.
    pub n_phase_tick: u8,

    /// Inverse-time counter decrement per timer tick.
    pub dist_per_tick: u32,

    /// Index of this segment's entry in the shared block data ring.
    pub data_index: usize,

    /// Execution flags.
    pub flags: SegmentFlags,
}

impl Segment {
    /// Placeholder for ring slot initialization; never executed.
    pub(crate) const EMPTY: Segment = Segment {
        n_step: 0,
        n_phase_tick: 0,
        dist_per_tick: 0,
        data_index: 0,
        flags: SegmentFlags(0),
    };
}

/// Per-block runtime shared by all segments of one planner block.
///
/// Written by the preparer; the step generator reads only `dist_per_step`.
/// Rates are in steps/s, the ramp boundaries in step units counted as
/// remaining distance to the block end.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BlockRuntime {
    /// Planner-block step events still to be sliced into segments.
    pub step_events_remaining: f32,

    /// Inverse-time counter reload per step event.
    pub dist_per_step: u32,

    /// Step resolution of the block, steps per mm.
    pub step_per_mm: f32,

    /// Acceleration in steps/s².
    pub acceleration: f32,

    /// Speed at the current slice position, steps/s.
    pub current_rate: f32,

    /// Profile peak speed, steps/s.
    pub maximum_rate: f32,

    /// Speed at the block end, steps/s.
    pub exit_rate: f32,

    /// Remaining-step count at which acceleration ends.
    pub accelerate_until: f32,

    /// Remaining-step count at which deceleration begins.
    pub decelerate_after: f32,
}

impl BlockRuntime {
    /// Turn the unsliced remainder into a pure deceleration to zero, for a
    /// feed hold. The ramp may reach zero speed short of the block end; the
    /// tail then waits for the partial-block handoff.
    pub fn hold_for_stop(&mut self) {
        self.accelerate_until = self.step_events_remaining;
        self.decelerate_after = self.step_events_remaining;
        self.exit_rate = 0.0;
    }
}
