//! Root execution context and cycle control surface.
//!
//! [`MotionCore`] owns the whole execution pipeline: the planner collaborator,
//! the hardware driver, both rings, and the preparer and step generator
//! state. The integrator binds one instance statically and drives it from
//! three places: the main loop calls [`MotionCore::prepare_segments`] every
//! pass, the periodic step timer interrupt calls [`MotionCore::isr_tick`],
//! and the pulse timer interrupt calls [`MotionCore::finish_step_pulse`].

use crate::config::{validate_config, Settings, SystemConfig};
use crate::error::{Error, Result, StateError};
use crate::hal::{StepDriver, DIRECTION_MASK, STEP_MASK};
use crate::planner::{Block, Planner, N_AXIS};

use super::generator::StepKernel;
use super::prep::Preparer;
use super::ring::{SegmentRing, DATA_RING_CAPACITY};
use super::segment::BlockRuntime;
use super::state::{ExecFlags, PrepState, SysState};

/// The motion execution core.
///
/// Generic over the upstream planner `P` and the hardware driver `D`.
pub struct MotionCore<P: Planner, D: StepDriver> {
    pub(crate) planner: P,
    pub(crate) driver: D,
    pub(crate) settings: Settings,
    pub(crate) state: SysState,
    pub(crate) exec: ExecFlags,
    pub(crate) auto_start: bool,
    pub(crate) ring: SegmentRing,
    pub(crate) block_data: [BlockRuntime; DATA_RING_CAPACITY],
    pub(crate) prep: Preparer,
    pub(crate) kernel: StepKernel,
    pub(crate) position: [i32; N_AXIS],
}

impl<P: Planner, D: StepDriver> MotionCore<P, D> {
    /// Build the execution core and drive all outputs to their inactive
    /// levels.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration fails validation.
    pub fn new(config: &SystemConfig, planner: P, mut driver: D) -> Result<Self> {
        validate_config(config)?;
        let settings = Settings::from_config(config);

        driver.set_direction_port(settings.invert_mask & DIRECTION_MASK);
        driver.set_step_port(settings.invert_mask & STEP_MASK);

        let mut core = Self {
            prep: Preparer::new(planner.current_index()),
            planner,
            driver,
            settings,
            state: SysState::Idle,
            exec: ExecFlags::empty(),
            auto_start: true,
            ring: SegmentRing::new(),
            block_data: [BlockRuntime::default(); DATA_RING_CAPACITY],
            kernel: StepKernel::new(),
            position: [0; N_AXIS],
        };

        // Wake then idle once so the configured keep-enabled policy takes
        // effect before the first cycle.
        core.wake_up();
        core.go_idle();
        Ok(core)
    }

    /// Reset the execution pipeline: discard prepared segments, rebind the
    /// preparer to the planner's current block, and return to `Idle`.
    ///
    /// This is the recovery path out of `Alarm`.
    pub fn reset(&mut self) {
        self.kernel.reset();
        self.prep.reset(self.planner.current_index());
        self.ring.clear();
        self.exec = ExecFlags::empty();
        self.auto_start = true;
        self.state = SysState::Idle;
    }

    /// Submit a planned block. The first block moves the system from `Idle`
    /// to `Queued`.
    ///
    /// # Errors
    ///
    /// Rejected while in `Alarm`, or when the planner queue is full.
    pub fn push_block(&mut self, block: Block) -> Result<()> {
        if self.state == SysState::Alarm {
            return Err(Error::State(StateError::Alarmed));
        }
        self.planner.push(block)?;
        if self.state == SysState::Idle {
            self.state = SysState::Queued;
        }
        Ok(())
    }

    /// Start executing the queued plan. No-op unless the system is `Queued`.
    pub fn cycle_start(&mut self) {
        if self.state == SysState::Queued {
            self.state = SysState::Cycle;
            // Prime the segment ring before the first timer tick fires.
            self.prepare_segments();
            self.wake_up();
        }
    }

    /// Execute a feed hold: decelerate to a stop while retaining the plan.
    /// No-op unless the system is in `Cycle`.
    pub fn feed_hold(&mut self) {
        if self.state == SysState::Cycle {
            self.state = SysState::Hold;
            self.auto_start = false;
            // Turn the unsliced remainder of the bound block into a pure
            // deceleration to zero; the preparer takes in no new blocks
            // while holding.
            if self.prep.state == PrepState::Draining {
                self.block_data[self.prep.data_index].hold_for_stop();
            }
        }
    }

    /// Leave `Hold` after the pipeline has drained, once the planner has
    /// replanned from the stop location (reclaiming the in-flight block via
    /// [`MotionCore::fetch_partial_block`] first). Moves to `Queued` if
    /// blocks remain, else `Idle`.
    ///
    /// The Bresenham and inverse-time counters are kept through the hold, so
    /// on [`MotionCore::cycle_start`] the step train continues exactly as if
    /// nothing had happened; only the rates have been replanned.
    pub fn cycle_reinitialize(&mut self) {
        if self.state != SysState::Hold {
            return;
        }
        self.state = if self.planner.is_empty() {
            SysState::Idle
        } else {
            SysState::Queued
        };
    }

    /// Force the alarm state: stop the step timer and disable the steppers.
    pub fn trigger_alarm(&mut self) {
        self.state = SysState::Alarm;
        self.go_idle();
    }

    /// Energize the steppers; when a cycle is active, also start the step
    /// timer. The kernel's load request is left alone: after a reset it
    /// already asks for a block, and after a mid-block stop it carries the
    /// segment continuation.
    pub fn wake_up(&mut self) {
        self.driver.enable_steppers(true);
        if self.state == SysState::Cycle {
            self.kernel.out_bits = self.settings.invert_mask;
            self.kernel.execute_step = false;
            self.driver.start_step_timer();
        }
    }

    /// Stop the step timer and apply the idle-lock policy: after the
    /// configured dwell the steppers are released, unless configured to stay
    /// energized (an alarm always releases them).
    pub fn go_idle(&mut self) {
        self.driver.stop_step_timer();
        self.kernel.busy = false;

        let force_disable = self.state == SysState::Alarm;
        if force_disable || self.settings.idle_lock_ms.is_some() {
            let dwell = self.settings.idle_lock_ms.unwrap_or(0);
            if dwell > 0 {
                self.driver.dwell_ms(dwell);
            }
            self.driver.enable_steppers(false);
        }
    }

    /// Current system state.
    #[inline]
    pub fn state(&self) -> SysState {
        self.state
    }

    /// Machine position in steps per axis, as of the last emitted step.
    ///
    /// On targets where the step timer preempts the reader, snapshot with
    /// interrupts masked to avoid torn wide reads.
    #[inline]
    pub fn position(&self) -> [i32; N_AXIS] {
        self.position
    }

    /// Pending execution flags.
    #[inline]
    pub fn exec_flags(&self) -> ExecFlags {
        self.exec
    }

    /// Consume a pending cycle-stop notification, if any.
    pub fn take_cycle_stop(&mut self) -> bool {
        let stopped = self.exec.contains(ExecFlags::CYCLE_STOP);
        self.exec.clear(ExecFlags::CYCLE_STOP);
        stopped
    }

    /// Whether the planner may auto-start the next cycle. Cleared by
    /// [`MotionCore::feed_hold`].
    #[inline]
    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    /// The planner collaborator.
    #[inline]
    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// Mutable access to the planner collaborator, for replanning.
    #[inline]
    pub fn planner_mut(&mut self) -> &mut P {
        &mut self.planner
    }

    /// The hardware driver.
    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the hardware driver.
    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
