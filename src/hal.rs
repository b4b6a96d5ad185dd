//! Hardware output capability set.
//!
//! The execution core drives hardware through [`StepDriver`], a small set of
//! port-level operations: step and direction bit writes, stepper enable, the
//! one-shot pulse-width timer, and control of the periodic step timer. Real
//! targets implement it over a memory-mapped port and two hardware timers;
//! [`PinDriver`] adapts it to six discrete `embedded-hal` output pins for
//! targets without a shared port.
//!
//! Port bit layout: step bits occupy bits 0..3, direction bits 3..6. Polarity
//! is configured as an invert mask XOR'd into every write, so an "inactive"
//! step line is whatever level the mask selects.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::planner::Axis;

/// X axis step output bit.
pub const X_STEP_BIT: u8 = 0;
/// Y axis step output bit.
pub const Y_STEP_BIT: u8 = 1;
/// Z axis step output bit.
pub const Z_STEP_BIT: u8 = 2;
/// X axis direction output bit.
pub const X_DIRECTION_BIT: u8 = 3;
/// Y axis direction output bit.
pub const Y_DIRECTION_BIT: u8 = 4;
/// Z axis direction output bit.
pub const Z_DIRECTION_BIT: u8 = 5;

/// Mask of all step bits.
pub const STEP_MASK: u8 = (1 << X_STEP_BIT) | (1 << Y_STEP_BIT) | (1 << Z_STEP_BIT);
/// Mask of all direction bits.
pub const DIRECTION_MASK: u8 =
    (1 << X_DIRECTION_BIT) | (1 << Y_DIRECTION_BIT) | (1 << Z_DIRECTION_BIT);
/// Mask of the whole stepping port.
pub const STEPPING_MASK: u8 = STEP_MASK | DIRECTION_MASK;

/// Step bit for an axis.
#[inline]
pub const fn step_bit(axis: Axis) -> u8 {
    1 << (axis as u8)
}

/// Direction bit for an axis.
#[inline]
pub const fn direction_bit(axis: Axis) -> u8 {
    1 << (axis as u8 + X_DIRECTION_BIT)
}

/// Output capabilities the execution core requires from a target.
///
/// All operations are infallible: the step generator runs in interrupt
/// context with no recovery path, so a failing output is a hardware fault
/// the integrator must surface through the alarm input instead.
pub trait StepDriver {
    /// Write the step bits of the stepping port. Only bits in [`STEP_MASK`]
    /// are significant.
    fn set_step_port(&mut self, bits: u8);

    /// Write the direction bits of the stepping port. Only bits in
    /// [`DIRECTION_MASK`] are significant.
    fn set_direction_port(&mut self, bits: u8);

    /// Energize or release the stepper drivers.
    fn enable_steppers(&mut self, enabled: bool);

    /// Arm the one-shot timer that ends the current step pulse after
    /// `width_us` microseconds.
    fn arm_pulse_timer(&mut self, width_us: u8);

    /// Start the periodic step timer driving `isr_tick`.
    fn start_step_timer(&mut self);

    /// Stop the periodic step timer.
    fn stop_step_timer(&mut self);

    /// Block for `ms` milliseconds; used for the idle-lock dwell before the
    /// steppers are released.
    fn dwell_ms(&mut self, ms: u16);
}

/// [`StepDriver`] over six discrete output pins and a delay provider.
///
/// For targets whose step and direction lines do not share a port. The pulse
/// timer is emulated by blocking for the pulse width and lowering the step
/// lines inline, so [`StepDriver::arm_pulse_timer`] here costs the full pulse
/// width inside the caller; on such targets the step timer itself is expected
/// to be driven from a software loop or an RTOS tick rather than a hardware
/// compare interrupt, and `start_step_timer`/`stop_step_timer` are no-ops.
pub struct PinDriver<XS, YS, ZS, XD, YD, ZD, EN, DELAY>
where
    XS: OutputPin,
    YS: OutputPin,
    ZS: OutputPin,
    XD: OutputPin,
    YD: OutputPin,
    ZD: OutputPin,
    EN: OutputPin,
    DELAY: DelayNs,
{
    step_pins: (XS, YS, ZS),
    dir_pins: (XD, YD, ZD),
    enable_pin: EN,
    delay: DELAY,
    /// Invert mask for the step bits; defines the inactive pulse level.
    step_invert: u8,
    /// Whether the enable pin is active-low.
    invert_enable: bool,
}

impl<XS, YS, ZS, XD, YD, ZD, EN, DELAY> PinDriver<XS, YS, ZS, XD, YD, ZD, EN, DELAY>
where
    XS: OutputPin,
    YS: OutputPin,
    ZS: OutputPin,
    XD: OutputPin,
    YD: OutputPin,
    ZD: OutputPin,
    EN: OutputPin,
    DELAY: DelayNs,
{
    /// Create a pin-level driver.
    ///
    /// `step_invert` must match the step bits of the configured port invert
    /// mask so the pulse falling edge restores the correct inactive level.
    pub fn new(
        step_pins: (XS, YS, ZS),
        dir_pins: (XD, YD, ZD),
        enable_pin: EN,
        delay: DELAY,
        step_invert: u8,
        invert_enable: bool,
    ) -> Self {
        Self {
            step_pins,
            dir_pins,
            enable_pin,
            delay,
            step_invert: step_invert & STEP_MASK,
            invert_enable,
        }
    }

    fn write_step_bits(&mut self, bits: u8) {
        // Pin errors are unreportable from interrupt context; on the HALs
        // this adapter targets the error type is Infallible anyway.
        let _ = set_level(&mut self.step_pins.0, bits & (1 << X_STEP_BIT) != 0);
        let _ = set_level(&mut self.step_pins.1, bits & (1 << Y_STEP_BIT) != 0);
        let _ = set_level(&mut self.step_pins.2, bits & (1 << Z_STEP_BIT) != 0);
    }
}

fn set_level<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), P::Error> {
    if high {
        pin.set_high()
    } else {
        pin.set_low()
    }
}

impl<XS, YS, ZS, XD, YD, ZD, EN, DELAY> StepDriver for PinDriver<XS, YS, ZS, XD, YD, ZD, EN, DELAY>
where
    XS: OutputPin,
    YS: OutputPin,
    ZS: OutputPin,
    XD: OutputPin,
    YD: OutputPin,
    ZD: OutputPin,
    EN: OutputPin,
    DELAY: DelayNs,
{
    fn set_step_port(&mut self, bits: u8) {
        self.write_step_bits(bits);
    }

    fn set_direction_port(&mut self, bits: u8) {
        let _ = set_level(&mut self.dir_pins.0, bits & (1 << X_DIRECTION_BIT) != 0);
        let _ = set_level(&mut self.dir_pins.1, bits & (1 << Y_DIRECTION_BIT) != 0);
        let _ = set_level(&mut self.dir_pins.2, bits & (1 << Z_DIRECTION_BIT) != 0);
    }

    fn enable_steppers(&mut self, enabled: bool) {
        let _ = set_level(&mut self.enable_pin, enabled != self.invert_enable);
    }

    fn arm_pulse_timer(&mut self, width_us: u8) {
        self.delay.delay_us(width_us as u32);
        let inactive = self.step_invert;
        self.write_step_bits(inactive);
    }

    fn start_step_timer(&mut self) {}

    fn stop_step_timer(&mut self) {}

    fn dwell_ms(&mut self, ms: u16) {
        self.delay.delay_ms(ms as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct FakePin {
        high: bool,
        writes: usize,
    }

    impl embedded_hal::digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDelay {
        total_ns: u64,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    fn make_driver(
    ) -> PinDriver<FakePin, FakePin, FakePin, FakePin, FakePin, FakePin, FakePin, FakeDelay> {
        PinDriver::new(
            (FakePin::default(), FakePin::default(), FakePin::default()),
            (FakePin::default(), FakePin::default(), FakePin::default()),
            FakePin::default(),
            FakeDelay::default(),
            0,
            false,
        )
    }

    #[test]
    fn test_step_port_sets_axis_pins() {
        let mut driver = make_driver();
        driver.set_step_port((1 << X_STEP_BIT) | (1 << Z_STEP_BIT));
        assert!(driver.step_pins.0.high);
        assert!(!driver.step_pins.1.high);
        assert!(driver.step_pins.2.high);
    }

    #[test]
    fn test_direction_port_uses_direction_bits() {
        let mut driver = make_driver();
        driver.set_direction_port(1 << Y_DIRECTION_BIT);
        assert!(!driver.dir_pins.0.high);
        assert!(driver.dir_pins.1.high);
        assert!(!driver.dir_pins.2.high);
    }

    #[test]
    fn test_pulse_timer_blocks_then_clears() {
        let mut driver = make_driver();
        driver.set_step_port(STEP_MASK);
        driver.arm_pulse_timer(10);
        assert_eq!(driver.delay.total_ns, 10_000);
        assert!(!driver.step_pins.0.high);
        assert!(!driver.step_pins.1.high);
        assert!(!driver.step_pins.2.high);
    }

    #[test]
    fn test_enable_respects_inversion() {
        let mut driver = make_driver();
        driver.invert_enable = true;
        driver.enable_steppers(true);
        assert!(!driver.enable_pin.high);
        driver.enable_steppers(false);
        assert!(driver.enable_pin.high);
    }

    #[test]
    fn test_bit_helpers_cover_port_layout() {
        assert_eq!(step_bit(Axis::X) | step_bit(Axis::Y) | step_bit(Axis::Z), STEP_MASK);
        assert_eq!(
            direction_bit(Axis::X) | direction_bit(Axis::Y) | direction_bit(Axis::Z),
            DIRECTION_MASK
        );
        assert_eq!(STEP_MASK & DIRECTION_MASK, 0);
    }
}
