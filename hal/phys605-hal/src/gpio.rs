//! Digital line abstractions
//!
//! The bus engines never touch pins directly. They address lines by number
//! through a [`GpioPort`], which a board HAL implements over whatever
//! digital I/O facility the platform provides.

use core::cell::RefCell;

/// Board-level identifier of a digital line (a GPIO number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineId(pub u8);

impl LineId {
    /// Line number as an array index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u8> for LineId {
    fn from(pin: u8) -> Self {
        LineId(pin)
    }
}

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Logic 0
    #[default]
    Low,
    /// Logic 1
    High,
}

impl Level {
    /// Check if this is logic 1
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// Check if this is logic 0
    pub const fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

impl core::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Direction of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinDirection {
    /// Line is read (high impedance)
    Input,
    /// Line is driven
    Output,
}

/// Errors raised when acquiring lines or the controller behind them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioError {
    /// Line number does not exist on this board
    InvalidPin(LineId),
    /// Line is already owned by another user
    AlreadyClaimed(LineId),
    /// Line exists but cannot be used as GPIO (reserved, not handed to the port)
    Unavailable(LineId),
    /// The peripheral driving the lines (e.g. an SPI controller) reported a fault
    ControllerFault,
}

/// A bank of addressable digital lines
///
/// Implementations are assumed reliable, synchronous and immediate. Only
/// acquisition can fail; once a line is claimed, driving and reading it
/// cannot.
///
/// Lines must be claimed before use and released when the user is done.
/// Operations on lines that are not claimed are implementation-defined but
/// must not panic.
pub trait GpioPort {
    /// Take exclusive ownership of a line
    fn claim(&mut self, line: LineId) -> Result<(), GpioError>;

    /// Give a line back, leaving it as a high-impedance input
    fn release(&mut self, line: LineId);

    /// Switch a line between input and output
    fn configure_line(&mut self, line: LineId, direction: PinDirection);

    /// Drive a line to the given level
    fn set_line(&mut self, line: LineId, level: Level);

    /// Sample the current level of a line
    fn read_line(&mut self, line: LineId) -> Level;

    /// Drive a line high
    fn set_high(&mut self, line: LineId) {
        self.set_line(line, Level::High);
    }

    /// Drive a line low
    fn set_low(&mut self, line: LineId) {
        self.set_line(line, Level::Low);
    }

    /// Drive a line to `active`, then back to its opposite
    fn pulse(&mut self, line: LineId, active: Level) {
        self.set_line(line, active);
        self.set_line(line, !active);
    }
}

impl<T: GpioPort + ?Sized> GpioPort for &mut T {
    fn claim(&mut self, line: LineId) -> Result<(), GpioError> {
        T::claim(self, line)
    }

    fn release(&mut self, line: LineId) {
        T::release(self, line)
    }

    fn configure_line(&mut self, line: LineId, direction: PinDirection) {
        T::configure_line(self, line, direction)
    }

    fn set_line(&mut self, line: LineId, level: Level) {
        T::set_line(self, line, level)
    }

    fn read_line(&mut self, line: LineId) -> Level {
        T::read_line(self, line)
    }
}

/// A port shared between several bus users on one thread
///
/// Each call borrows the underlying port for its own duration only, so any
/// number of engines can hold a `SharedPort` to the same bank as long as
/// they claim disjoint lines.
pub struct SharedPort<'a, P> {
    port: &'a RefCell<P>,
}

impl<'a, P> SharedPort<'a, P> {
    /// Wrap a shared port
    pub fn new(port: &'a RefCell<P>) -> Self {
        Self { port }
    }
}

impl<P> Clone for SharedPort<'_, P> {
    fn clone(&self) -> Self {
        Self { port: self.port }
    }
}

impl<P: GpioPort> GpioPort for SharedPort<'_, P> {
    fn claim(&mut self, line: LineId) -> Result<(), GpioError> {
        self.port.borrow_mut().claim(line)
    }

    fn release(&mut self, line: LineId) {
        self.port.borrow_mut().release(line)
    }

    fn configure_line(&mut self, line: LineId, direction: PinDirection) {
        self.port.borrow_mut().configure_line(line, direction)
    }

    fn set_line(&mut self, line: LineId, level: Level) {
        self.port.borrow_mut().set_line(line, level)
    }

    fn read_line(&mut self, line: LineId) -> Level {
        self.port.borrow_mut().read_line(line)
    }
}

/// A port with no lines
///
/// Placeholder for users that have nothing to drive, e.g. a hardware SPI
/// transport whose controller handles chip select itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPort;

impl GpioPort for NoPort {
    fn claim(&mut self, line: LineId) -> Result<(), GpioError> {
        Err(GpioError::Unavailable(line))
    }

    fn release(&mut self, _line: LineId) {}

    fn configure_line(&mut self, _line: LineId, _direction: PinDirection) {}

    fn set_line(&mut self, _line: LineId, _level: Level) {}

    fn read_line(&mut self, _line: LineId) -> Level {
        Level::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mock port that remembers the last level driven on each line
    struct MockPort {
        levels: [Level; 8],
        claimed: u8,
        writes: usize,
    }

    impl MockPort {
        fn new() -> Self {
            Self {
                levels: [Level::Low; 8],
                claimed: 0,
                writes: 0,
            }
        }
    }

    impl GpioPort for MockPort {
        fn claim(&mut self, line: LineId) -> Result<(), GpioError> {
            if line.index() >= 8 {
                return Err(GpioError::InvalidPin(line));
            }
            let mask = 1 << line.0;
            if self.claimed & mask != 0 {
                return Err(GpioError::AlreadyClaimed(line));
            }
            self.claimed |= mask;
            Ok(())
        }

        fn release(&mut self, line: LineId) {
            self.claimed &= !(1 << line.0);
        }

        fn configure_line(&mut self, _line: LineId, _direction: PinDirection) {}

        fn set_line(&mut self, line: LineId, level: Level) {
            self.levels[line.index()] = level;
            self.writes += 1;
        }

        fn read_line(&mut self, line: LineId) -> Level {
            self.levels[line.index()]
        }
    }

    #[test]
    fn test_level_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert!(bool::from(Level::High));
        assert_eq!(!Level::Low, Level::High);
        assert_eq!(!Level::High, Level::Low);
    }

    #[test]
    fn test_pulse_returns_to_idle() {
        let mut port = MockPort::new();
        port.pulse(LineId(3), Level::Low);

        assert_eq!(port.read_line(LineId(3)), Level::High);
        assert_eq!(port.writes, 2);
    }

    #[test]
    fn test_claim_twice_fails() {
        let mut port = MockPort::new();
        assert_eq!(port.claim(LineId(2)), Ok(()));
        assert_eq!(
            port.claim(LineId(2)),
            Err(GpioError::AlreadyClaimed(LineId(2)))
        );

        port.release(LineId(2));
        assert_eq!(port.claim(LineId(2)), Ok(()));
    }

    #[test]
    fn test_shared_port_forwards_to_bank() {
        let bank = RefCell::new(MockPort::new());
        let mut a = SharedPort::new(&bank);
        let mut b = a.clone();

        a.claim(LineId(0)).unwrap();
        assert_eq!(b.claim(LineId(0)), Err(GpioError::AlreadyClaimed(LineId(0))));

        a.set_high(LineId(0));
        assert_eq!(b.read_line(LineId(0)), Level::High);
        assert_eq!(bank.borrow().writes, 1);
    }

    #[test]
    fn test_no_port_refuses_claims() {
        let mut port = NoPort;
        assert_eq!(
            port.claim(LineId(5)),
            Err(GpioError::Unavailable(LineId(5)))
        );
        assert_eq!(port.read_line(LineId(5)), Level::Low);
    }
}
