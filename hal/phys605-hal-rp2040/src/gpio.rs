//! GPIO bank
//!
//! Every pin left in the [`PinBank`] becomes a bidirectional `Flex` line
//! addressed by its GPIO number. The allocator tracks which lines are
//! claimed so two buses can never drive the same pin.

use embassy_rp::gpio::{Flex, Level as RpLevel};
use heapless::FnvIndexSet;
use phys605_hal::{GpioError, GpioPort, Level, LineId, PinDirection};

use crate::pins::PinBank;

/// Maximum number of GPIO pins on RP2040
pub const GPIO_COUNT: usize = 30;

/// Tracks claimed lines
pub struct GpioAllocator {
    allocated: FnvIndexSet<u8, 32>,
}

impl Default for GpioAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioAllocator {
    /// Nothing claimed
    pub fn new() -> Self {
        Self {
            allocated: FnvIndexSet::new(),
        }
    }

    /// Mark a pin as in use
    pub fn allocate(&mut self, pin: u8) -> Result<(), GpioError> {
        if usize::from(pin) >= GPIO_COUNT {
            return Err(GpioError::InvalidPin(LineId(pin)));
        }
        if self.allocated.contains(&pin) {
            return Err(GpioError::AlreadyClaimed(LineId(pin)));
        }
        self.allocated
            .insert(pin)
            .map_err(|_| GpioError::Unavailable(LineId(pin)))?;
        Ok(())
    }

    /// Release a GPIO pin
    pub fn release(&mut self, pin: u8) {
        self.allocated.remove(&pin);
    }

    /// Check if a pin is allocated
    pub fn is_allocated(&self, pin: u8) -> bool {
        self.allocated.contains(&pin)
    }

    /// Number of allocated pins
    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }
}

/// The board's GPIO lines as a [`GpioPort`]
pub struct GpioBank {
    lines: [Option<Flex<'static>>; GPIO_COUNT],
    allocator: GpioAllocator,
}

impl GpioBank {
    /// Take every pin still in the bank; all start as inputs
    pub fn new(pins: &mut PinBank) -> Self {
        let lines = core::array::from_fn(|n| pins.take(n as u8).map(|pin| Flex::new(pin)));
        Self {
            lines,
            allocator: GpioAllocator::new(),
        }
    }

    fn line(&mut self, line: LineId) -> Option<&mut Flex<'static>> {
        if !self.allocator.is_allocated(line.0) {
            return None;
        }
        self.lines.get_mut(line.index())?.as_mut()
    }
}

impl GpioPort for GpioBank {
    fn claim(&mut self, line: LineId) -> Result<(), GpioError> {
        match self.lines.get(line.index()) {
            None => return Err(GpioError::InvalidPin(line)),
            // Taken out of the pin bank for something else
            Some(None) => return Err(GpioError::Unavailable(line)),
            Some(Some(_)) => {}
        }
        self.allocator.allocate(line.0)?;

        #[cfg(feature = "defmt")]
        defmt::trace!("gpio{} claimed", line.0);

        Ok(())
    }

    fn release(&mut self, line: LineId) {
        if let Some(pin) = self.line(line) {
            pin.set_as_input();
        }
        self.allocator.release(line.0);
    }

    fn configure_line(&mut self, line: LineId, direction: PinDirection) {
        if let Some(pin) = self.line(line) {
            match direction {
                PinDirection::Input => pin.set_as_input(),
                PinDirection::Output => pin.set_as_output(),
            }
        }
    }

    fn set_line(&mut self, line: LineId, level: Level) {
        if let Some(pin) = self.line(line) {
            pin.set_level(if level.is_high() {
                RpLevel::High
            } else {
                RpLevel::Low
            });
        }
    }

    fn read_line(&mut self, line: LineId) -> Level {
        match self.line(line) {
            Some(pin) => Level::from(pin.is_high()),
            None => Level::Low,
        }
    }
}
