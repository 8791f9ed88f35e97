//! SN74HC595 latched output shift register (8 outputs per chip)
//!
//! Chip 0 takes SER from the board; further chips take Q_H' of the previous
//! one. Output `i` is pin `i % 8` (A = 0) of chip `i / 8`. The driver keeps
//! a copy of the latched outputs so single pins can be changed.

use phys605_core::bits::word_mask;
use phys605_core::config::ShiftOutConfig;
use phys605_core::{Error, InvalidArgument, Result, ShiftOut};
use phys605_hal::{DelayNs, GpioPort};

use super::sn74hc165::chips_for;
use super::BITS_PER_CHIP;

/// A chain of SN74HC595 output registers
pub struct Sn74hc595<P: GpioPort, D: DelayNs> {
    reg: ShiftOut<P, D>,
    chips: u8,
    state: u64,
}

impl<P: GpioPort, D: DelayNs> Sn74hc595<P, D> {
    /// Claim the chain's lines and drive every output low
    pub fn open(port: P, config: &ShiftOutConfig, delay: D) -> Result<Self> {
        let chips = chips_for(config.width)?;
        let mut driver = Self {
            reg: ShiftOut::open(port, config, delay)?,
            chips,
            state: 0,
        };
        driver.reg.clear()?;
        Ok(driver)
    }

    /// Chips in the chain
    pub fn chips(&self) -> u8 {
        self.chips
    }

    /// Last latched outputs
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Set every output at once
    pub fn write(&mut self, value: u64) -> Result<()> {
        let value = value & word_mask(self.reg.width());
        self.reg.write(value)?;
        self.state = value;
        Ok(())
    }

    /// Set one output, keeping the others
    pub fn set_output(&mut self, index: u8, high: bool) -> Result<()> {
        self.check_index(index)?;
        let mask = 1u64 << index;
        let value = if high {
            self.state | mask
        } else {
            self.state & !mask
        };
        self.write(value)
    }

    /// Invert one output
    pub fn toggle(&mut self, index: u8) -> Result<()> {
        self.check_index(index)?;
        self.write(self.state ^ (1u64 << index))
    }

    /// Drive every output low
    pub fn clear(&mut self) -> Result<()> {
        self.reg.clear()?;
        self.state = 0;
        Ok(())
    }

    /// Limit the shift clock rate
    pub fn set_max_rate(&mut self, hz: Option<u32>) -> Result<()> {
        self.reg.set_max_rate(hz)
    }

    /// Underlying register transfer
    pub fn register(&mut self) -> &mut ShiftOut<P, D> {
        &mut self.reg
    }

    fn check_index(&self, index: u8) -> Result<()> {
        if index >= self.chips * BITS_PER_CHIP {
            return Err(Error::InvalidArgument(InvalidArgument::ChannelOutOfRange(
                index,
            )));
        }
        Ok(())
    }
}
