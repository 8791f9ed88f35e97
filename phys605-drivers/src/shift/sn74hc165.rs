//! SN74HC165 parallel-load shift register (8 inputs per chip)
//!
//! Chip 0 is the one whose Q_H drives the board's data line; further chips
//! feed their Q_H into the SER input of the previous one. Chip 0's H..A
//! come out first, so with MSB-first order it fills the top byte of
//! [`Sn74hc165::read`] and the farthest chip the bottom one. Within a chip
//! input A is the low bit of its byte.

use phys605_core::config::ShiftInConfig;
use phys605_core::{Error, InvalidArgument, Result, ShiftIn};
use phys605_hal::{DelayNs, GpioPort};

use super::{BITS_PER_CHIP, MAX_CHIPS};

/// Width must cover whole chips
pub(crate) fn chips_for(width: u8) -> Result<u8> {
    let chips = width / BITS_PER_CHIP;
    if width % BITS_PER_CHIP != 0 || chips == 0 || chips > MAX_CHIPS {
        return Err(Error::InvalidArgument(InvalidArgument::WidthOutOfRange(
            width,
        )));
    }
    Ok(chips)
}

/// A chain of SN74HC165 input registers
pub struct Sn74hc165<P: GpioPort, D: DelayNs> {
    reg: ShiftIn<P, D>,
    chips: u8,
}

impl<P: GpioPort, D: DelayNs> Sn74hc165<P, D> {
    /// Claim the chain's lines; the width is 8 per chip
    pub fn open(port: P, config: &ShiftInConfig, delay: D) -> Result<Self> {
        let chips = chips_for(config.width)?;
        Ok(Self {
            reg: ShiftIn::open(port, config, delay)?,
            chips,
        })
    }

    /// Chips in the chain
    pub fn chips(&self) -> u8 {
        self.chips
    }

    /// Snapshot every input
    pub fn read(&mut self) -> Result<u64> {
        self.reg.read()
    }

    /// Snapshot every input, one byte per chip (chip 0 first)
    ///
    /// Returns the number of bytes filled.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<usize> {
        let value = self.read()?;
        let n = out.len().min(usize::from(self.chips));
        for (k, byte) in out[..n].iter_mut().enumerate() {
            *byte = (value >> self.chip_shift(k as u8)) as u8;
        }
        Ok(n)
    }

    /// Snapshot and return one input
    ///
    /// `index` counts pins from input A of chip 0: `8 * chip + pin`.
    pub fn input(&mut self, index: u8) -> Result<bool> {
        if index >= self.chips * BITS_PER_CHIP {
            return Err(Error::InvalidArgument(InvalidArgument::ChannelOutOfRange(
                index,
            )));
        }
        let bit = self.chip_shift(index / BITS_PER_CHIP) + u32::from(index % BITS_PER_CHIP);
        Ok((self.read()? >> bit) & 1 != 0)
    }

    /// Position of chip `k`'s byte in the chain word
    fn chip_shift(&self, k: u8) -> u32 {
        u32::from(BITS_PER_CHIP) * u32::from(self.chips - 1 - k)
    }

    /// Limit the shift clock rate
    pub fn set_max_rate(&mut self, hz: Option<u32>) -> Result<()> {
        self.reg.set_max_rate(hz)
    }

    /// Underlying register transfer
    pub fn register(&mut self) -> &mut ShiftIn<P, D> {
        &mut self.reg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use phys605_core::sim::{PisoModel, SimDelay, SimDevice, SimPort};
    use phys605_hal::{BitOrder, LineId, SharedPort};

    const DATA: LineId = LineId(2);
    const CLOCK: LineId = LineId(3);
    const LOAD: LineId = LineId(4);

    fn config(width: u8) -> ShiftInConfig {
        ShiftInConfig {
            data: DATA,
            clock: CLOCK,
            load: LOAD,
            width,
            bit_order: BitOrder::MsbFirst,
        }
    }

    fn bench(width: u8, inputs: u64) -> RefCell<SimPort> {
        let piso = PisoModel::new(DATA, CLOCK, LOAD, width).with_parallel(inputs);
        RefCell::new(SimPort::new().with_device(SimDevice::Piso(piso)))
    }

    #[test]
    fn test_width_must_cover_whole_chips() {
        assert_eq!(chips_for(8), Ok(1));
        assert_eq!(chips_for(64), Ok(8));
        for width in [0, 12, 72] {
            assert_eq!(
                chips_for(width),
                Err(Error::InvalidArgument(InvalidArgument::WidthOutOfRange(width)))
            );
        }

        let sim = RefCell::new(SimPort::new());
        let result = Sn74hc165::open(SharedPort::new(&sim), &config(12), SimDelay::default());
        assert!(result.is_err());
        assert_eq!(sim.borrow().claimed_count(), 0);
    }

    #[test]
    fn test_read_single_chip() {
        let sim = bench(8, 0b1010_0110);
        let mut reg =
            Sn74hc165::open(SharedPort::new(&sim), &config(8), SimDelay::default()).unwrap();

        assert_eq!(reg.chips(), 1);
        assert_eq!(reg.read(), Ok(0b1010_0110));
        assert_eq!(reg.input(1), Ok(true));
        assert_eq!(reg.input(0), Ok(false));
        assert_eq!(
            reg.input(8),
            Err(Error::InvalidArgument(InvalidArgument::ChannelOutOfRange(8)))
        );
    }

    #[test]
    fn test_read_bytes_per_chip() {
        let sim = bench(24, 0xC0FFEE);
        let mut reg =
            Sn74hc165::open(SharedPort::new(&sim), &config(24), SimDelay::default()).unwrap();

        let mut bytes = [0u8; 4];
        assert_eq!(reg.read_bytes(&mut bytes), Ok(3));
        assert_eq!(bytes, [0xC0, 0xFF, 0xEE, 0x00]);
    }

    #[test]
    fn test_chip_zero_is_nearest_the_board() {
        let (chip0, chip1) = (0xAAu64, 0x55u64);
        // Chip 0's outputs leave the chain first
        let sim = bench(16, (chip0 << 8) | chip1);
        let mut reg =
            Sn74hc165::open(SharedPort::new(&sim), &config(16), SimDelay::default()).unwrap();

        let mut bytes = [0u8; 2];
        assert_eq!(reg.read_bytes(&mut bytes), Ok(2));
        assert_eq!(bytes, [0xAA, 0x55]);

        // Pin A of each chip is the low bit of its byte
        assert_eq!(reg.input(0), Ok(false));
        assert_eq!(reg.input(1), Ok(true));
        assert_eq!(reg.input(7), Ok(true));
        assert_eq!(reg.input(8), Ok(true));
        assert_eq!(reg.input(9), Ok(false));
        assert_eq!(reg.input(15), Ok(false));
    }

    #[test]
    fn test_inputs_follow_the_pins() {
        let sim = bench(16, 0x0001);
        let mut reg =
            Sn74hc165::open(SharedPort::new(&sim), &config(16), SimDelay::default()).unwrap();
        assert_eq!(reg.read(), Ok(0x0001));

        sim.borrow_mut().piso_mut(0).unwrap().set_parallel(0x8000);
        assert_eq!(reg.read(), Ok(0x8000));
    }
}
