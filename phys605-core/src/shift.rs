//! Shift-register transfer
//!
//! Clocking for 74HC165 style parallel-in serial-out chips ([`ShiftIn`])
//! and 74HC595 style serial-in parallel-out chips ([`ShiftOut`]). Daisy
//! chains are just wider words, up to 64 bits.

use heapless::Vec;
use phys605_hal::{BitOrder, DelayNs, GpioError, GpioPort, Level, LineId, PinDirection};

use crate::bits::{check_width, set_word_bit_at, word_mask, MAX_WORD_BITS};
use crate::config::{ShiftInConfig, ShiftOutConfig};
use crate::error::{Error, Result};
use crate::line::{claim_all, push_distinct, release_all, MAX_LINES};
use crate::spi::engine::half_period_ns;

/// Lines, dwell and open state shared by both directions
struct Wires<P: GpioPort, D: DelayNs> {
    port: P,
    delay: D,
    owned: Vec<LineId, MAX_LINES>,
    half_period_ns: u32,
    open: bool,
}

impl<P: GpioPort, D: DelayNs> Wires<P, D> {
    fn claim(mut port: P, delay: D, lines: &[LineId]) -> Result<Self> {
        let mut owned = Vec::new();
        for &line in lines {
            push_distinct(&mut owned, line)?;
        }
        claim_all(&mut port, &owned)?;
        Ok(Self {
            port,
            delay,
            owned,
            half_period_ns: 0,
            open: true,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        match (self.open, self.owned.first()) {
            (true, _) => Ok(()),
            (false, Some(&line)) => Err(Error::HardwareUnavailable(GpioError::Unavailable(line))),
            (false, None) => Err(Error::HardwareUnavailable(GpioError::ControllerFault)),
        }
    }

    fn output(&mut self, line: LineId, level: Level) {
        self.port.configure_line(line, PinDirection::Output);
        self.port.set_line(line, level);
    }

    fn dwell(&mut self) {
        if self.half_period_ns > 0 {
            self.delay.delay_ns(self.half_period_ns);
        }
    }

    /// Drive `active`, hold for one dwell, return to the opposite level
    fn pulse(&mut self, line: LineId, active: Level) {
        self.port.set_line(line, active);
        self.dwell();
        self.port.set_line(line, !active);
    }

    /// Rising then falling edge on the clock
    fn clock_pulse(&mut self, clock: LineId) {
        self.port.set_line(clock, Level::High);
        self.dwell();
        self.port.set_line(clock, Level::Low);
        self.dwell();
    }

    fn release(&mut self) {
        if self.open {
            release_all(&mut self.port, &self.owned);
            self.open = false;
        }
    }
}

/// Parallel-in serial-out shift register (SN74HC165 and chains of it)
///
/// Lines: serial data from the chip, shift clock, and the active-low
/// SH/LD-bar load input. The first bit clocked out is the most significant
/// unless the configuration asks for LSB first.
pub struct ShiftIn<P: GpioPort, D: DelayNs> {
    wires: Wires<P, D>,
    data: LineId,
    clock: LineId,
    load: LineId,
    width: u8,
    bit_order: BitOrder,
}

impl<P: GpioPort, D: DelayNs> ShiftIn<P, D> {
    /// Claim the lines; clock rests low, load inactive high
    pub fn open(port: P, config: &ShiftInConfig, delay: D) -> Result<Self> {
        check_width(config.width, MAX_WORD_BITS)?;
        let mut wires = Wires::claim(port, delay, &[config.data, config.clock, config.load])?;
        wires.port.configure_line(config.data, PinDirection::Input);
        wires.output(config.clock, Level::Low);
        wires.output(config.load, Level::High);

        #[cfg(feature = "defmt")]
        defmt::debug!("shift in open: {} bits", config.width);

        Ok(Self {
            wires,
            data: config.data,
            clock: config.clock,
            load: config.load,
            width: config.width,
            bit_order: config.bit_order,
        })
    }

    /// Bits read by [`ShiftIn::read`]
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Limit the shift clock rate; `None` removes the limit
    pub fn set_max_rate(&mut self, hz: Option<u32>) -> Result<()> {
        self.wires.half_period_ns = half_period_ns(hz)?;
        Ok(())
    }

    /// Underlying port
    pub fn port(&self) -> &P {
        &self.wires.port
    }

    /// Capture the parallel inputs (active-low pulse on load)
    pub fn load(&mut self) -> Result<()> {
        self.wires.ensure_open()?;
        self.wires.pulse(self.load, Level::Low);
        Ok(())
    }

    /// Clock `n` bits out of the register
    ///
    /// Each bit is sampled before its clock pulse; the first bit is already
    /// waiting after [`ShiftIn::load`]. `n = 0` touches no line.
    pub fn read_bits(&mut self, n: u8) -> Result<u64> {
        self.wires.ensure_open()?;
        check_width(n, MAX_WORD_BITS)?;

        let mut acc = 0u64;
        for index in 0..n {
            let bit = self.wires.port.read_line(self.data).is_high();
            acc = set_word_bit_at(acc, index, n, bit, self.bit_order)?;
            self.wires.clock_pulse(self.clock);
        }
        Ok(acc)
    }

    /// Load, then read the full width
    pub fn read(&mut self) -> Result<u64> {
        self.load()?;
        self.read_bits(self.width)
    }

    /// Release the lines; idempotent
    pub fn close(&mut self) {
        self.wires.release();
    }

    /// Check if the lines are still held
    pub fn is_open(&self) -> bool {
        self.wires.open
    }
}

impl<P: GpioPort, D: DelayNs> Drop for ShiftIn<P, D> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Serial-in parallel-out shift register (SN74HC595 and chains of it)
///
/// Lines: serial data into the chip, shift clock, storage latch, and an
/// optional active-low clear. Bits go out most significant first.
pub struct ShiftOut<P: GpioPort, D: DelayNs> {
    wires: Wires<P, D>,
    data: LineId,
    clock: LineId,
    latch: LineId,
    clear: Option<LineId>,
    width: u8,
}

impl<P: GpioPort, D: DelayNs> ShiftOut<P, D> {
    /// Claim the lines; everything rests low except clear
    pub fn open(port: P, config: &ShiftOutConfig, delay: D) -> Result<Self> {
        check_width(config.width, MAX_WORD_BITS)?;
        let mut lines: Vec<LineId, MAX_LINES> = Vec::new();
        for line in [Some(config.data), Some(config.clock), Some(config.latch), config.clear]
            .into_iter()
            .flatten()
        {
            push_distinct(&mut lines, line)?;
        }
        let mut wires = Wires::claim(port, delay, &lines)?;
        wires.output(config.data, Level::Low);
        wires.output(config.clock, Level::Low);
        wires.output(config.latch, Level::Low);
        if let Some(clear) = config.clear {
            wires.output(clear, Level::High);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("shift out open: {} bits", config.width);

        Ok(Self {
            wires,
            data: config.data,
            clock: config.clock,
            latch: config.latch,
            clear: config.clear,
            width: config.width,
        })
    }

    /// Bits written by [`ShiftOut::write`]
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Limit the shift clock rate; `None` removes the limit
    pub fn set_max_rate(&mut self, hz: Option<u32>) -> Result<()> {
        self.wires.half_period_ns = half_period_ns(hz)?;
        Ok(())
    }

    /// Underlying port
    pub fn port(&self) -> &P {
        &self.wires.port
    }

    /// Shift the low `n` bits of `value` in, bit `n - 1` first
    ///
    /// Outputs do not change until [`ShiftOut::latch`]. `n = 0` touches no
    /// line.
    pub fn send_bits(&mut self, value: u64, n: u8) -> Result<()> {
        self.wires.ensure_open()?;
        check_width(n, MAX_WORD_BITS)?;

        for i in 0..n {
            let bit = (value >> (n - 1 - i)) & 1 != 0;
            self.wires.port.set_line(self.data, Level::from(bit));
            self.wires.dwell();
            self.wires.clock_pulse(self.clock);
        }
        Ok(())
    }

    /// Copy the shift register to the outputs (rising edge on latch)
    pub fn latch(&mut self) -> Result<()> {
        self.wires.ensure_open()?;
        self.wires.pulse(self.latch, Level::High);
        Ok(())
    }

    /// Zero the outputs
    ///
    /// Pulses clear when wired, otherwise shifts in zeros; then latches.
    pub fn clear(&mut self) -> Result<()> {
        self.wires.ensure_open()?;
        match self.clear {
            Some(clear) => self.wires.pulse(clear, Level::Low),
            None => self.send_bits(0, self.width)?,
        }
        self.latch()
    }

    /// Shift the full width in and latch it
    ///
    /// Bits above the width are ignored.
    pub fn write(&mut self, value: u64) -> Result<()> {
        self.send_bits(value & word_mask(self.width), self.width)?;
        self.latch()
    }

    /// Release the lines; idempotent
    pub fn close(&mut self) {
        self.wires.release();
    }

    /// Check if the lines are still held
    pub fn is_open(&self) -> bool {
        self.wires.open
    }
}

impl<P: GpioPort, D: DelayNs> Drop for ShiftOut<P, D> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidArgument;
    use crate::sim::{PisoModel, SimDelay, SimDevice, SimPort, SipoModel};
    use core::cell::RefCell;
    use phys605_hal::SharedPort;
    use proptest::prelude::*;

    const DATA: LineId = LineId(18);
    const CLK: LineId = LineId(19);
    const LOAD: LineId = LineId(20);
    const LATCH: LineId = LineId(21);
    const CLEAR: LineId = LineId(22);

    fn in_config(width: u8, bit_order: BitOrder) -> ShiftInConfig {
        ShiftInConfig {
            data: DATA,
            clock: CLK,
            load: LOAD,
            width,
            bit_order,
        }
    }

    fn out_config(width: u8, clear: Option<LineId>) -> ShiftOutConfig {
        ShiftOutConfig {
            data: DATA,
            clock: CLK,
            latch: LATCH,
            clear,
            width,
        }
    }

    fn piso_port(width: u8, parallel: u64) -> RefCell<SimPort> {
        let piso = PisoModel::new(DATA, CLK, LOAD, width).with_parallel(parallel);
        RefCell::new(SimPort::new().with_device(SimDevice::Piso(piso)))
    }

    fn sipo_port(width: u8) -> RefCell<SimPort> {
        let sipo = SipoModel::new(DATA, CLK, LATCH, width).with_clear(CLEAR);
        RefCell::new(SimPort::new().with_device(SimDevice::Sipo(sipo)))
    }

    #[test]
    fn test_piso_load_and_read() {
        let sim = piso_port(8, 0xA5);
        let config = in_config(8, BitOrder::MsbFirst);
        let mut reg = ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()).unwrap();
        assert_eq!(reg.read(), Ok(0xA5));

        // A new load picks up changed inputs
        sim.borrow_mut().piso_mut(0).unwrap().set_parallel(0x3C);
        assert_eq!(reg.read(), Ok(0x3C));
    }

    #[test]
    fn test_piso_lsb_first() {
        let sim = piso_port(8, 0b1000_0011);
        let config = in_config(8, BitOrder::LsbFirst);
        let mut reg = ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()).unwrap();
        assert_eq!(reg.read(), Ok(0b1100_0001));
    }

    #[test]
    fn test_piso_24_bit_chain() {
        let sim = piso_port(24, 0xDEADBE);
        let config = in_config(24, BitOrder::MsbFirst);
        let mut reg = ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()).unwrap();
        assert_eq!(reg.read(), Ok(0xDEADBE));
    }

    #[test]
    fn test_piso_load_is_active_low_pulse() {
        let sim = piso_port(8, 0);
        let config = in_config(8, BitOrder::MsbFirst);
        let mut reg = ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()).unwrap();
        assert_eq!(sim.borrow().level(LOAD), Level::High);
        assert_eq!(sim.borrow().level(CLK), Level::Low);

        sim.borrow_mut().clear_events();
        reg.load().unwrap();
        assert_eq!(sim.borrow().toggle_count(), 2);
        assert_eq!(sim.borrow().level(LOAD), Level::High);
    }

    #[test]
    fn test_sipo_send_and_latch() {
        let sim = sipo_port(8);
        let mut reg =
            ShiftOut::open(SharedPort::new(&sim), &out_config(8, Some(CLEAR)), SimDelay::default())
                .unwrap();

        reg.send_bits(0xC3, 8).unwrap();
        assert_eq!(sim.borrow().sipo(0).unwrap().outputs(), 0);
        reg.latch().unwrap();
        assert_eq!(sim.borrow().sipo(0).unwrap().outputs(), 0xC3);

        // Bits above the width fall off the end of the chain
        reg.write(0x1_5A).unwrap();
        assert_eq!(sim.borrow().sipo(0).unwrap().outputs(), 0x5A);
    }

    #[test]
    fn test_sipo_chain_of_three() {
        let sim = sipo_port(24);
        let mut reg =
            ShiftOut::open(SharedPort::new(&sim), &out_config(24, None), SimDelay::default())
                .unwrap();
        reg.write(0xDEADBE).unwrap();
        assert_eq!(sim.borrow().sipo(0).unwrap().outputs(), 0xDEADBE);
    }

    #[test]
    fn test_sipo_clear() {
        let sim = sipo_port(8);
        let mut reg =
            ShiftOut::open(SharedPort::new(&sim), &out_config(8, Some(CLEAR)), SimDelay::default())
                .unwrap();
        reg.write(0xFF).unwrap();
        reg.clear().unwrap();
        assert_eq!(sim.borrow().sipo(0).unwrap().outputs(), 0);
        assert_eq!(sim.borrow().level(CLEAR), Level::High);

        // Without a clear line zeros are shifted through
        drop(reg);
        let sim = sipo_port(8);
        let mut reg =
            ShiftOut::open(SharedPort::new(&sim), &out_config(8, None), SimDelay::default())
                .unwrap();
        reg.write(0x81).unwrap();
        reg.clear().unwrap();
        assert_eq!(sim.borrow().sipo(0).unwrap().outputs(), 0);
    }

    #[test]
    fn test_zero_bits_touch_nothing() {
        let sim = sipo_port(8);
        let mut out =
            ShiftOut::open(SharedPort::new(&sim), &out_config(8, None), SimDelay::default())
                .unwrap();
        sim.borrow_mut().clear_events();
        out.send_bits(0xFF, 0).unwrap();
        assert!(sim.borrow().events().is_empty());
        drop(out);

        let sim = piso_port(8, 0xFF);
        let config = in_config(8, BitOrder::MsbFirst);
        let mut reg = ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()).unwrap();
        sim.borrow_mut().clear_events();
        assert_eq!(reg.read_bits(0), Ok(0));
        assert!(sim.borrow().events().is_empty());
    }

    #[test]
    fn test_width_limits() {
        let sim = piso_port(8, 0);
        let config = in_config(8, BitOrder::MsbFirst);
        let mut reg = ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()).unwrap();
        assert_eq!(
            reg.read_bits(65),
            Err(Error::InvalidArgument(InvalidArgument::WidthOutOfRange(65)))
        );
        drop(reg);

        let config = in_config(72, BitOrder::MsbFirst);
        assert!(matches!(
            ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()),
            Err(Error::InvalidArgument(InvalidArgument::WidthOutOfRange(72)))
        ));
    }

    #[test]
    fn test_lifecycle() {
        let sim = sipo_port(8);
        {
            let mut reg = ShiftOut::open(
                SharedPort::new(&sim),
                &out_config(8, Some(CLEAR)),
                SimDelay::default(),
            )
            .unwrap();
            assert_eq!(sim.borrow().claimed_count(), 4);
            reg.close();
            reg.close();
            assert!(reg.latch().is_err());
            assert_eq!(sim.borrow().claimed_count(), 0);
        }
        {
            let _reg =
                ShiftOut::open(SharedPort::new(&sim), &out_config(8, None), SimDelay::default())
                    .unwrap();
            assert_eq!(sim.borrow().claimed_count(), 3);
        }
        assert_eq!(sim.borrow().claimed_count(), 0);

        // Same line for two roles
        let bad = ShiftOutConfig {
            latch: CLK,
            ..out_config(8, None)
        };
        assert!(matches!(
            ShiftOut::open(SharedPort::new(&sim), &bad, SimDelay::default()),
            Err(Error::InvalidArgument(InvalidArgument::LineConflict(CLK)))
        ));
    }

    #[test]
    fn test_dwell_applies_to_clock() {
        let sim = piso_port(8, 0);
        let config = in_config(8, BitOrder::MsbFirst);
        let mut reg = ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()).unwrap();
        reg.set_max_rate(Some(1_000_000)).unwrap();
        reg.read_bits(4).unwrap();
        assert_eq!(reg.wires.delay.calls, 8);
        assert_eq!(reg.wires.delay.total_ns, 4_000);
        assert!(reg.set_max_rate(Some(0)).is_err());
    }

    proptest! {
        #[test]
        fn prop_sipo_then_piso(value: u64, width in 1u8..=64) {
            let value = value & word_mask(width);

            let sim = sipo_port(width);
            let mut out =
                ShiftOut::open(SharedPort::new(&sim), &out_config(width, None), SimDelay::default())
                    .unwrap();
            out.write(value).unwrap();
            let latched = sim.borrow().sipo(0).unwrap().outputs();
            prop_assert_eq!(latched, value);
            drop(out);

            let sim = piso_port(width, latched);
            let config = in_config(width, BitOrder::MsbFirst);
            let mut reg =
                ShiftIn::open(SharedPort::new(&sim), &config, SimDelay::default()).unwrap();
            prop_assert_eq!(reg.read().unwrap(), value);
        }
    }
}
