//! Software SPI engine
//!
//! Clocks bits by toggling GPIO lines. Every bit follows the same steps:
//!
//! 1. drive data out while the clock is idle
//! 2. clock to active level; modes 0 and 2 sample data in here
//! 3. clock back to idle; modes 1 and 3 sample data in here
//!
//! Each half of the clock period dwells for `ceil(1e9 / (2 * max_rate_hz))`
//! nanoseconds. Without a rate ceiling the engine runs as fast as the
//! port toggles, so the achieved rate is a property of the board, not a
//! guarantee.
//!
//! Lines sharing one bidirectional data pin (DataOut == DataIn) are turned
//! around only while the clock is idle. The shared line idles as an input.

use heapless::Vec;
use phys605_hal::{DelayNs, GpioError, GpioPort, Level, LineId, PinDirection};

use super::{Framing, TransferRequest, Transport};
use crate::bits::{byte_mask, check_width, set_word_bit_at, word_bit_at, BITS_PER_BYTE};
use crate::config::BusConfig;
use crate::error::{Error, InvalidArgument, Result};
use crate::line::{claim_all, release_all, Lines, MAX_LINES};

/// Widest word [`BitBangTransport::write_bits`] and
/// [`BitBangTransport::read_bits`] move in one call
pub const MAX_BITS_PER_CALL: u8 = 32;

/// Half-clock dwell for a rate ceiling, in nanoseconds
///
/// `None` means no ceiling and no dwell.
pub fn half_period_ns(max_rate_hz: Option<u32>) -> Result<u32> {
    match max_rate_hz {
        None => Ok(0),
        Some(0) => Err(InvalidArgument::ZeroRate.into()),
        Some(hz) => {
            let two_rate = 2 * u64::from(hz);
            Ok(1_000_000_000u64.div_ceil(two_rate) as u32)
        }
    }
}

/// SPI master driven entirely in software
pub struct BitBangTransport<P: GpioPort, D: DelayNs> {
    port: P,
    delay: D,
    lines: Lines,
    owned: Vec<LineId, MAX_LINES>,
    config: BusConfig,
    half_period_ns: u32,
    shared_driving: bool,
    /// Chip select held between a BEGIN and an END transfer
    selected: bool,
    open: bool,
}

impl<P: GpioPort, D: DelayNs> BitBangTransport<P, D> {
    /// Claim the lines and park the bus
    ///
    /// Clock rests at the mode's idle level, chip select inactive, data out
    /// low. If any line cannot be claimed the ones already taken are
    /// released and `HardwareUnavailable` is returned.
    pub fn open(mut port: P, lines: Lines, config: BusConfig, delay: D) -> Result<Self> {
        let owned = lines.distinct()?;
        let half_period_ns = half_period_ns(config.max_rate_hz)?;
        claim_all(&mut port, &owned)?;

        let mut transport = Self {
            port,
            delay,
            lines,
            owned,
            config,
            half_period_ns,
            shared_driving: false,
            selected: false,
            open: true,
        };
        transport.park();

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "bitbang open: clk={} mode={} half={}ns",
            lines.clock.0,
            config.mode.number(),
            half_period_ns
        );

        Ok(transport)
    }

    /// Line assignment
    pub fn lines(&self) -> &Lines {
        &self.lines
    }

    /// Underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Underlying port, mutably
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Delay source
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Dwell per clock half in nanoseconds (0 = no dwell)
    pub fn half_period(&self) -> u32 {
        self.half_period_ns
    }

    /// Highest clock rate the configured dwell allows
    ///
    /// `None` without a rate ceiling. The real rate is lower by however
    /// long the port takes to toggle a line.
    pub fn rate_ceiling_hz(&self) -> Option<u32> {
        if self.half_period_ns == 0 {
            return None;
        }
        Some((1_000_000_000u64 / (2 * u64::from(self.half_period_ns))) as u32)
    }

    /// Send the low `count` bits of `value` in the configured bit order
    ///
    /// For chips whose commands are not whole bytes. `count` is at most 32;
    /// zero bits only frames chip select.
    pub fn write_bits(&mut self, value: u32, count: u8, framing: Framing) -> Result<()> {
        self.ensure_open()?;
        check_width(count, MAX_BITS_PER_CALL)?;
        if count == 0 {
            return self.frame_only(framing);
        }
        if self.lines.data_out.is_none() {
            return Err(InvalidArgument::MissingDataOut.into());
        }

        if framing.assert_cs {
            self.select();
        }
        self.drive_shared(true);
        let order = self.config.bit_order;
        for index in 0..count {
            let bit = word_bit_at(u64::from(value), index, count, order)?;
            self.clock_bit(Some(bit), false);
        }
        if framing.deassert_cs {
            self.deselect();
        }
        Ok(())
    }

    /// Receive `count` bits, assembled in the configured bit order
    ///
    /// A separate data out line holds its level meanwhile; a shared data
    /// line is turned to input first.
    pub fn read_bits(&mut self, count: u8, framing: Framing) -> Result<u32> {
        self.ensure_open()?;
        check_width(count, MAX_BITS_PER_CALL)?;
        if count == 0 {
            self.frame_only(framing)?;
            return Ok(0);
        }
        if self.lines.data_in.is_none() {
            return Err(InvalidArgument::MissingDataIn.into());
        }

        if framing.assert_cs {
            self.select();
        }
        self.drive_shared(false);
        let order = self.config.bit_order;
        let mut acc = 0u64;
        for index in 0..count {
            let bit = self.clock_bit(None, true);
            acc = set_word_bit_at(acc, index, count, bit, order)?;
        }
        if framing.deassert_cs {
            self.deselect();
        }
        Ok(acc as u32)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::HardwareUnavailable(GpioError::Unavailable(
                self.lines.clock,
            )))
        }
    }

    fn idle_level(&self) -> Level {
        Level::from(self.config.mode.clock_idle_high())
    }

    /// Put every line in its resting state
    fn park(&mut self) {
        if let Some(cs) = self.lines.chip_select {
            self.port.configure_line(cs.line, PinDirection::Output);
            self.port.set_line(cs.line, cs.inactive_level());
        }

        let idle = self.idle_level();
        self.port.configure_line(self.lines.clock, PinDirection::Output);
        self.port.set_line(self.lines.clock, idle);

        if self.lines.shares_data_line() {
            if let Some(line) = self.lines.data_in {
                self.port.configure_line(line, PinDirection::Input);
            }
            self.shared_driving = false;
            return;
        }
        if let Some(line) = self.lines.data_out {
            self.port.configure_line(line, PinDirection::Output);
            self.port.set_line(line, Level::Low);
        }
        if let Some(line) = self.lines.data_in {
            self.port.configure_line(line, PinDirection::Input);
        }
    }

    /// Turn a shared data line around; only called with the clock idle
    fn drive_shared(&mut self, driving: bool) {
        if !self.lines.shares_data_line() || self.shared_driving == driving {
            return;
        }
        if let Some(line) = self.lines.data_out {
            let direction = if driving {
                PinDirection::Output
            } else {
                PinDirection::Input
            };
            self.port.configure_line(line, direction);
            self.shared_driving = driving;
        }
    }

    fn select(&mut self) {
        if let Some(cs) = self.lines.chip_select {
            self.port.set_line(cs.line, cs.active_level());
        }
        self.selected = true;
    }

    fn deselect(&mut self) {
        if let Some(cs) = self.lines.chip_select {
            self.port.set_line(cs.line, cs.inactive_level());
        }
        self.selected = false;
        // A shared line goes back to listening between transactions
        self.drive_shared(false);
    }

    fn frame_only(&mut self, framing: Framing) -> Result<()> {
        if framing.assert_cs {
            self.select();
        }
        if framing.deassert_cs {
            self.deselect();
        }
        Ok(())
    }

    fn dwell(&mut self) {
        if self.half_period_ns > 0 {
            self.delay.delay_ns(self.half_period_ns);
        }
    }

    /// One clock cycle; returns the sampled bit (false when not sampling)
    fn clock_bit(&mut self, out: Option<bool>, sample: bool) -> bool {
        let mode = self.config.mode;
        let idle = self.idle_level();
        let trailing = mode.sample_on_trailing_edge();

        if let (Some(bit), Some(line)) = (out, self.lines.data_out) {
            self.port.set_line(line, Level::from(bit));
        }
        self.dwell();

        self.port.set_line(self.lines.clock, !idle);
        let mut value = false;
        if sample && !trailing {
            value = self.sample();
        }
        self.dwell();

        self.port.set_line(self.lines.clock, idle);
        if sample && trailing {
            value = self.sample();
        }
        value
    }

    fn sample(&mut self) -> bool {
        match self.lines.data_in {
            Some(line) => self.port.read_line(line).is_high(),
            None => false,
        }
    }

    /// Eight clock cycles in the configured bit order
    fn clock_byte(&mut self, out: Option<u8>, sample: bool) -> u8 {
        let order = self.config.bit_order;
        let mut acc = 0u8;
        for index in 0..BITS_PER_BYTE {
            let mask = byte_mask(index, order);
            if self.clock_bit(out.map(|byte| byte & mask != 0), sample) {
                acc |= mask;
            }
        }
        acc
    }
}

impl<P: GpioPort, D: DelayNs> Transport for BitBangTransport<P, D> {
    fn configure(&mut self, config: BusConfig) -> Result<()> {
        // Re-parking the clock mid-transaction would be seen as an edge
        if self.selected {
            return Err(InvalidArgument::TransactionOpen.into());
        }
        let half_period_ns = half_period_ns(config.max_rate_hz)?;
        self.config = config;
        self.half_period_ns = half_period_ns;
        if self.open {
            let idle = self.idle_level();
            self.port.set_line(self.lines.clock, idle);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "bitbang configure: mode={} half={}ns",
            config.mode.number(),
            half_period_ns
        );

        Ok(())
    }

    fn config(&self) -> &BusConfig {
        &self.config
    }

    fn transfer(&mut self, request: TransferRequest<'_>) -> Result<()> {
        self.ensure_open()?;
        let TransferRequest {
            write,
            read,
            framing,
        } = request;

        if !write.is_empty() && self.lines.data_out.is_none() {
            return Err(InvalidArgument::MissingDataOut.into());
        }
        if !read.is_empty() && self.lines.data_in.is_none() {
            return Err(InvalidArgument::MissingDataIn.into());
        }

        if framing.assert_cs {
            self.select();
        }

        if self.lines.shares_data_line() {
            // Write phase, turnaround, read phase
            if !write.is_empty() {
                self.drive_shared(true);
                for &byte in write {
                    self.clock_byte(Some(byte), false);
                }
            }
            if !read.is_empty() {
                self.drive_shared(false);
                for slot in read.iter_mut() {
                    *slot = self.clock_byte(None, true);
                }
            }
        } else {
            let fill = self.config.fill_byte;
            let has_data_out = self.lines.data_out.is_some();
            let count = write.len().max(read.len());
            for i in 0..count {
                let out = has_data_out.then(|| write.get(i).copied().unwrap_or(fill));
                let byte = self.clock_byte(out, i < read.len());
                if let Some(slot) = read.get_mut(i) {
                    *slot = byte;
                }
            }
        }

        if framing.deassert_cs {
            self.deselect();
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        if let Some(cs) = self.lines.chip_select {
            self.port.set_line(cs.line, cs.inactive_level());
        }
        release_all(&mut self.port, &self.owned);
        self.selected = false;
        self.open = false;

        #[cfg(feature = "defmt")]
        defmt::debug!("bitbang close: clk={}", self.lines.clock.0);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl<P: GpioPort, D: DelayNs> Drop for BitBangTransport<P, D> {
    fn drop(&mut self) {
        self.close();
    }
}
