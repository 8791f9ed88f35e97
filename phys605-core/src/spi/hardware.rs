//! Hardware SPI transport
//!
//! Hands clocking to the board's SPI controller. The controller only does
//! full-duplex transfers of equal length in the bit orders it supports, so
//! this transport pads and chunks requests through a stack buffer and
//! emulates LSB-first by reversing every byte.

use phys605_hal::{BitOrder, GpioError, GpioPort, NoPort, PinDirection, SpiBus, SpiConfig};

use super::{TransferRequest, Transport, CHUNK_SIZE};
use crate::config::BusConfig;
use crate::error::{Error, InvalidArgument, Result};
use crate::line::ChipSelect;

/// SPI transport over a hardware controller
///
/// Chip select is either the controller's own (no `GpioPort` needed) or a
/// GPIO line framed by this transport.
pub struct HardwareSpiTransport<B: SpiBus, P: GpioPort = NoPort> {
    bus: B,
    port: P,
    chip_select: Option<ChipSelect>,
    config: BusConfig,
    reverse_bits: bool,
    selected: bool,
    open: bool,
}

impl<B: SpiBus> HardwareSpiTransport<B, NoPort> {
    /// Use the controller with its own chip select
    pub fn open(bus: B, config: BusConfig) -> Result<Self> {
        let mut transport = Self {
            bus,
            port: NoPort,
            chip_select: None,
            config,
            reverse_bits: false,
            selected: false,
            open: true,
        };
        transport.reverse_bits = transport.apply(&config)?;
        Ok(transport)
    }
}

impl<B: SpiBus, P: GpioPort> HardwareSpiTransport<B, P> {
    /// Use the controller with a GPIO chip select
    pub fn open_with_chip_select(
        bus: B,
        mut port: P,
        chip_select: ChipSelect,
        config: BusConfig,
    ) -> Result<Self> {
        port.claim(chip_select.line)?;
        port.configure_line(chip_select.line, PinDirection::Output);
        port.set_line(chip_select.line, chip_select.inactive_level());

        let mut transport = Self {
            bus,
            port,
            chip_select: Some(chip_select),
            config,
            reverse_bits: false,
            selected: false,
            open: true,
        };
        // Drop releases the line on failure
        transport.reverse_bits = transport.apply(&config)?;
        Ok(transport)
    }

    /// Underlying controller
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Check if LSB-first is emulated in software
    pub fn reverses_bits(&self) -> bool {
        self.reverse_bits
    }

    /// Validate settings and push them to the controller
    ///
    /// Returns whether bytes must be bit-reversed in software.
    fn apply(&mut self, config: &BusConfig) -> Result<bool> {
        if !self.bus.supports_mode(config.mode) {
            return Err(Error::UnsupportedMode(config.mode));
        }

        let max = self.bus.max_frequency_hz();
        let frequency = match config.max_rate_hz {
            None => max,
            Some(0) => return Err(InvalidArgument::ZeroRate.into()),
            Some(requested) if requested > max => {
                return Err(InvalidArgument::RateTooHigh { requested, max }.into())
            }
            Some(requested) => requested,
        };

        let reverse =
            config.bit_order == BitOrder::LsbFirst && !self.bus.supports_lsb_first();
        let bit_order = if reverse {
            BitOrder::MsbFirst
        } else {
            config.bit_order
        };

        let spi_config = SpiConfig {
            frequency,
            polarity: config.mode.polarity(),
            phase: config.mode.phase(),
            bit_order,
        };
        self.bus.set_config(&spi_config).map_err(bus_error)?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "hardware spi: mode={} {}Hz reverse={}",
            config.mode.number(),
            frequency,
            reverse
        );

        Ok(reverse)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::HardwareUnavailable(GpioError::ControllerFault))
        }
    }

    fn set_chip_select(&mut self, active: bool) {
        self.selected = active;
        if let Some(cs) = self.chip_select {
            let level = if active {
                cs.active_level()
            } else {
                cs.inactive_level()
            };
            self.port.set_line(cs.line, level);
        }
    }

    /// Clock `max(write, read)` bytes in chunks
    fn clock(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        let fill = self.config.fill_byte;
        let reverse = self.reverse_bits;
        let wire = |byte: u8| if reverse { byte.reverse_bits() } else { byte };

        let count = write.len().max(read.len());
        let mut scratch = [0u8; CHUNK_SIZE];
        let mut offset = 0;
        while offset < count {
            let n = (count - offset).min(CHUNK_SIZE);
            let chunk = &mut scratch[..n];
            for (i, slot) in chunk.iter_mut().enumerate() {
                *slot = wire(write.get(offset + i).copied().unwrap_or(fill));
            }

            if offset < read.len() {
                self.bus.transfer_in_place(chunk).map_err(bus_error)?;
                let end = read.len().min(offset + n);
                for (dst, &src) in read[offset..end].iter_mut().zip(chunk.iter()) {
                    *dst = wire(src);
                }
            } else {
                self.bus.write(chunk).map_err(bus_error)?;
            }
            offset += n;
        }
        Ok(())
    }
}

fn bus_error<E>(_: E) -> Error {
    Error::HardwareUnavailable(GpioError::ControllerFault)
}

impl<B: SpiBus, P: GpioPort> Transport for HardwareSpiTransport<B, P> {
    fn configure(&mut self, config: BusConfig) -> Result<()> {
        self.ensure_open()?;
        if self.selected {
            return Err(InvalidArgument::TransactionOpen.into());
        }
        let reverse = self.apply(&config)?;
        self.config = config;
        self.reverse_bits = reverse;
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

        if framing.assert_cs {
            self.set_chip_select(true);
        }
        let result = self.clock(write, read);
        if framing.deassert_cs {
            self.set_chip_select(false);
        }
        result
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        if let Some(cs) = self.chip_select {
            self.port.set_line(cs.line, cs.inactive_level());
            self.port.release(cs.line);
        }
        self.selected = false;
        self.open = false;

        #[cfg(feature = "defmt")]
        defmt::debug!("hardware spi closed");
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl<B: SpiBus, P: GpioPort> Drop for HardwareSpiTransport<B, P> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPort;
    use crate::spi::Framing;
    use core::cell::RefCell;
    use heapless::Vec;
    use phys605_hal::{Level, LineId, Mode, Phase, Polarity, SharedPort};

    /// Controller that echoes every byte and records what it saw
    #[derive(Default)]
    struct MockBus {
        config: Option<SpiConfig>,
        sent: Vec<u8, 128>,
        calls: usize,
        lsb_capable: bool,
        mode3_refused: bool,
        fail: bool,
    }

    #[derive(Debug)]
    struct BusFault;

    type BusResult = core::result::Result<(), BusFault>;

    impl SpiBus for MockBus {
        type Error = BusFault;

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> BusResult {
            self.write(write)?;
            read.copy_from_slice(&write[..read.len()]);
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> BusResult {
            if self.fail {
                return Err(BusFault);
            }
            self.calls += 1;
            self.sent.extend_from_slice(data).map_err(|_| BusFault)
        }

        fn read(&mut self, buf: &mut [u8]) -> BusResult {
            buf.fill(0);
            Ok(())
        }

        fn transfer_in_place(&mut self, data: &mut [u8]) -> BusResult {
            self.write(data)
        }

        fn set_config(&mut self, config: &SpiConfig) -> BusResult {
            self.config = Some(*config);
            Ok(())
        }

        fn max_frequency_hz(&self) -> u32 {
            1_000_000
        }

        fn supports_mode(&self, mode: Mode) -> bool {
            !(self.mode3_refused && mode == Mode::Mode3)
        }

        fn supports_lsb_first(&self) -> bool {
            self.lsb_capable
        }
    }

    #[test]
    fn test_open_programs_controller() {
        let config = BusConfig::new(Mode::Mode1);
        let spi = HardwareSpiTransport::open(MockBus::default(), config).unwrap();
        let applied = spi.bus().config.unwrap();
        assert_eq!(applied.frequency, 1_000_000);
        assert_eq!(applied.polarity, Polarity::IdleLow);
        assert_eq!(applied.phase, Phase::CaptureOnSecondTransition);
    }

    #[test]
    fn test_rate_and_mode_checks() {
        let too_fast = BusConfig::default().with_max_rate(2_000_000);
        assert!(matches!(
            HardwareSpiTransport::open(MockBus::default(), too_fast),
            Err(Error::InvalidArgument(InvalidArgument::RateTooHigh {
                requested: 2_000_000,
                max: 1_000_000
            }))
        ));

        let bus = MockBus {
            mode3_refused: true,
            ..MockBus::default()
        };
        let mut spi = HardwareSpiTransport::open(bus, BusConfig::default()).unwrap();
        assert_eq!(
            spi.configure(BusConfig::new(Mode::Mode3)),
            Err(Error::UnsupportedMode(Mode::Mode3))
        );
        assert_eq!(spi.config().mode, Mode::Mode0);
    }

    #[test]
    fn test_unequal_lengths_padded() {
        let config = BusConfig::default().with_fill_byte(0xFF);
        let mut spi = HardwareSpiTransport::open(MockBus::default(), config).unwrap();

        let mut read = [0u8; 3];
        spi.transfer(TransferRequest::new(&[0x01], &mut read)).unwrap();
        assert_eq!(read, [0x01, 0xFF, 0xFF]);

        let mut read = [0u8; 1];
        spi.transfer(TransferRequest::new(&[0x0A, 0x0B, 0x0C], &mut read))
            .unwrap();
        assert_eq!(read, [0x0A]);
        assert_eq!(spi.bus().sent.as_slice(), &[0x01, 0xFF, 0xFF, 0x0A, 0x0B, 0x0C]);
    }

    #[test]
    fn test_long_transfer_chunked() {
        let mut spi = HardwareSpiTransport::open(MockBus::default(), BusConfig::default())
            .unwrap();
        let data = [0x5Au8; 70];
        spi.write(&data).unwrap();
        assert_eq!(spi.bus().calls, 3);
        assert_eq!(spi.bus().sent.len(), 70);
    }

    #[test]
    fn test_lsb_first_emulated() {
        let config = BusConfig::default().with_bit_order(BitOrder::LsbFirst);
        let mut spi = HardwareSpiTransport::open(MockBus::default(), config).unwrap();
        assert!(spi.reverses_bits());
        assert_eq!(spi.bus().config.unwrap().bit_order, BitOrder::MsbFirst);

        let mut read = [0u8; 1];
        spi.transfer(TransferRequest::new(&[0x01], &mut read)).unwrap();
        assert_eq!(spi.bus().sent.as_slice(), &[0x80]);
        // Reversed twice on the way back
        assert_eq!(read, [0x01]);

        let bus = MockBus {
            lsb_capable: true,
            ..MockBus::default()
        };
        let spi = HardwareSpiTransport::open(bus, config).unwrap();
        assert!(!spi.reverses_bits());
    }

    #[test]
    fn test_gpio_chip_select_framing() {
        let cs = LineId(17);
        let sim = RefCell::new(SimPort::new());
        let mut spi = HardwareSpiTransport::open_with_chip_select(
            MockBus::default(),
            SharedPort::new(&sim),
            ChipSelect::active_low(cs),
            BusConfig::default(),
        )
        .unwrap();
        assert_eq!(sim.borrow().level(cs), Level::High);
        assert!(sim.borrow().is_claimed(cs));

        sim.borrow_mut().clear_events();
        spi.write(&[0x42]).unwrap();
        assert_eq!(sim.borrow().toggle_count(), 2);
        assert_eq!(sim.borrow().level(cs), Level::High);

        spi.close();
        assert!(!sim.borrow().is_claimed(cs));
    }

    #[test]
    fn test_bus_fault_is_hardware_unavailable() {
        let mut spi = HardwareSpiTransport::open(MockBus::default(), BusConfig::default())
            .unwrap();
        spi.bus.fail = true;
        assert_eq!(
            spi.write(&[1]),
            Err(Error::HardwareUnavailable(GpioError::ControllerFault))
        );

        spi.close();
        assert!(spi.write(&[]).is_err());
    }

    #[test]
    fn test_closed_transport_leaves_controller_alone() {
        let mut spi = HardwareSpiTransport::open(MockBus::default(), BusConfig::default())
            .unwrap();
        spi.close();
        let before = spi.bus().config;

        assert_eq!(
            spi.configure(BusConfig::new(Mode::Mode2)),
            Err(Error::HardwareUnavailable(GpioError::ControllerFault))
        );
        assert_eq!(spi.bus().config, before);
        assert_eq!(spi.config().mode, Mode::Mode0);
    }

    #[test]
    fn test_configure_refused_inside_transaction() {
        let cs = LineId(17);
        let sim = RefCell::new(SimPort::new());
        let mut spi = HardwareSpiTransport::open_with_chip_select(
            MockBus::default(),
            SharedPort::new(&sim),
            ChipSelect::active_low(cs),
            BusConfig::default(),
        )
        .unwrap();

        spi.transfer(TransferRequest::write_only(&[0x01]).with_framing(Framing::BEGIN))
            .unwrap();
        assert_eq!(
            spi.configure(BusConfig::new(Mode::Mode3)),
            Err(Error::InvalidArgument(InvalidArgument::TransactionOpen))
        );
        assert_eq!(spi.bus().config.unwrap().polarity, Polarity::IdleLow);

        spi.transfer(TransferRequest::write_only(&[0x02]).with_framing(Framing::END))
            .unwrap();
        spi.configure(BusConfig::new(Mode::Mode3)).unwrap();
        assert_eq!(spi.bus().config.unwrap().polarity, Polarity::IdleHigh);
    }
}
