//! MCP300x / MCP320x successive-approximation ADCs
//!
//! Six parts share one protocol family:
//!
//! | chip    | channels | bits |
//! |---------|----------|------|
//! | MCP3002 | 2        | 10   |
//! | MCP3004 | 4        | 10   |
//! | MCP3008 | 8        | 10   |
//! | MCP3202 | 2        | 12   |
//! | MCP3204 | 4        | 12   |
//! | MCP3208 | 8        | 12   |
//!
//! A conversion is one three-byte full-duplex transfer in SPI mode 0 (mode
//! 3 also works). The first bytes carry the start bit, the SGL/DIFF bit and
//! the channel; the code comes back right-aligned in the last two bytes.

use phys605_core::{Error, InvalidArgument, Result, TransferRequest, Transport};

/// Supported parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Chip {
    /// 2 channels, 10 bits
    Mcp3002,
    /// 4 channels, 10 bits
    Mcp3004,
    /// 8 channels, 10 bits
    Mcp3008,
    /// 2 channels, 12 bits
    Mcp3202,
    /// 4 channels, 12 bits
    Mcp3204,
    /// 8 channels, 12 bits
    Mcp3208,
}

impl Chip {
    /// Look a part up by name, e.g. `"MCP3208"` (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        const NAMES: [(&str, Chip); 6] = [
            ("MCP3002", Chip::Mcp3002),
            ("MCP3004", Chip::Mcp3004),
            ("MCP3008", Chip::Mcp3008),
            ("MCP3202", Chip::Mcp3202),
            ("MCP3204", Chip::Mcp3204),
            ("MCP3208", Chip::Mcp3208),
        ];
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, chip)| chip)
    }

    /// Input channels
    pub const fn channels(self) -> u8 {
        match self {
            Chip::Mcp3002 | Chip::Mcp3202 => 2,
            Chip::Mcp3004 | Chip::Mcp3204 => 4,
            Chip::Mcp3008 | Chip::Mcp3208 => 8,
        }
    }

    /// Resolution in bits
    pub const fn resolution_bits(self) -> u8 {
        match self {
            Chip::Mcp3002 | Chip::Mcp3004 | Chip::Mcp3008 => 10,
            Chip::Mcp3202 | Chip::Mcp3204 | Chip::Mcp3208 => 12,
        }
    }

    /// Largest code the chip returns
    pub const fn max_code(self) -> u16 {
        (1 << self.resolution_bits()) - 1
    }
}

/// How the selected channel is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputMode {
    /// Channel against ground (SGL/DIFF = 1)
    #[default]
    SingleEnded,
    /// Pseudo-differential pair (SGL/DIFF = 0)
    Differential,
}

impl InputMode {
    /// From the `single_ended` flag of a bench description
    pub fn from_single_ended(single_ended: bool) -> Self {
        if single_ended {
            InputMode::SingleEnded
        } else {
            InputMode::Differential
        }
    }

    const fn sgl(self) -> u8 {
        match self {
            InputMode::SingleEnded => 1,
            InputMode::Differential => 0,
        }
    }
}

/// Control bytes for one conversion
///
/// The channel must already be checked against [`Chip::channels`].
pub fn command(chip: Chip, channel: u8, mode: InputMode) -> [u8; 3] {
    let sgl = mode.sgl();
    match chip {
        // start, SGL, ODD/SIGN, MSBF
        Chip::Mcp3002 | Chip::Mcp3202 => [0x01, (sgl << 7) | ((channel & 0x01) << 6) | 0x20, 0x00],
        // start, SGL, D2 D1 D0
        Chip::Mcp3004 | Chip::Mcp3008 => [0x01, ((sgl << 3) | (channel & 0x07)) << 4, 0x00],
        // 5 leading zeros, start, SGL, D2 | D1 D0
        Chip::Mcp3204 | Chip::Mcp3208 => [
            0x04 | (sgl << 1) | ((channel >> 2) & 0x01),
            (channel & 0x03) << 6,
            0x00,
        ],
    }
}

/// Extract the code from the bytes clocked back
pub fn decode(chip: Chip, response: &[u8; 3]) -> u16 {
    let hi = u16::from(response[1]);
    let lo = u16::from(response[2]);
    match chip {
        Chip::Mcp3002 => ((hi & 0x0F) << 6) | (lo >> 2),
        Chip::Mcp3202 | Chip::Mcp3204 | Chip::Mcp3208 => ((hi & 0x0F) << 8) | lo,
        Chip::Mcp3004 | Chip::Mcp3008 => ((hi & 0x03) << 8) | lo,
    }
}

/// MCP320x driver over any SPI transport
pub struct Mcp320x<T: Transport> {
    transport: T,
    chip: Chip,
    mode: InputMode,
}

impl<T: Transport> Mcp320x<T> {
    /// Driver for `chip` on a configured transport
    pub fn new(transport: T, chip: Chip, mode: InputMode) -> Self {
        Self {
            transport,
            chip,
            mode,
        }
    }

    /// Part this driver talks to
    pub fn chip(&self) -> Chip {
        self.chip
    }

    /// Current input mode
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switch between single-ended and differential
    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    /// Convert one channel
    pub fn read(&mut self, channel: u8) -> Result<u16> {
        if channel >= self.chip.channels() {
            return Err(Error::InvalidArgument(InvalidArgument::ChannelOutOfRange(
                channel,
            )));
        }

        let cmd = command(self.chip, channel, self.mode);
        let mut response = [0u8; 3];
        self.transport
            .transfer(TransferRequest::new(&cmd, &mut response))?;
        let code = decode(self.chip, &response);

        #[cfg(feature = "defmt")]
        defmt::trace!("mcp320x ch{} = {}", channel, code);

        Ok(code)
    }

    /// Convert every channel in turn
    pub fn read_all(&mut self, codes: &mut [u16]) -> Result<()> {
        for (channel, code) in (0..self.chip.channels()).zip(codes.iter_mut()) {
            *code = self.read(channel)?;
        }
        Ok(())
    }

    /// Transport, e.g. to reconfigure the clock rate
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back
    pub fn release(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use phys605_core::config::BusConfig;
    use phys605_core::sim::{SimDelay, SimDevice, SimPort, SlaveModel};
    use phys605_core::{BitBangTransport, Lines};
    use phys605_hal::{LineId, SharedPort};

    const CLK: LineId = LineId(11);
    const MOSI: LineId = LineId(10);
    const MISO: LineId = LineId(9);
    const CS: LineId = LineId(8);

    fn bench(response: &[u8]) -> RefCell<SimPort> {
        let slave = SlaveModel::new(CLK, MOSI, Some(MISO), CS).with_response(response);
        RefCell::new(SimPort::new().with_device(SimDevice::Slave(slave)))
    }

    fn lines() -> Lines {
        Lines::new(CLK)
            .with_data_out(MOSI)
            .with_data_in(MISO)
            .with_chip_select(CS)
    }

    #[test]
    fn test_chip_table() {
        assert_eq!(Chip::from_name("MCP3208"), Some(Chip::Mcp3208));
        assert_eq!(Chip::from_name("mcp3002"), Some(Chip::Mcp3002));
        assert_eq!(Chip::from_name("MCP4251"), None);
        assert_eq!(Chip::Mcp3004.channels(), 4);
        assert_eq!(Chip::Mcp3008.max_code(), 1023);
        assert_eq!(Chip::Mcp3202.max_code(), 4095);
    }

    #[test]
    fn test_command_words() {
        // Single-ended channel 5: start=1 SGL=1 D2=1 | D1=0 D0=1
        assert_eq!(
            command(Chip::Mcp3208, 5, InputMode::SingleEnded),
            [0b0000_0111, 0b0100_0000, 0]
        );
        assert_eq!(
            command(Chip::Mcp3208, 2, InputMode::Differential),
            [0b0000_0100, 0b1000_0000, 0]
        );
        assert_eq!(
            command(Chip::Mcp3008, 3, InputMode::SingleEnded),
            [0x01, 0b1011_0000, 0]
        );
        assert_eq!(
            command(Chip::Mcp3202, 1, InputMode::SingleEnded),
            [0x01, 0b1110_0000, 0]
        );
        assert_eq!(
            command(Chip::Mcp3002, 0, InputMode::Differential),
            [0x01, 0b0010_0000, 0]
        );
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(Chip::Mcp3208, &[0xFF, 0xFA, 0xBC]), 0xABC);
        assert_eq!(decode(Chip::Mcp3008, &[0xFF, 0xFE, 0x34]), 0x234);
        assert_eq!(decode(Chip::Mcp3002, &[0x00, 0x0F, 0xFC]), 0x3FF);
        assert_eq!(decode(Chip::Mcp3202, &[0x00, 0x07, 0xFF]), 0x7FF);
    }

    #[test]
    fn test_read_over_bitbang() {
        let sim = bench(&[0x00, 0x0A, 0xBC]);
        let spi = BitBangTransport::open(
            SharedPort::new(&sim),
            lines(),
            BusConfig::default(),
            SimDelay::default(),
        )
        .unwrap();
        let mut adc = Mcp320x::new(spi, Chip::Mcp3208, InputMode::SingleEnded);

        assert_eq!(adc.read(2), Ok(0xABC));
        let port = sim.borrow();
        let slave = port.slave(0).unwrap();
        assert_eq!(slave.received().as_slice(), &[0x06, 0x80, 0x00]);
        assert_eq!(slave.selections(), 1);
    }

    #[test]
    fn test_channel_out_of_range() {
        let sim = bench(&[]);
        let spi = BitBangTransport::open(
            SharedPort::new(&sim),
            lines(),
            BusConfig::default(),
            SimDelay::default(),
        )
        .unwrap();
        let mut adc = Mcp320x::new(spi, Chip::Mcp3004, InputMode::SingleEnded);
        sim.borrow_mut().clear_events();

        assert_eq!(
            adc.read(4),
            Err(Error::InvalidArgument(InvalidArgument::ChannelOutOfRange(4)))
        );
        assert_eq!(sim.borrow().toggle_count(), 0);
    }

    #[test]
    fn test_read_all() {
        let sim = bench(&[0x00, 0x01, 0x23]);
        let spi = BitBangTransport::open(
            SharedPort::new(&sim),
            lines(),
            BusConfig::default(),
            SimDelay::default(),
        )
        .unwrap();
        let mut adc = Mcp320x::new(spi, Chip::Mcp3202, InputMode::SingleEnded);
        let mut codes = [0u16; 4];
        adc.read_all(&mut codes).unwrap();

        // Only two channels exist; the rest is left alone
        assert_eq!(codes, [0x123, 0x123, 0, 0]);
        assert_eq!(sim.borrow().slave(0).unwrap().selections(), 2);
    }
}
