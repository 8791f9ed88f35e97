//! MCP4xxx digital potentiometers (257 taps, volatile wipers)
//!
//! Every command starts with one byte: 4 address bits, 2 command bits and
//! two data bits. The chip answers the second-to-last of those bits with
//! CMDERR, high when the command was accepted. Writes and reads carry a
//! further 8 data bits; increment and decrement are complete after the
//! first byte.
//!
//! Two transports are covered:
//!
//! - MCP4251 (two wipers) with separate SDI/SDO, over any byte transport
//! - MCP4161 (one wiper) with a single SDI/SDO pin, over the bit-level
//!   primitives of the software engine

use phys605_core::{BitBangTransport, Error, Framing, InvalidArgument, TransferRequest, Transport};
use phys605_hal::{DelayNs, GpioPort};

/// Memory map addresses
pub mod reg {
    pub const WIPER0: u8 = 0x00;
    pub const WIPER1: u8 = 0x01;
    pub const TCON: u8 = 0x04;
    pub const STATUS: u8 = 0x05;
}

/// CMDERR bit in the first response byte
pub const CMDERR: u8 = 0b10;

/// Wiper value for terminal A
pub const FULL_SCALE: u16 = 256;

/// Wiper value after power-on reset
pub const MID_SCALE: u16 = 128;

/// TCON value with every terminal connected and general call enabled
pub const TCON_DEFAULT: u16 = 0x1FF;

/// Data bits sent while the chip is driving the line
const RELEASED: u16 = 0x1FF;

/// Highest clock rate for MCP4161 reads over the shared pin
pub const MCP4161_READ_RATE_HZ: u32 = 250_000;

/// Highest clock rate for MCP4161 writes
pub const MCP4161_WRITE_RATE_HZ: u32 = 5_000_000;

/// Highest clock rate for the MCP4251
pub const MCP4251_RATE_HZ: u32 = 10_000_000;

/// Command bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Write = 0b00,
    Increment = 0b01,
    Decrement = 0b10,
    Read = 0b11,
}

impl Command {
    /// Commands that carry a data byte after the command byte
    pub const fn is_16_bit(self) -> bool {
        matches!(self, Command::Write | Command::Read)
    }
}

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mcp4x51Error {
    /// The transport failed
    Bus(Error),
    /// CMDERR came back low
    CommandRejected,
    /// Wiper value above full scale
    ValueOutOfRange(u16),
}

impl From<Error> for Mcp4x51Error {
    fn from(e: Error) -> Self {
        Mcp4x51Error::Bus(e)
    }
}

impl From<InvalidArgument> for Mcp4x51Error {
    fn from(e: InvalidArgument) -> Self {
        Mcp4x51Error::Bus(Error::InvalidArgument(e))
    }
}

/// Result alias for potentiometer operations
pub type Result<T> = core::result::Result<T, Mcp4x51Error>;

/// Wiper selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wiper {
    W0,
    W1,
}

impl Wiper {
    /// Volatile wiper register
    pub const fn address(self) -> u8 {
        match self {
            Wiper::W0 => reg::WIPER0,
            Wiper::W1 => reg::WIPER1,
        }
    }

    const fn index(self) -> u8 {
        match self {
            Wiper::W0 => 0,
            Wiper::W1 => 1,
        }
    }

    /// Position of this wiper's nibble in TCON
    const fn tcon_shift(self) -> u16 {
        match self {
            Wiper::W0 => 0,
            Wiper::W1 => 4,
        }
    }
}

/// Resistor network connections controlled by TCON
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Terminal {
    B,
    W,
    A,
    /// Hardware shutdown override (R0HW / R1HW), set = normal operation
    Shutdown,
}

impl Terminal {
    const fn bit(self) -> u16 {
        match self {
            Terminal::B => 0b0001,
            Terminal::W => 0b0010,
            Terminal::A => 0b0100,
            Terminal::Shutdown => 0b1000,
        }
    }
}

/// First byte of a command
///
/// The low two bits carry data bits 9 and 8. Bit 9 shares its slot with
/// CMDERR and is always sent high so the chip can pull it down.
pub const fn command_byte(address: u8, command: Command, data: u16) -> u8 {
    ((address & 0x0F) << 4) | ((command as u8) << 2) | CMDERR | ((data >> 8) & 1) as u8
}

/// Exchange of one command with the chip
///
/// Returns the 9-bit data word the chip sent back (0 for increment and
/// decrement).
pub trait CommandLink {
    fn execute(&mut self, address: u8, command: Command, data: u16) -> Result<u16>;
}

/// Byte-oriented link for chips with separate SDI and SDO
pub struct SpiLink<T: Transport> {
    transport: T,
}

impl<T: Transport> CommandLink for SpiLink<T> {
    fn execute(&mut self, address: u8, command: Command, data: u16) -> Result<u16> {
        let first = command_byte(address, command, data);
        let mut rx = [0u8; 2];
        if command.is_16_bit() {
            self.transport
                .transfer(TransferRequest::new(&[first, data as u8], &mut rx))?;
        } else {
            self.transport
                .transfer(TransferRequest::new(&[first], &mut rx[..1]))?;
        }

        if rx[0] & CMDERR == 0 {
            return Err(Mcp4x51Error::CommandRejected);
        }
        if !command.is_16_bit() {
            return Ok(0);
        }
        Ok((u16::from(rx[0] & 1) << 8) | u16::from(rx[1]))
    }
}

/// Bit-level link for chips with one shared SDI/SDO pin
///
/// The command bits go out, the line turns around for the CMDERR bit, and
/// then the data bits either go out again or are read back, all inside one
/// chip select.
pub struct BitLink<P: GpioPort, D: DelayNs> {
    transport: BitBangTransport<P, D>,
}

impl<P: GpioPort, D: DelayNs> CommandLink for BitLink<P, D> {
    fn execute(&mut self, address: u8, command: Command, data: u16) -> Result<u16> {
        let t = &mut self.transport;
        let head = (u32::from(address & 0x0F) << 2) | command as u32;
        t.write_bits(head, 6, Framing::BEGIN)?;
        let accepted = t.read_bits(1, Framing::CONTINUE)? != 0;
        let value = match command {
            Command::Write => {
                t.write_bits(u32::from(data & 0x1FF), 9, Framing::END)?;
                data & 0x1FF
            }
            Command::Read => t.read_bits(9, Framing::END)? as u16,
            Command::Increment | Command::Decrement => {
                t.read_bits(1, Framing::END)?;
                0
            }
        };

        if !accepted {
            return Err(Mcp4x51Error::CommandRejected);
        }
        Ok(value)
    }
}

/// MCP4251 on a byte transport
pub type Mcp4251<T> = Mcp4x51<SpiLink<T>>;

/// MCP4161 on the software engine's shared data line
pub type Mcp4161<P, D> = Mcp4x51<BitLink<P, D>>;

/// Potentiometer driver, generic over how commands reach the chip
pub struct Mcp4x51<L: CommandLink> {
    link: L,
    wipers: u8,
}

impl<T: Transport> Mcp4x51<SpiLink<T>> {
    /// Two-wiper MCP4251
    pub fn mcp4251(transport: T) -> Self {
        Self {
            link: SpiLink { transport },
            wipers: 2,
        }
    }
}

impl<P: GpioPort, D: DelayNs> Mcp4x51<BitLink<P, D>> {
    /// Single-wiper MCP4161; the transport must use a shared data line
    pub fn mcp4161(transport: BitBangTransport<P, D>) -> Self {
        Self {
            link: BitLink { transport },
            wipers: 1,
        }
    }
}

impl<L: CommandLink> Mcp4x51<L> {
    /// Driver over a custom link
    pub fn with_link(link: L, wipers: u8) -> Self {
        Self { link, wipers }
    }

    /// Wipers on this part
    pub fn wipers(&self) -> u8 {
        self.wipers
    }

    /// Move a wiper (0 = terminal B, 256 = terminal A)
    pub fn set_wiper(&mut self, wiper: Wiper, value: u16) -> Result<()> {
        self.check_wiper(wiper)?;
        if value > FULL_SCALE {
            return Err(Mcp4x51Error::ValueOutOfRange(value));
        }
        self.link.execute(wiper.address(), Command::Write, value)?;

        #[cfg(feature = "defmt")]
        defmt::trace!("wiper {} = {}", wiper, value);

        Ok(())
    }

    /// Read a wiper position back
    pub fn wiper(&mut self, wiper: Wiper) -> Result<u16> {
        self.check_wiper(wiper)?;
        self.link.execute(wiper.address(), Command::Read, RELEASED)
    }

    /// One step towards terminal A
    pub fn increment(&mut self, wiper: Wiper) -> Result<()> {
        self.check_wiper(wiper)?;
        self.link
            .execute(wiper.address(), Command::Increment, RELEASED)?;
        Ok(())
    }

    /// One step towards terminal B
    pub fn decrement(&mut self, wiper: Wiper) -> Result<()> {
        self.check_wiper(wiper)?;
        self.link
            .execute(wiper.address(), Command::Decrement, RELEASED)?;
        Ok(())
    }

    /// Terminal control register
    pub fn tcon(&mut self) -> Result<u16> {
        self.link.execute(reg::TCON, Command::Read, RELEASED)
    }

    /// Overwrite the terminal control register
    pub fn set_tcon(&mut self, value: u16) -> Result<()> {
        self.link
            .execute(reg::TCON, Command::Write, value & 0x1FF)?;
        Ok(())
    }

    /// Status register
    pub fn status(&mut self) -> Result<u16> {
        self.link.execute(reg::STATUS, Command::Read, RELEASED)
    }

    /// Connect or disconnect one terminal of a wiper's network
    pub fn set_terminal(
        &mut self,
        wiper: Wiper,
        terminal: Terminal,
        connected: bool,
    ) -> Result<()> {
        self.check_wiper(wiper)?;
        let bit = terminal.bit() << wiper.tcon_shift();
        let tcon = self.tcon()?;
        let tcon = if connected { tcon | bit } else { tcon & !bit };
        self.set_tcon(tcon)
    }

    /// Connect every terminal and centre every wiper
    pub fn reset(&mut self) -> Result<()> {
        self.set_tcon(TCON_DEFAULT)?;
        for wiper in [Wiper::W0, Wiper::W1].into_iter().take(usize::from(self.wipers)) {
            self.set_wiper(wiper, MID_SCALE)?;
        }
        Ok(())
    }

    /// Give the link back
    pub fn release(self) -> L {
        self.link
    }

    fn check_wiper(&self, wiper: Wiper) -> Result<()> {
        if wiper.index() >= self.wipers {
            return Err(InvalidArgument::ChannelOutOfRange(wiper.index()).into());
        }
        Ok(())
    }
}
