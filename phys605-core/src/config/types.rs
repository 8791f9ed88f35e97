//! Configuration type definitions
//!
//! Bus settings used by the engines at runtime, and the bench description
//! that wires buses and chips to board lines.

use heapless::String;
use phys605_hal::{BitOrder, LineId, Mode};

use crate::line::{ChipSelect, Lines};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum chip name length
pub const MAX_CHIP_NAME_LEN: usize = 16;

/// Bus timing and framing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// SPI clock mode
    pub mode: Mode,
    /// Bit order on the wire
    pub bit_order: BitOrder,
    /// Clock rate ceiling in Hz (`None` = as fast as the transport goes)
    pub max_rate_hz: Option<u32>,
    /// Byte clocked out on data out while only reading
    pub fill_byte: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Mode0,
            bit_order: BitOrder::MsbFirst,
            max_rate_hz: None,
            fill_byte: 0x00,
        }
    }
}

impl BusConfig {
    /// Settings for a mode, MSB first, unlimited rate
    pub const fn new(mode: Mode) -> Self {
        Self {
            mode,
            bit_order: BitOrder::MsbFirst,
            max_rate_hz: None,
            fill_byte: 0x00,
        }
    }

    /// Set the bit order
    pub const fn with_bit_order(mut self, bit_order: BitOrder) -> Self {
        self.bit_order = bit_order;
        self
    }

    /// Set the clock rate ceiling
    pub const fn with_max_rate(mut self, hz: u32) -> Self {
        self.max_rate_hz = Some(hz);
        self
    }

    /// Set the placeholder byte for read-only transfers
    pub const fn with_fill_byte(mut self, fill_byte: u8) -> Self {
        self.fill_byte = fill_byte;
        self
    }
}

/// Which transport drives an SPI bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransportKind {
    /// Software-timed GPIO toggling
    #[default]
    BitBang,
    /// The board's SPI controller
    Hardware,
}

/// SPI bus section of a bench description
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiBusConfig {
    /// Transport variant
    pub transport: TransportKind,
    /// Clock line (ignored by the hardware transport)
    pub clock: LineId,
    /// Data out line
    pub data_out: Option<LineId>,
    /// Data in line (may equal `data_out` for a shared data pin)
    pub data_in: Option<LineId>,
    /// Chip select line
    pub chip_select: Option<ChipSelect>,
    /// Timing and framing
    pub bus: BusConfig,
}

impl SpiBusConfig {
    /// Line assignment for the bit-bang transport
    pub fn lines(&self) -> Lines {
        Lines {
            clock: self.clock,
            data_out: self.data_out,
            data_in: self.data_in,
            chip_select: self.chip_select,
        }
    }
}

/// ADC section of a bench description
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdcConfig {
    /// Chip part number, e.g. "MCP3208"
    pub chip: String<MAX_CHIP_NAME_LEN>,
    /// Single-ended (true) or differential (false) inputs
    pub single_ended: bool,
    /// Channel sampled by the bench
    pub channel: u8,
}

/// PISO shift register section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShiftInConfig {
    /// Serial output of the chip (Q_H)
    pub data: LineId,
    /// Shift clock
    pub clock: LineId,
    /// SH/LD-bar
    pub load: LineId,
    /// Bits per read (8 per chained chip)
    pub width: u8,
    /// Order of the bits coming out
    pub bit_order: BitOrder,
}

/// SIPO shift register section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShiftOutConfig {
    /// Serial input of the chip (SER)
    pub data: LineId,
    /// Shift clock (SRCLK)
    pub clock: LineId,
    /// Storage register clock (RCLK)
    pub latch: LineId,
    /// SRCLR-bar, if wired
    pub clear: Option<LineId>,
    /// Bits per write (8 per chained chip)
    pub width: u8,
}

/// LED display section (write-only SPI device)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayConfig {
    /// DIN
    pub data: LineId,
    /// CLK
    pub clock: LineId,
    /// LOAD / CS-bar
    pub chip_select: LineId,
    /// Digits wired (1-8)
    pub digits: u8,
    /// Intensity 0-15
    pub brightness: u8,
}

impl DisplayConfig {
    /// Line assignment (write-only, active-low select)
    pub fn lines(&self) -> Lines {
        Lines::new(self.clock)
            .with_data_out(self.data)
            .with_chip_select(self.chip_select)
    }
}

/// Complete bench description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BenchConfig {
    /// SPI bus for the ADC
    pub spi: Option<SpiBusConfig>,
    /// ADC on that bus
    pub adc: Option<AdcConfig>,
    /// Input shift register
    pub shift_in: Option<ShiftInConfig>,
    /// Output shift register
    pub shift_out: Option<ShiftOutConfig>,
    /// LED display
    pub display: Option<DisplayConfig>,
}
