//! SPI bus abstractions
//!
//! Clock mode and bit order types shared by the software and hardware
//! transports, plus the trait a chip HAL implements for its SPI controller.

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    /// All four modes, in numeric order
    pub const ALL: [Mode; 4] = [Mode::Mode0, Mode::Mode1, Mode::Mode2, Mode::Mode3];

    /// Mode from its conventional number (0-3)
    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Mode::Mode0),
            1 => Some(Mode::Mode1),
            2 => Some(Mode::Mode2),
            3 => Some(Mode::Mode3),
            _ => None,
        }
    }

    /// Conventional mode number (0-3)
    pub const fn number(self) -> u8 {
        match self {
            Mode::Mode0 => 0,
            Mode::Mode1 => 1,
            Mode::Mode2 => 2,
            Mode::Mode3 => 3,
        }
    }

    /// Clock rests high between transfers (modes 2 and 3)
    pub const fn clock_idle_high(self) -> bool {
        matches!(self, Mode::Mode2 | Mode::Mode3)
    }

    /// Data is sampled when the clock returns to idle (modes 1 and 3)
    pub const fn sample_on_trailing_edge(self) -> bool {
        matches!(self, Mode::Mode1 | Mode::Mode3)
    }

    /// Clock polarity of this mode
    pub const fn polarity(self) -> Polarity {
        if self.clock_idle_high() {
            Polarity::IdleHigh
        } else {
            Polarity::IdleLow
        }
    }

    /// Clock phase of this mode
    pub const fn phase(self) -> Phase {
        if self.sample_on_trailing_edge() {
            Phase::CaptureOnSecondTransition
        } else {
            Phase::CaptureOnFirstTransition
        }
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        (mode.polarity(), mode.phase())
    }
}

impl From<(Polarity, Phase)> for Mode {
    fn from((polarity, phase): (Polarity, Phase)) -> Self {
        match (polarity, phase) {
            (Polarity::IdleLow, Phase::CaptureOnFirstTransition) => Mode::Mode0,
            (Polarity::IdleLow, Phase::CaptureOnSecondTransition) => Mode::Mode1,
            (Polarity::IdleHigh, Phase::CaptureOnFirstTransition) => Mode::Mode2,
            (Polarity::IdleHigh, Phase::CaptureOnSecondTransition) => Mode::Mode3,
        }
    }
}

/// Order in which the bits of a word go over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// SPI controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity
    pub polarity: Polarity,
    /// Clock phase
    pub phase: Phase,
    /// Bit order on the wire
    pub bit_order: BitOrder,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::new(Mode::Mode0, 1_000_000) // 1 MHz
    }
}

impl SpiConfig {
    /// Configuration for a mode and clock frequency, MSB first
    pub const fn new(mode: Mode, frequency: u32) -> Self {
        Self {
            frequency,
            polarity: mode.polarity(),
            phase: mode.phase(),
            bit_order: BitOrder::MsbFirst,
        }
    }

    /// Combined SPI mode
    pub fn mode(&self) -> Mode {
        Mode::from((self.polarity, self.phase))
    }
}

/// SPI bus master backed by a hardware controller
///
/// The controller owns clock and data lines. Chip select may be handled by
/// the controller or driven separately by the caller.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Transfer data (simultaneous read/write)
    ///
    /// Writes data from `write` buffer while reading into `read` buffer.
    /// Both buffers must be the same length.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error>;

    /// Write data without reading
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data (writes zeros)
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Transfer data in place
    ///
    /// Writes data from buffer while reading into the same buffer.
    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Apply clock mode, frequency and bit order
    fn set_config(&mut self, config: &SpiConfig) -> Result<(), Self::Error>;

    /// Highest clock frequency the controller can produce
    fn max_frequency_hz(&self) -> u32;

    /// Check if the controller can run in the given mode
    fn supports_mode(&self, _mode: Mode) -> bool {
        true
    }

    /// Check if the controller can shift LSB first natively
    fn supports_lsb_first(&self) -> bool {
        false
    }
}
