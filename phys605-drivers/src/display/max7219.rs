//! MAX7219 8-digit LED display controller
//!
//! Write-only SPI device: every command is one 16-bit frame, register
//! address in the high byte and data in the low byte, latched on the rising
//! edge of LOAD (chip select). Digit 0 is the rightmost digit.

use phys605_core::config::DisplayConfig;
use phys605_core::{Error, InvalidArgument, Result, Transport};
use phys605_hal::DelayNs;

/// Register addresses
pub mod reg {
    pub const NOOP: u8 = 0x00;
    /// Digit 0; digits 1-7 follow consecutively
    pub const DIGIT0: u8 = 0x01;
    pub const DECODE_MODE: u8 = 0x09;
    pub const INTENSITY: u8 = 0x0A;
    pub const SCAN_LIMIT: u8 = 0x0B;
    pub const SHUTDOWN: u8 = 0x0C;
    pub const DISPLAY_TEST: u8 = 0x0F;
}

/// Code B font values (decode mode)
pub mod code {
    pub const DASH: u8 = 0x0A;
    pub const E: u8 = 0x0B;
    pub const H: u8 = 0x0C;
    pub const L: u8 = 0x0D;
    pub const P: u8 = 0x0E;
    pub const BLANK: u8 = 0x0F;
    /// Decimal point, OR-ed onto any digit
    pub const DP: u8 = 0x80;
}

/// Digits one controller drives
pub const MAX_DIGITS: u8 = 8;

/// Highest intensity step
pub const MAX_BRIGHTNESS: u8 = 0x0F;

/// Intensity after power-up
pub const DEFAULT_BRIGHTNESS: u8 = 0x0B;

/// How long every segment stays lit during the start-up lamp test
pub const LAMP_TEST_MS: u32 = 500;

/// How digit register values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeMode {
    /// Segment bit patterns (DP A B C D E F G, MSB first)
    Raw,
    /// Code B font on every digit
    CodeB,
}

impl DecodeMode {
    const fn register_value(self) -> u8 {
        match self {
            DecodeMode::Raw => 0x00,
            DecodeMode::CodeB => 0xFF,
        }
    }

    const fn blank(self) -> u8 {
        match self {
            DecodeMode::Raw => 0x00,
            DecodeMode::CodeB => code::BLANK,
        }
    }
}

/// Code B digits for an integer, rightmost digit first
///
/// Unused leading digits are blank; a negative number puts the minus sign
/// in front of its most significant digit. Values that do not fit show a
/// dash on every digit.
pub fn encode_int(value: i32, digits: u8) -> [u8; MAX_DIGITS as usize] {
    let digits = usize::from(digits.min(MAX_DIGITS));
    let mut codes = [code::BLANK; MAX_DIGITS as usize];
    let limit = 10i64.pow(digits as u32);
    let value = i64::from(value);

    // One digit goes to the sign when negative
    if value >= limit || value <= -(limit / 10) {
        codes[..digits].fill(code::DASH);
        return codes;
    }

    let mut sign_pending = value < 0;
    let mut rest = value.unsigned_abs();
    for (i, slot) in codes[..digits].iter_mut().enumerate() {
        let digit = (rest % 10) as u8;
        rest /= 10;
        *slot = if digit != 0 || rest != 0 || i == 0 {
            digit
        } else if sign_pending {
            sign_pending = false;
            code::DASH
        } else {
            code::BLANK
        };
    }
    codes
}

/// MAX7219 driver over any SPI transport
pub struct Max7219<T: Transport> {
    transport: T,
    digits: u8,
    decode: DecodeMode,
}

impl<T: Transport> Max7219<T> {
    /// Driver for a display with `digits` digits wired (1-8)
    ///
    /// Nothing is sent until [`Max7219::init`].
    pub fn new(transport: T, digits: u8) -> Result<Self> {
        if digits == 0 || digits > MAX_DIGITS {
            return Err(Error::InvalidArgument(InvalidArgument::WidthOutOfRange(
                digits,
            )));
        }
        Ok(Self {
            transport,
            digits,
            decode: DecodeMode::CodeB,
        })
    }

    /// Driver for the display section of a bench description
    pub fn from_config(transport: T, config: &DisplayConfig) -> Result<Self> {
        Self::new(transport, config.digits)
    }

    /// Digits wired
    pub fn digits(&self) -> u8 {
        self.digits
    }

    /// Current decode mode
    pub fn decode_mode(&self) -> DecodeMode {
        self.decode
    }

    /// Power-up sequence
    ///
    /// Lamp test for [`LAMP_TEST_MS`], scan limit to the wired digits,
    /// intensity, leave shutdown, Code B decoding, then blank every digit.
    pub fn init(&mut self, delay: &mut impl DelayNs, brightness: u8) -> Result<()> {
        self.display_test(true)?;
        delay.delay_ms(LAMP_TEST_MS);
        self.display_test(false)?;
        self.write_register(reg::SCAN_LIMIT, self.digits - 1)?;
        self.set_brightness(brightness)?;
        self.wake()?;
        self.set_decode_mode(DecodeMode::CodeB)?;
        self.clear()?;

        #[cfg(feature = "defmt")]
        defmt::debug!("max7219 ready: {} digits", self.digits);

        Ok(())
    }

    /// Send one register frame
    pub fn write_register(&mut self, register: u8, data: u8) -> Result<()> {
        self.transport.write(&[register, data])
    }

    /// Set the intensity (0-15, higher bits ignored)
    pub fn set_brightness(&mut self, level: u8) -> Result<()> {
        self.write_register(reg::INTENSITY, level & MAX_BRIGHTNESS)
    }

    /// Switch decoding for every digit
    pub fn set_decode_mode(&mut self, mode: DecodeMode) -> Result<()> {
        self.write_register(reg::DECODE_MODE, mode.register_value())?;
        self.decode = mode;
        Ok(())
    }

    /// Write one digit register
    ///
    /// `value` is a [`code`] value in Code B mode or a segment pattern in
    /// raw mode.
    pub fn set_digit(&mut self, position: u8, value: u8) -> Result<()> {
        if position >= self.digits {
            return Err(Error::InvalidArgument(InvalidArgument::ChannelOutOfRange(
                position,
            )));
        }
        self.write_register(reg::DIGIT0 + position, value)
    }

    /// Blank every wired digit
    pub fn clear(&mut self) -> Result<()> {
        let blank = self.decode.blank();
        for position in 0..self.digits {
            self.set_digit(position, blank)?;
        }
        Ok(())
    }

    /// Show a right-aligned integer
    ///
    /// Switches to Code B decoding if needed. Values that do not fit in
    /// the wired digits show dashes.
    pub fn write_int(&mut self, value: i32) -> Result<()> {
        if self.decode != DecodeMode::CodeB {
            self.set_decode_mode(DecodeMode::CodeB)?;
        }
        let codes = encode_int(value, self.digits);
        for (position, &code) in (0..self.digits).zip(codes.iter()) {
            self.set_digit(position, code)?;
        }
        Ok(())
    }

    /// Blank the display, keeping register contents
    pub fn shutdown(&mut self) -> Result<()> {
        self.write_register(reg::SHUTDOWN, 0)
    }

    /// Leave shutdown
    pub fn wake(&mut self) -> Result<()> {
        self.write_register(reg::SHUTDOWN, 1)
    }

    /// Light every segment regardless of the digit registers
    pub fn display_test(&mut self, on: bool) -> Result<()> {
        self.write_register(reg::DISPLAY_TEST, u8::from(on))
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
    use phys605_core::BitBangTransport;
    use phys605_hal::{LineId, SharedPort};
    use proptest::prelude::*;

    const DIN: LineId = LineId(19);
    const CLK: LineId = LineId(18);
    const LOAD: LineId = LineId(17);

    fn config(digits: u8) -> DisplayConfig {
        DisplayConfig {
            data: DIN,
            clock: CLK,
            chip_select: LOAD,
            digits,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }

    fn bench() -> RefCell<SimPort> {
        let slave = SlaveModel::new(CLK, DIN, None, LOAD);
        RefCell::new(SimPort::new().with_device(SimDevice::Slave(slave)))
    }

    type SimDisplay<'a> = Max7219<BitBangTransport<SharedPort<'a, SimPort>, SimDelay>>;

    fn open(sim: &RefCell<SimPort>, digits: u8) -> SimDisplay<'_> {
        let config = config(digits);
        let spi = BitBangTransport::open(
            SharedPort::new(sim),
            config.lines(),
            BusConfig::default(),
            SimDelay::default(),
        )
        .unwrap();
        Max7219::from_config(spi, &config).unwrap()
    }

    fn frames(sim: &RefCell<SimPort>) -> std::vec::Vec<(u8, u8)> {
        let port = sim.borrow();
        let bytes = port.slave(0).unwrap().received();
        bytes.chunks_exact(2).map(|f| (f[0], f[1])).collect()
    }

    #[test]
    fn test_encode_int() {
        use code::{BLANK, DASH};
        assert_eq!(encode_int(0, 4)[..4], [0, BLANK, BLANK, BLANK]);
        assert_eq!(encode_int(105, 4)[..4], [5, 0, 1, BLANK]);
        assert_eq!(encode_int(-42, 4)[..4], [2, 4, DASH, BLANK]);
        assert_eq!(encode_int(-999, 4)[..4], [9, 9, 9, DASH]);
        assert_eq!(encode_int(9999, 4)[..4], [9, 9, 9, 9]);
        assert_eq!(encode_int(10_000, 4)[..4], [DASH; 4]);
        assert_eq!(encode_int(-1000, 4)[..4], [DASH; 4]);
        assert_eq!(encode_int(99_999_999, 8), [9; 8]);
        assert_eq!(encode_int(-9_999_999, 8)[7], DASH);
        assert_eq!(encode_int(i32::MIN, 8), [DASH; 8]);
        assert_eq!(encode_int(-1, 1), [DASH, BLANK, BLANK, BLANK, BLANK, BLANK, BLANK, BLANK]);
    }

    #[test]
    fn test_digit_count_checked() {
        let sim = bench();
        let spi = BitBangTransport::open(
            SharedPort::new(&sim),
            config(8).lines(),
            BusConfig::default(),
            SimDelay::default(),
        )
        .unwrap();
        assert!(Max7219::new(spi, 9).is_err());
    }

    #[test]
    fn test_init_sequence() {
        let sim = bench();
        let mut display = open(&sim, 4);
        let mut delay = SimDelay::default();
        display.init(&mut delay, 0x1B).unwrap();

        assert_eq!(delay.total_ns, u64::from(LAMP_TEST_MS) * 1_000_000);
        assert_eq!(
            frames(&sim),
            [
                (reg::DISPLAY_TEST, 1),
                (reg::DISPLAY_TEST, 0),
                (reg::SCAN_LIMIT, 3),
                (reg::INTENSITY, 0x0B),
                (reg::SHUTDOWN, 1),
                (reg::DECODE_MODE, 0xFF),
                (0x01, code::BLANK),
                (0x02, code::BLANK),
                (0x03, code::BLANK),
                (0x04, code::BLANK),
            ]
        );
        // One LOAD pulse per frame
        assert_eq!(sim.borrow().slave(0).unwrap().selections(), 10);
    }

    #[test]
    fn test_write_int_switches_to_code_b() {
        let sim = bench();
        let mut display = open(&sim, 3);
        display.set_decode_mode(DecodeMode::Raw).unwrap();
        display.clear().unwrap();
        display.write_int(-7).unwrap();

        assert_eq!(display.decode_mode(), DecodeMode::CodeB);
        assert_eq!(
            frames(&sim),
            [
                (reg::DECODE_MODE, 0x00),
                (0x01, 0x00),
                (0x02, 0x00),
                (0x03, 0x00),
                (reg::DECODE_MODE, 0xFF),
                (0x01, 7),
                (0x02, code::DASH),
                (0x03, code::BLANK),
            ]
        );
    }

    #[test]
    fn test_set_digit_bounds() {
        let sim = bench();
        let mut display = open(&sim, 2);
        display.set_digit(1, 5 | code::DP).unwrap();
        assert_eq!(
            display.set_digit(2, 0),
            Err(Error::InvalidArgument(InvalidArgument::ChannelOutOfRange(2)))
        );
        assert_eq!(frames(&sim), [(0x02, 0x85)]);
    }

    #[test]
    fn test_shutdown_and_wake() {
        let sim = bench();
        let mut display = open(&sim, 8);
        display.shutdown().unwrap();
        display.wake().unwrap();
        assert_eq!(frames(&sim), [(reg::SHUTDOWN, 0), (reg::SHUTDOWN, 1)]);
    }

    proptest! {
        #[test]
        fn test_encode_int_shape(value in any::<i32>(), digits in 1u8..=8) {
            let codes = encode_int(value, digits);
            let used = &codes[..usize::from(digits)];
            prop_assert!(codes[usize::from(digits)..].iter().all(|&c| c == code::BLANK));
            prop_assert!(used.iter().all(|&c| c <= 9 || c == code::DASH || c == code::BLANK));
            // Digit 0 is never blank
            prop_assert!(used[0] != code::BLANK);
            let dashes = used.iter().filter(|&&c| c == code::DASH).count();
            prop_assert!(dashes <= 1 || dashes == used.len());
        }
    }
}
