//! Simple TOML parser for bench descriptions
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! `bench.toml`. It does NOT support the full TOML grammar, and it needs no
//! allocator.
//!
//! Supported features:
//! - Key = value pairs (string, integer, boolean)
//! - Integers in decimal or `0x` hexadecimal
//! - Pins as integers (`11`) or strings (`"gpio11"`)
//! - [section] headers: `spi`, `adc`, `shift_in`, `shift_out`, `display`
//! - Comments (# ...)
//!
//! NOT supported:
//! - Multi-line strings
//! - Arrays and inline tables
//! - Dotted keys

use heapless::String as HString;
use phys605_hal::{BitOrder, LineId, Mode};

use super::types::{
    AdcConfig, BenchConfig, BusConfig, DisplayConfig, ShiftInConfig, ShiftOutConfig,
    SpiBusConfig, TransportKind, MAX_CHIP_NAME_LEN,
};
use crate::line::ChipSelect;

/// What went wrong while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseErrorKind {
    /// Unknown or malformed section header
    InvalidSection,
    /// Section appears twice
    DuplicateSection,
    /// Key not valid in this section
    UnknownKey,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// Line is neither a header nor `key = value`
    InvalidLine,
    /// Required key missing from a section
    MissingKey(&'static str),
}

/// Parse error with the 1-based line it was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseError {
    /// Line number (section header line for missing keys)
    pub line: usize,
    /// Error kind
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn at(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Spi,
    Adc,
    ShiftIn,
    ShiftOut,
    Display,
}

#[derive(Default)]
struct SpiDraft {
    transport: TransportKind,
    clock: Option<LineId>,
    data_out: Option<LineId>,
    data_in: Option<LineId>,
    chip_select: Option<LineId>,
    cs_active_high: bool,
    bus: BusConfig,
}

#[derive(Default)]
struct AdcDraft {
    chip: Option<HString<MAX_CHIP_NAME_LEN>>,
    single_ended: Option<bool>,
    channel: Option<u8>,
}

#[derive(Default)]
struct ShiftInDraft {
    data: Option<LineId>,
    clock: Option<LineId>,
    load: Option<LineId>,
    width: Option<u8>,
    bit_order: BitOrder,
}

#[derive(Default)]
struct ShiftOutDraft {
    data: Option<LineId>,
    clock: Option<LineId>,
    latch: Option<LineId>,
    clear: Option<LineId>,
    width: Option<u8>,
}

#[derive(Default)]
struct DisplayDraft {
    data: Option<LineId>,
    clock: Option<LineId>,
    chip_select: Option<LineId>,
    digits: Option<u8>,
    brightness: Option<u8>,
}

/// Section being built, with the line its header was on
enum Draft {
    None,
    Spi(usize, SpiDraft),
    Adc(usize, AdcDraft),
    ShiftIn(usize, ShiftInDraft),
    ShiftOut(usize, ShiftOutDraft),
    Display(usize, DisplayDraft),
}

/// Parse a bench description
pub fn parse_config(input: &str) -> Result<BenchConfig, ParseError> {
    let mut config = BenchConfig::default();
    let mut draft = Draft::None;

    for (index, line) in input.lines().enumerate() {
        let number = index + 1;
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Check for section header
        if line.starts_with('[') && line.ends_with(']') {
            finish(core::mem::replace(&mut draft, Draft::None), &mut config)?;

            let section = parse_section_header(&line[1..line.len() - 1])
                .ok_or(ParseError::at(number, ParseErrorKind::InvalidSection))?;
            if is_present(section, &config) {
                return Err(ParseError::at(number, ParseErrorKind::DuplicateSection));
            }
            draft = match section {
                Section::Spi => Draft::Spi(number, SpiDraft::default()),
                Section::Adc => Draft::Adc(number, AdcDraft::default()),
                Section::ShiftIn => Draft::ShiftIn(number, ShiftInDraft::default()),
                Section::ShiftOut => Draft::ShiftOut(number, ShiftOutDraft::default()),
                Section::Display => Draft::Display(number, DisplayDraft::default()),
                Section::Root => Draft::None,
            };
            continue;
        }

        let (key, value) =
            parse_key_value(line).ok_or(ParseError::at(number, ParseErrorKind::InvalidLine))?;
        apply_value(&mut draft, key, value).map_err(|kind| ParseError::at(number, kind))?;
    }

    // Save final section
    finish(draft, &mut config)?;

    Ok(config)
}

fn parse_section_header(header: &str) -> Option<Section> {
    match header.trim() {
        "spi" => Some(Section::Spi),
        "adc" => Some(Section::Adc),
        "shift_in" => Some(Section::ShiftIn),
        "shift_out" => Some(Section::ShiftOut),
        "display" => Some(Section::Display),
        _ => None,
    }
}

fn is_present(section: Section, config: &BenchConfig) -> bool {
    match section {
        Section::Spi => config.spi.is_some(),
        Section::Adc => config.adc.is_some(),
        Section::ShiftIn => config.shift_in.is_some(),
        Section::ShiftOut => config.shift_out.is_some(),
        Section::Display => config.display.is_some(),
        Section::Root => false,
    }
}

fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = if let Some(hash_pos) = value.find('#') {
        // Make sure # is not inside a string
        let quote_count = value[..hash_pos].matches('"').count();
        if quote_count % 2 == 0 {
            value[..hash_pos].trim()
        } else {
            value
        }
    } else {
        value
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

fn parse_string(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

fn parse_u32(value: &str) -> Result<u32, ParseErrorKind> {
    let value = strip_separators(value);
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ParseErrorKind::InvalidValue)
}

fn parse_u8(value: &str) -> Result<u8, ParseErrorKind> {
    u8::try_from(parse_u32(value)?).map_err(|_| ParseErrorKind::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ParseErrorKind> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseErrorKind::InvalidValue),
    }
}

/// Parse a pin given as `11`, `"11"` or `"gpio11"`
fn parse_pin(value: &str) -> Result<LineId, ParseErrorKind> {
    let s = parse_string(value).trim();
    let s = s.strip_prefix("gpio").unwrap_or(s);
    s.parse::<u8>()
        .map(LineId)
        .map_err(|_| ParseErrorKind::InvalidValue)
}

fn parse_mode(value: &str) -> Result<Mode, ParseErrorKind> {
    Mode::from_number(parse_u8(value)?).ok_or(ParseErrorKind::InvalidValue)
}

fn parse_bit_order(value: &str) -> Result<BitOrder, ParseErrorKind> {
    match parse_string(value) {
        "msb" | "msb_first" => Ok(BitOrder::MsbFirst),
        "lsb" | "lsb_first" => Ok(BitOrder::LsbFirst),
        _ => Err(ParseErrorKind::InvalidValue),
    }
}

fn parse_transport(value: &str) -> Result<TransportKind, ParseErrorKind> {
    match parse_string(value) {
        "bitbang" | "gpio" => Ok(TransportKind::BitBang),
        "hardware" | "spidev" => Ok(TransportKind::Hardware),
        _ => Err(ParseErrorKind::InvalidValue),
    }
}

fn parse_width(value: &str) -> Result<u8, ParseErrorKind> {
    let width = parse_u8(value)?;
    if width > crate::bits::MAX_WORD_BITS {
        return Err(ParseErrorKind::InvalidValue);
    }
    Ok(width)
}

/// Integer text with `_` digit separators removed
fn strip_separators(value: &str) -> HString<16> {
    let mut out = HString::new();
    for c in value.chars().filter(|&c| c != '_') {
        // Overlong input fails to parse as a number anyway
        if out.push(c).is_err() {
            out.clear();
            break;
        }
    }
    out
}

fn apply_value(draft: &mut Draft, key: &str, value: &str) -> Result<(), ParseErrorKind> {
    match draft {
        Draft::None => return Err(ParseErrorKind::UnknownKey),
        Draft::Spi(_, spi) => match key {
            "transport" => spi.transport = parse_transport(value)?,
            "clock" | "clk" => spi.clock = Some(parse_pin(value)?),
            "mosi" | "data_out" => spi.data_out = Some(parse_pin(value)?),
            "miso" | "data_in" => spi.data_in = Some(parse_pin(value)?),
            "cs" | "chip_select" => spi.chip_select = Some(parse_pin(value)?),
            "cs_active_high" => spi.cs_active_high = parse_bool(value)?,
            "mode" => spi.bus.mode = parse_mode(value)?,
            "bit_order" => spi.bus.bit_order = parse_bit_order(value)?,
            "max_rate_hz" => {
                let hz = parse_u32(value)?;
                if hz == 0 {
                    return Err(ParseErrorKind::InvalidValue);
                }
                spi.bus.max_rate_hz = Some(hz);
            }
            "fill_byte" => spi.bus.fill_byte = parse_u8(value)?,
            _ => return Err(ParseErrorKind::UnknownKey),
        },
        Draft::Adc(_, adc) => match key {
            "chip" => {
                let mut name = HString::new();
                name.push_str(parse_string(value))
                    .map_err(|_| ParseErrorKind::InvalidValue)?;
                adc.chip = Some(name);
            }
            "single_ended" => adc.single_ended = Some(parse_bool(value)?),
            "channel" => adc.channel = Some(parse_u8(value)?),
            _ => return Err(ParseErrorKind::UnknownKey),
        },
        Draft::ShiftIn(_, s) => match key {
            "data" | "serial_in" => s.data = Some(parse_pin(value)?),
            "clock" | "clk" => s.clock = Some(parse_pin(value)?),
            "load" => s.load = Some(parse_pin(value)?),
            "width" => s.width = Some(parse_width(value)?),
            "bit_order" => s.bit_order = parse_bit_order(value)?,
            _ => return Err(ParseErrorKind::UnknownKey),
        },
        Draft::ShiftOut(_, s) => match key {
            "data" | "serial_out" => s.data = Some(parse_pin(value)?),
            "clock" | "clk" => s.clock = Some(parse_pin(value)?),
            "latch" => s.latch = Some(parse_pin(value)?),
            "clear" => s.clear = Some(parse_pin(value)?),
            "width" => s.width = Some(parse_width(value)?),
            _ => return Err(ParseErrorKind::UnknownKey),
        },
        Draft::Display(_, d) => match key {
            "data" | "din" => d.data = Some(parse_pin(value)?),
            "clock" | "clk" => d.clock = Some(parse_pin(value)?),
            "cs" | "load" => d.chip_select = Some(parse_pin(value)?),
            "digits" => {
                let digits = parse_u8(value)?;
                if !(1..=8).contains(&digits) {
                    return Err(ParseErrorKind::InvalidValue);
                }
                d.digits = Some(digits);
            }
            "brightness" => {
                let brightness = parse_u8(value)?;
                if brightness > 15 {
                    return Err(ParseErrorKind::InvalidValue);
                }
                d.brightness = Some(brightness);
            }
            _ => return Err(ParseErrorKind::UnknownKey),
        },
    }
    Ok(())
}

fn require<T>(value: Option<T>, line: usize, key: &'static str) -> Result<T, ParseError> {
    value.ok_or(ParseError::at(line, ParseErrorKind::MissingKey(key)))
}

/// Validate a finished section and store it
fn finish(draft: Draft, config: &mut BenchConfig) -> Result<(), ParseError> {
    match draft {
        Draft::None => {}
        Draft::Spi(line, spi) => {
            // The hardware controller owns its clock pin
            let clock = match spi.transport {
                TransportKind::BitBang => require(spi.clock, line, "clock")?,
                TransportKind::Hardware => spi.clock.unwrap_or(LineId(0)),
            };
            let chip_select = spi.chip_select.map(|cs| {
                if spi.cs_active_high {
                    ChipSelect::active_high(cs)
                } else {
                    ChipSelect::active_low(cs)
                }
            });
            config.spi = Some(SpiBusConfig {
                transport: spi.transport,
                clock,
                data_out: spi.data_out,
                data_in: spi.data_in,
                chip_select,
                bus: spi.bus,
            });
        }
        Draft::Adc(line, adc) => {
            config.adc = Some(AdcConfig {
                chip: require(adc.chip, line, "chip")?,
                single_ended: adc.single_ended.unwrap_or(true),
                channel: adc.channel.unwrap_or(0),
            });
        }
        Draft::ShiftIn(line, s) => {
            config.shift_in = Some(ShiftInConfig {
                data: require(s.data, line, "data")?,
                clock: require(s.clock, line, "clock")?,
                load: require(s.load, line, "load")?,
                width: s.width.unwrap_or(8),
                bit_order: s.bit_order,
            });
        }
        Draft::ShiftOut(line, s) => {
            config.shift_out = Some(ShiftOutConfig {
                data: require(s.data, line, "data")?,
                clock: require(s.clock, line, "clock")?,
                latch: require(s.latch, line, "latch")?,
                clear: s.clear,
                width: s.width.unwrap_or(8),
            });
        }
        Draft::Display(line, d) => {
            config.display = Some(DisplayConfig {
                data: require(d.data, line, "data")?,
                clock: require(d.clock, line, "clock")?,
                chip_select: require(d.chip_select, line, "cs")?,
                digits: d.digits.unwrap_or(8),
                brightness: d.brightness.unwrap_or(0x0B),
            });
        }
    }
    Ok(())
}
