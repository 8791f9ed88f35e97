//! Line roles
//!
//! A bus is a handful of logical roles (clock, data out, data in, chip
//! select), each bound to a board line or left unused.

use heapless::Vec;
use phys605_hal::{GpioPort, Level, LineId};

use crate::error::{InvalidArgument, Result};

/// Most distinct lines any single engine owns
pub const MAX_LINES: usize = 4;

/// Chip select line and its active level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChipSelect {
    /// Board line
    pub line: LineId,
    /// Level that selects the chip (almost always low)
    pub active_high: bool,
}

impl ChipSelect {
    /// Active-low chip select (CS-bar)
    pub const fn active_low(line: LineId) -> Self {
        Self {
            line,
            active_high: false,
        }
    }

    /// Active-high chip select
    pub const fn active_high(line: LineId) -> Self {
        Self {
            line,
            active_high: true,
        }
    }

    /// Level that selects the chip
    pub fn active_level(&self) -> Level {
        Level::from(self.active_high)
    }

    /// Level that releases the chip
    pub fn inactive_level(&self) -> Level {
        !self.active_level()
    }
}

/// Line assignment of an SPI bus
///
/// `data_out` and `data_in` may name the same line for chips with a single
/// bidirectional data pin; see [`Lines::shares_data_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lines {
    /// Clock (SCK)
    pub clock: LineId,
    /// Master out (MOSI / SDI of the chip)
    pub data_out: Option<LineId>,
    /// Master in (MISO / SDO of the chip)
    pub data_in: Option<LineId>,
    /// Chip select, if the bus frames transfers
    pub chip_select: Option<ChipSelect>,
}

impl Lines {
    /// Bus with only a clock assigned
    pub const fn new(clock: LineId) -> Self {
        Self {
            clock,
            data_out: None,
            data_in: None,
            chip_select: None,
        }
    }

    /// Assign the data out line
    pub const fn with_data_out(mut self, line: LineId) -> Self {
        self.data_out = Some(line);
        self
    }

    /// Assign the data in line
    pub const fn with_data_in(mut self, line: LineId) -> Self {
        self.data_in = Some(line);
        self
    }

    /// Assign one bidirectional data line to both directions
    pub const fn with_shared_data(mut self, line: LineId) -> Self {
        self.data_out = Some(line);
        self.data_in = Some(line);
        self
    }

    /// Assign an active-low chip select
    pub const fn with_chip_select(mut self, line: LineId) -> Self {
        self.chip_select = Some(ChipSelect::active_low(line));
        self
    }

    /// Assign a chip select with explicit polarity
    pub const fn with_chip_select_config(mut self, chip_select: ChipSelect) -> Self {
        self.chip_select = Some(chip_select);
        self
    }

    /// Check if data out and data in are one physical line
    pub fn shares_data_line(&self) -> bool {
        matches!((self.data_out, self.data_in), (Some(o), Some(i)) if o == i)
    }

    /// Distinct lines in use, validated against double assignment
    pub fn distinct(&self) -> Result<Vec<LineId, MAX_LINES>> {
        let mut ids: Vec<LineId, MAX_LINES> = Vec::new();
        let roles = [
            Some(self.clock),
            self.data_out,
            if self.shares_data_line() {
                None
            } else {
                self.data_in
            },
            self.chip_select.map(|cs| cs.line),
        ];
        for id in roles.into_iter().flatten() {
            push_distinct(&mut ids, id)?;
        }
        Ok(ids)
    }
}

/// Append a line, rejecting a duplicate
pub(crate) fn push_distinct<const N: usize>(ids: &mut Vec<LineId, N>, id: LineId) -> Result<()> {
    if ids.contains(&id) {
        return Err(InvalidArgument::LineConflict(id).into());
    }
    // Callers size N for every role they own
    let _ = ids.push(id);
    Ok(())
}

/// Claim every line, rolling back on the first failure
pub(crate) fn claim_all<P: GpioPort>(port: &mut P, lines: &[LineId]) -> Result<()> {
    for (i, &line) in lines.iter().enumerate() {
        if let Err(e) = port.claim(line) {
            for &held in &lines[..i] {
                port.release(held);
            }
            return Err(e.into());
        }
    }
    Ok(())
}

/// Release every line
pub(crate) fn release_all<P: GpioPort>(port: &mut P, lines: &[LineId]) {
    for &line in lines {
        port.release(line);
    }
}
