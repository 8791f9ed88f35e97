//! Simulated pin bank for host testing
//!
//! [`SimPort`] implements [`GpioPort`] over 32 virtual lines, records every
//! set, read and configure call, and lets device models react to edges:
//!
//! - [`SimDevice::Loopback`]: a wire from one line to another
//! - [`PisoModel`]: a 74HC165 style parallel-in serial-out chain
//! - [`SipoModel`]: a 74HC595 style serial-in parallel-out chain
//! - [`SlaveModel`]: a scripted mode-0 SPI peripheral
//!
//! A line the board configures as output always reads back its own level.
//! An input line reads whatever a device drives onto it, else the level set
//! with [`SimPort::set_input`], else the last level it held.

use heapless::Vec;
use phys605_hal::{DelayNs, GpioError, GpioPort, Level, LineId, PinDirection};

use crate::bits::word_mask;

/// Lines on the simulated bank
pub const SIM_LINES: usize = 32;

/// Events kept before recording stops
pub const MAX_EVENTS: usize = 2048;

/// Devices that can be attached
pub const MAX_DEVICES: usize = 4;

/// Bits a slave can record or answer with
pub const MAX_SLAVE_BITS: usize = 512;

/// One recorded call on the port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// `set_line`
    Set {
        /// Line
        line: LineId,
        /// Level driven
        level: Level,
    },
    /// `read_line`
    Read {
        /// Line
        line: LineId,
        /// Level returned
        level: Level,
    },
    /// `configure_line`
    Configure {
        /// Line
        line: LineId,
        /// New direction
        direction: PinDirection,
    },
}

/// Parallel-in serial-out shift register chain (SN74HC165)
///
/// A low level on `load` captures `parallel`; each rising clock edge with
/// `load` high shifts one bit towards `data`. The first bit out is bit
/// `width - 1` of the captured value. Zeros are shifted in behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PisoModel {
    data: LineId,
    clock: LineId,
    load: LineId,
    width: u8,
    parallel: u64,
    shift: u64,
}

impl PisoModel {
    /// Chain of `width` bits presenting on `data`
    pub fn new(data: LineId, clock: LineId, load: LineId, width: u8) -> Self {
        Self {
            data,
            clock,
            load,
            width,
            parallel: 0,
            shift: 0,
        }
    }

    /// Set the parallel inputs
    pub fn with_parallel(mut self, value: u64) -> Self {
        self.parallel = value;
        self
    }

    /// Change the parallel inputs
    pub fn set_parallel(&mut self, value: u64) {
        self.parallel = value;
    }

    fn output(&self) -> Level {
        if self.width == 0 {
            return Level::Low;
        }
        Level::from((self.shift >> (self.width - 1)) & 1 != 0)
    }

    fn on_edge(&mut self, line: LineId, level: Level, levels: &[Level; SIM_LINES]) {
        if line == self.load && level.is_low() {
            self.shift = self.parallel & word_mask(self.width);
        } else if line == self.clock && level.is_high() && levels[self.load.index()].is_high() {
            self.shift = (self.shift << 1) & word_mask(self.width);
        }
    }
}

/// Serial-in parallel-out shift register chain (SN74HC595)
///
/// Rising `clock` shifts `data` in at bit 0, rising `latch` copies the
/// shift register to the outputs, low `clear` empties the shift register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipoModel {
    data: LineId,
    clock: LineId,
    latch: LineId,
    clear: Option<LineId>,
    width: u8,
    shift: u64,
    outputs: u64,
}

impl SipoModel {
    /// Chain of `width` bits fed from `data`
    pub fn new(data: LineId, clock: LineId, latch: LineId, width: u8) -> Self {
        Self {
            data,
            clock,
            latch,
            clear: None,
            width,
            shift: 0,
            outputs: 0,
        }
    }

    /// Wire the clear input
    pub fn with_clear(mut self, clear: LineId) -> Self {
        self.clear = Some(clear);
        self
    }

    /// Preload the shift register and outputs
    pub fn with_contents(mut self, value: u64) -> Self {
        self.shift = value & word_mask(self.width);
        self.outputs = self.shift;
        self
    }

    /// Latched outputs
    pub fn outputs(&self) -> u64 {
        self.outputs
    }

    /// Shift register contents (not yet latched)
    pub fn shift_register(&self) -> u64 {
        self.shift
    }

    fn on_edge(&mut self, line: LineId, level: Level, levels: &[Level; SIM_LINES]) {
        let mask = word_mask(self.width);
        if line == self.clock && level.is_high() {
            let bit = levels[self.data.index()].is_high() as u64;
            self.shift = ((self.shift << 1) | bit) & mask;
        } else if line == self.latch && level.is_high() {
            self.outputs = self.shift & mask;
        } else if Some(line) == self.clear && level.is_low() {
            self.shift = 0;
        }
    }
}

/// Scripted SPI peripheral, mode 0, MSB first, active-low select
///
/// While selected the slave samples `mosi` on every rising clock edge
/// (only when the board is driving it) and presents response bit `k` on
/// `miso` for clock cycle `k`, counted from the select edge. `mosi` and
/// `miso` may be the same line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveModel {
    clock: LineId,
    mosi: LineId,
    miso: Option<LineId>,
    cs: LineId,
    response: Vec<u8, 64>,
    received: Vec<bool, MAX_SLAVE_BITS>,
    selected: bool,
    cycle: usize,
    selections: usize,
}

impl SlaveModel {
    /// Peripheral on the given lines
    pub fn new(clock: LineId, mosi: LineId, miso: Option<LineId>, cs: LineId) -> Self {
        Self {
            clock,
            mosi,
            miso,
            cs,
            response: Vec::new(),
            received: Vec::new(),
            selected: false,
            cycle: 0,
            selections: 0,
        }
    }

    /// Bytes presented on `miso`, MSB first, restarting at every select
    pub fn with_response(mut self, bytes: &[u8]) -> Self {
        self.response.clear();
        // Longer scripts are truncated
        let n = bytes.len().min(self.response.capacity());
        let _ = self.response.extend_from_slice(&bytes[..n]);
        self
    }

    /// Bits sampled from the board, across all selections
    pub fn received_bits(&self) -> &[bool] {
        &self.received
    }

    /// Sampled bits grouped into bytes, MSB first; a partial tail byte is dropped
    pub fn received(&self) -> Vec<u8, 64> {
        self.received
            .chunks_exact(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8))
            .collect()
    }

    /// Number of times the chip was selected
    pub fn selections(&self) -> usize {
        self.selections
    }

    /// Check if the chip is currently selected
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    fn response_bit(&self) -> Level {
        let byte = self.response.get(self.cycle / 8).copied().unwrap_or(0);
        Level::from(byte & (0x80 >> (self.cycle % 8)) != 0)
    }

    fn on_edge(
        &mut self,
        line: LineId,
        level: Level,
        levels: &[Level; SIM_LINES],
        directions: &[PinDirection; SIM_LINES],
    ) {
        if line == self.cs {
            self.selected = level.is_low();
            if self.selected {
                self.cycle = 0;
                self.selections += 1;
            }
        } else if line == self.clock && self.selected {
            if level.is_high() {
                if directions[self.mosi.index()] == PinDirection::Output {
                    let _ = self.received.push(levels[self.mosi.index()].is_high());
                }
            } else {
                self.cycle += 1;
            }
        }
    }

    fn drive(&self, line: LineId) -> Option<Level> {
        (self.selected && self.miso == Some(line)).then(|| self.response_bit())
    }
}

/// A device attached to the simulated bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimDevice {
    /// `to` reads whatever is on `from`
    Loopback {
        /// Driving line
        from: LineId,
        /// Line that follows it
        to: LineId,
    },
    /// Parallel-in serial-out chain
    Piso(PisoModel),
    /// Serial-in parallel-out chain
    Sipo(SipoModel),
    /// SPI peripheral
    Slave(SlaveModel),
}

impl SimDevice {
    fn on_edge(
        &mut self,
        line: LineId,
        level: Level,
        levels: &[Level; SIM_LINES],
        directions: &[PinDirection; SIM_LINES],
    ) {
        match self {
            SimDevice::Loopback { .. } => {}
            SimDevice::Piso(piso) => piso.on_edge(line, level, levels),
            SimDevice::Sipo(sipo) => sipo.on_edge(line, level, levels),
            SimDevice::Slave(slave) => slave.on_edge(line, level, levels, directions),
        }
    }

    fn drive(&self, line: LineId, levels: &[Level; SIM_LINES]) -> Option<Level> {
        match self {
            SimDevice::Loopback { from, to } if *to == line => Some(levels[from.index()]),
            SimDevice::Piso(piso) if piso.data == line => Some(piso.output()),
            SimDevice::Slave(slave) => slave.drive(line),
            _ => None,
        }
    }
}

/// Simulated pin bank
#[derive(Debug, Clone)]
pub struct SimPort {
    levels: [Level; SIM_LINES],
    inputs: [Option<Level>; SIM_LINES],
    directions: [PinDirection; SIM_LINES],
    claimed: u32,
    refused: u32,
    events: Vec<SimEvent, MAX_EVENTS>,
    toggles: usize,
    devices: Vec<SimDevice, MAX_DEVICES>,
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPort {
    /// Empty bank, every line a low input
    pub fn new() -> Self {
        Self {
            levels: [Level::Low; SIM_LINES],
            inputs: [None; SIM_LINES],
            directions: [PinDirection::Input; SIM_LINES],
            claimed: 0,
            refused: 0,
            events: Vec::new(),
            toggles: 0,
            devices: Vec::new(),
        }
    }

    /// Attach a device, returning its index
    ///
    /// Returns `None` when all device slots are taken.
    pub fn attach(&mut self, device: SimDevice) -> Option<usize> {
        self.devices.push(device).ok()?;
        Some(self.devices.len() - 1)
    }

    /// Builder form of [`SimPort::attach`]
    pub fn with_device(mut self, device: SimDevice) -> Self {
        let _ = self.attach(device);
        self
    }

    /// Make claims of a line fail as if it were reserved
    pub fn refuse(&mut self, line: LineId) {
        if line.index() < SIM_LINES {
            self.refused |= 1 << line.index();
        }
    }

    /// Drive an input line from outside the board
    pub fn set_input(&mut self, line: LineId, level: Level) {
        if let Some(slot) = self.inputs.get_mut(line.index()) {
            *slot = Some(level);
        }
    }

    /// Level on a line, as `read_line` would see it, without recording
    pub fn level(&self, line: LineId) -> Level {
        let i = line.index();
        if i >= SIM_LINES {
            return Level::Low;
        }
        if self.directions[i] == PinDirection::Output {
            return self.levels[i];
        }
        self.devices
            .iter()
            .find_map(|d| d.drive(line, &self.levels))
            .or(self.inputs[i])
            .unwrap_or(self.levels[i])
    }

    /// Current direction of a line
    pub fn direction(&self, line: LineId) -> PinDirection {
        self.directions
            .get(line.index())
            .copied()
            .unwrap_or(PinDirection::Input)
    }

    /// Check if a line is claimed
    pub fn is_claimed(&self, line: LineId) -> bool {
        line.index() < SIM_LINES && self.claimed & (1 << line.index()) != 0
    }

    /// Number of claimed lines
    pub fn claimed_count(&self) -> u32 {
        self.claimed.count_ones()
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Forget recorded events and reset the toggle count
    pub fn clear_events(&mut self) {
        self.events.clear();
        self.toggles = 0;
    }

    /// Level changes driven by the board since the last clear
    pub fn toggle_count(&self) -> usize {
        self.toggles
    }

    /// Attached device
    pub fn device(&self, index: usize) -> Option<&SimDevice> {
        self.devices.get(index)
    }

    /// Attached PISO model
    pub fn piso_mut(&mut self, index: usize) -> Option<&mut PisoModel> {
        match self.devices.get_mut(index) {
            Some(SimDevice::Piso(piso)) => Some(piso),
            _ => None,
        }
    }

    /// Attached SIPO model
    pub fn sipo(&self, index: usize) -> Option<&SipoModel> {
        match self.devices.get(index) {
            Some(SimDevice::Sipo(sipo)) => Some(sipo),
            _ => None,
        }
    }

    /// Attached SPI peripheral
    pub fn slave(&self, index: usize) -> Option<&SlaveModel> {
        match self.devices.get(index) {
            Some(SimDevice::Slave(slave)) => Some(slave),
            _ => None,
        }
    }

    fn record(&mut self, event: SimEvent) {
        // A full log stops recording; tests keep transfers short
        let _ = self.events.push(event);
    }
}

impl GpioPort for SimPort {
    fn claim(&mut self, line: LineId) -> Result<(), GpioError> {
        let i = line.index();
        if i >= SIM_LINES {
            return Err(GpioError::InvalidPin(line));
        }
        if self.refused & (1 << i) != 0 {
            return Err(GpioError::Unavailable(line));
        }
        if self.claimed & (1 << i) != 0 {
            return Err(GpioError::AlreadyClaimed(line));
        }
        self.claimed |= 1 << i;
        Ok(())
    }

    fn release(&mut self, line: LineId) {
        if line.index() < SIM_LINES {
            self.claimed &= !(1 << line.index());
            self.directions[line.index()] = PinDirection::Input;
        }
    }

    fn configure_line(&mut self, line: LineId, direction: PinDirection) {
        if let Some(slot) = self.directions.get_mut(line.index()) {
            *slot = direction;
            self.record(SimEvent::Configure { line, direction });
        }
    }

    fn set_line(&mut self, line: LineId, level: Level) {
        let i = line.index();
        if i >= SIM_LINES {
            return;
        }
        let old = self.levels[i];
        self.levels[i] = level;
        self.record(SimEvent::Set { line, level });

        if old != level {
            self.toggles += 1;
            for device in self.devices.iter_mut() {
                device.on_edge(line, level, &self.levels, &self.directions);
            }
        }
    }

    fn read_line(&mut self, line: LineId) -> Level {
        let level = self.level(line);
        self.record(SimEvent::Read { line, level });
        level
    }
}

/// Delay that only counts what it was asked to wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimDelay {
    /// Calls made
    pub calls: usize,
    /// Nanoseconds requested in total
    pub total_ns: u64,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLK: LineId = LineId(1);
    const DATA: LineId = LineId(2);
    const LATCH: LineId = LineId(3);

    #[test]
    fn test_loopback_follows_output() {
        let mut sim = SimPort::new().with_device(SimDevice::Loopback {
            from: LineId(4),
            to: LineId(5),
        });
        sim.configure_line(LineId(4), PinDirection::Output);
        sim.set_line(LineId(4), Level::High);
        assert_eq!(sim.read_line(LineId(5)), Level::High);
        assert_eq!(sim.toggle_count(), 1);
    }

    #[test]
    fn test_output_reads_back_own_level() {
        let mut sim = SimPort::new();
        sim.set_input(DATA, Level::High);
        assert_eq!(sim.read_line(DATA), Level::High);

        sim.configure_line(DATA, PinDirection::Output);
        sim.set_line(DATA, Level::Low);
        assert_eq!(sim.read_line(DATA), Level::Low);
    }

    #[test]
    fn test_claim_rules() {
        let mut sim = SimPort::new();
        sim.refuse(LineId(7));
        assert_eq!(sim.claim(LineId(7)), Err(GpioError::Unavailable(LineId(7))));
        assert_eq!(sim.claim(LineId(40)), Err(GpioError::InvalidPin(LineId(40))));
        assert!(sim.claim(LineId(6)).is_ok());
        assert_eq!(sim.claim(LineId(6)), Err(GpioError::AlreadyClaimed(LineId(6))));
        sim.release(LineId(6));
        assert!(!sim.is_claimed(LineId(6)));
    }

    #[test]
    fn test_sipo_model_shifts_and_latches() {
        let mut sim =
            SimPort::new().with_device(SimDevice::Sipo(SipoModel::new(DATA, CLK, LATCH, 4)));
        for line in [CLK, DATA, LATCH] {
            sim.configure_line(line, PinDirection::Output);
        }
        for bit in [true, false, true, true, true] {
            sim.set_line(DATA, Level::from(bit));
            sim.set_line(CLK, Level::High);
            sim.set_line(CLK, Level::Low);
        }
        let sipo = sim.sipo(0).unwrap();
        assert_eq!(sipo.shift_register(), 0b0111);
        assert_eq!(sipo.outputs(), 0);

        sim.set_line(LATCH, Level::High);
        assert_eq!(sim.sipo(0).unwrap().outputs(), 0b0111);
    }

    #[test]
    fn test_piso_model_presents_msb_first() {
        let piso = PisoModel::new(DATA, CLK, LATCH, 4).with_parallel(0b1010);
        let mut sim = SimPort::new().with_device(SimDevice::Piso(piso));
        sim.configure_line(CLK, PinDirection::Output);
        sim.configure_line(LATCH, PinDirection::Output);
        sim.set_line(LATCH, Level::High);
        sim.set_line(LATCH, Level::Low);
        sim.set_line(LATCH, Level::High);

        let mut seen = 0u8;
        for _ in 0..4 {
            seen = (seen << 1) | sim.read_line(DATA).is_high() as u8;
            sim.set_line(CLK, Level::High);
            sim.set_line(CLK, Level::Low);
        }
        assert_eq!(seen, 0b1010);
    }

    #[test]
    fn test_slave_answers_only_when_selected() {
        let cs = LineId(8);
        let miso = LineId(9);
        let mut sim = SimPort::new().with_device(SimDevice::Slave(
            SlaveModel::new(CLK, DATA, Some(miso), cs).with_response(&[0x80]),
        ));
        sim.configure_line(cs, PinDirection::Output);
        sim.set_line(cs, Level::High);
        sim.set_input(miso, Level::Low);
        assert_eq!(sim.read_line(miso), Level::Low);

        sim.set_line(cs, Level::Low);
        assert_eq!(sim.read_line(miso), Level::High);
        assert_eq!(sim.slave(0).unwrap().selections(), 1);
    }
}
