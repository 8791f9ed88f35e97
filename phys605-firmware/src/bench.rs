//! Bench assembly
//!
//! Turns a parsed bench description into open transports and drivers. A
//! section that cannot be brought up is logged and left out; the rest of
//! the bench still runs.

use core::cell::RefCell;

use defmt::*;
use embassy_rp::spi::{Config as RpSpiConfig, Spi};
use embassy_time::Delay;
use phys605_core::config::{BenchConfig, BusConfig, SpiBusConfig, TransportKind};
use phys605_core::{BitBangTransport, Error, HardwareSpiTransport, Result};
use phys605_drivers::adc::{Chip, InputMode, Mcp320x};
use phys605_drivers::display::Max7219;
use phys605_drivers::shift::{Sn74hc165, Sn74hc595};
use phys605_hal::{GpioError, LineId, SharedPort};
use phys605_hal_rp2040::{BoardPeripherals, GpioBank, Rp2040Spi, SPI0_RX, SPI0_SCK, SPI0_TX};

use crate::transport::{BenchSpi, Gpio, SoftSpi};

/// ADC and the channel the bench samples
pub struct AdcProbe {
    pub adc: Mcp320x<BenchSpi>,
    pub channel: u8,
}

/// Every device the bench description brought up
pub struct Bench {
    pub adc: Option<AdcProbe>,
    pub inputs: Option<Sn74hc165<Gpio, Delay>>,
    pub outputs: Option<Sn74hc595<Gpio, Delay>>,
    pub display: Option<Max7219<SoftSpi>>,
}

impl Bench {
    /// Open everything the description names
    pub fn build(
        config: &BenchConfig,
        gpio: &'static RefCell<GpioBank>,
        board: BoardPeripherals,
    ) -> Self {
        let port = SharedPort::new(gpio);

        let adc = match (&config.spi, &config.adc) {
            (Some(spi), Some(adc)) => match Chip::from_name(&adc.chip) {
                Some(chip) => {
                    let mode = InputMode::from_single_ended(adc.single_ended);
                    let probe = open_spi(spi, port.clone(), board).map(|transport| AdcProbe {
                        adc: Mcp320x::new(transport, chip, mode),
                        channel: adc.channel,
                    });
                    report("adc", probe)
                }
                None => {
                    error!("[adc] unknown chip {}", adc.chip.as_str());
                    None
                }
            },
            (None, Some(_)) => {
                warn!("[adc] has no [spi] bus");
                None
            }
            _ => None,
        };

        let inputs = config.shift_in.as_ref().and_then(|cfg| {
            report("shift_in", Sn74hc165::open(port.clone(), cfg, Delay))
        });

        let outputs = config.shift_out.as_ref().and_then(|cfg| {
            report("shift_out", Sn74hc595::open(port.clone(), cfg, Delay))
        });

        let display = config.display.as_ref().and_then(|cfg| {
            let display =
                BitBangTransport::open(port.clone(), cfg.lines(), BusConfig::default(), Delay)
                    .and_then(|spi| Max7219::from_config(spi, cfg))
                    .and_then(|mut display| {
                        display.init(&mut Delay, cfg.brightness)?;
                        Ok(display)
                    });
            report("display", display)
        });

        Self {
            adc,
            inputs,
            outputs,
            display,
        }
    }
}

/// Open the transport named by the `[spi]` section
fn open_spi(spi: &SpiBusConfig, port: Gpio, board: BoardPeripherals) -> Result<BenchSpi> {
    match spi.transport {
        TransportKind::BitBang => {
            BitBangTransport::open(port, spi.lines(), spi.bus, Delay).map(BenchSpi::BitBang)
        }
        TransportKind::Hardware => {
            let pins = board
                .spi0_pins
                .ok_or(Error::HardwareUnavailable(GpioError::ControllerFault))?;
            for (line, expected) in [(spi.data_out, SPI0_TX), (spi.data_in, SPI0_RX)] {
                if let Some(line) = line.filter(|l| l.0 != expected) {
                    return Err(Error::HardwareUnavailable(GpioError::InvalidPin(line)));
                }
            }
            let Some(chip_select) = spi.chip_select else {
                warn!("[spi] hardware transport needs a cs line");
                return Err(Error::HardwareUnavailable(GpioError::Unavailable(LineId(
                    SPI0_SCK,
                ))));
            };

            let bus = Spi::new_blocking(
                board.spi0,
                pins.sck,
                pins.tx,
                pins.rx,
                RpSpiConfig::default(),
            );
            HardwareSpiTransport::open_with_chip_select(
                Rp2040Spi::new(bus),
                port,
                chip_select,
                spi.bus,
            )
            .map(BenchSpi::Hardware)
        }
    }
}

/// Log a section that failed to open
fn report<T>(section: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(device) => {
            info!("[{}] ready", section);
            Some(device)
        }
        Err(e) => {
            error!("[{}] unavailable: {}", section, e.kind());
            None
        }
    }
}
