//! SPI transport chosen by the bench description
//!
//! `transport = "bitbang"` drives the configured GPIO lines in software;
//! `transport = "hardware"` uses the SPI0 controller on its fixed pins.

use embassy_rp::peripherals::SPI0;
use embassy_time::Delay;
use phys605_core::config::BusConfig;
use phys605_core::{BitBangTransport, HardwareSpiTransport, Result, TransferRequest, Transport};
use phys605_hal::SharedPort;
use phys605_hal_rp2040::{GpioBank, Rp2040Spi};

/// The board's GPIO bank, shared between every bus on the bench
pub type Gpio = SharedPort<'static, GpioBank>;

/// Software SPI on GPIO lines
pub type SoftSpi = BitBangTransport<Gpio, Delay>;

/// SPI0 with chip select on a GPIO line
pub type HardSpi = HardwareSpiTransport<Rp2040Spi<'static, SPI0>, Gpio>;

/// Either transport behind one type
pub enum BenchSpi {
    BitBang(SoftSpi),
    Hardware(HardSpi),
}

impl Transport for BenchSpi {
    fn configure(&mut self, config: BusConfig) -> Result<()> {
        match self {
            BenchSpi::BitBang(spi) => spi.configure(config),
            BenchSpi::Hardware(spi) => spi.configure(config),
        }
    }

    fn config(&self) -> &BusConfig {
        match self {
            BenchSpi::BitBang(spi) => spi.config(),
            BenchSpi::Hardware(spi) => spi.config(),
        }
    }

    fn transfer(&mut self, request: TransferRequest<'_>) -> Result<()> {
        match self {
            BenchSpi::BitBang(spi) => spi.transfer(request),
            BenchSpi::Hardware(spi) => spi.transfer(request),
        }
    }

    fn close(&mut self) {
        match self {
            BenchSpi::BitBang(spi) => spi.close(),
            BenchSpi::Hardware(spi) => spi.close(),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            BenchSpi::BitBang(spi) => spi.is_open(),
            BenchSpi::Hardware(spi) => spi.is_open(),
        }
    }
}
