//! RP2040 SPI controller (PL022) as a [`SpiBus`]
//!
//! Runs in blocking mode; transfers are short and the bench loop waits for
//! each one anyway. The controller shifts MSB first only, so LSB-first
//! buses are handled by bit reversal in the transport above.

use embassy_rp::clocks::clk_peri_freq;
use embassy_rp::spi::{
    Blocking, Config, Error, Instance, Phase as RpPhase, Polarity as RpPolarity, Spi,
};
use phys605_hal::{Phase, Polarity, SpiBus, SpiConfig};

/// Blocking SPI controller
pub struct Rp2040Spi<'d, T: Instance> {
    spi: Spi<'d, T, Blocking>,
}

impl<'d, T: Instance> Rp2040Spi<'d, T> {
    /// Wrap a controller set up with `Spi::new_blocking` or `new_blocking_txonly`
    pub fn new(spi: Spi<'d, T, Blocking>) -> Self {
        Self { spi }
    }

    /// Translate bus settings to the Embassy configuration
    pub fn rp_config(config: &SpiConfig) -> Config {
        let mut rp = Config::default();
        rp.frequency = config.frequency;
        rp.polarity = match config.polarity {
            Polarity::IdleLow => RpPolarity::IdleLow,
            Polarity::IdleHigh => RpPolarity::IdleHigh,
        };
        rp.phase = match config.phase {
            Phase::CaptureOnFirstTransition => RpPhase::CaptureOnFirstTransition,
            Phase::CaptureOnSecondTransition => RpPhase::CaptureOnSecondTransition,
        };
        rp
    }
}

impl<T: Instance> SpiBus for Rp2040Spi<'_, T> {
    type Error = Error;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.spi.blocking_transfer(read, write)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.spi.blocking_write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.blocking_read(buf)
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.blocking_transfer_in_place(data)
    }

    fn set_config(&mut self, config: &SpiConfig) -> Result<(), Self::Error> {
        self.spi.set_config(&Self::rp_config(config));

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "spi: mode {} at {} Hz",
            config.mode().number(),
            config.frequency
        );

        Ok(())
    }

    /// Half the peripheral clock (62.5 MHz at the default 125 MHz)
    fn max_frequency_hz(&self) -> u32 {
        clk_peri_freq() / 2
    }
}
