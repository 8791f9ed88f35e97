//! Pins by number
//!
//! The bench description names lines by GPIO number, so every pin is moved
//! out of the Embassy peripherals into a bank they can be taken from at
//! runtime. The SPI0 function pins can be held back with their concrete
//! types for the hardware transport.

use embassy_rp::gpio::AnyPin;
use embassy_rp::peripherals::{PIN_16, PIN_18, PIN_19, SPI0};
use embassy_rp::{Peri, Peripherals};

use crate::gpio::GPIO_COUNT;

/// SPI0 clock (SCK)
pub const SPI0_SCK: u8 = 18;

/// SPI0 data out (TX / MOSI)
pub const SPI0_TX: u8 = 19;

/// SPI0 data in (RX / MISO)
pub const SPI0_RX: u8 = 16;

/// SPI0 function pins
pub struct Spi0Pins {
    pub sck: Peri<'static, PIN_18>,
    pub tx: Peri<'static, PIN_19>,
    pub rx: Peri<'static, PIN_16>,
}

/// Every GPIO pin, each taken at most once
pub struct PinBank {
    pins: [Option<Peri<'static, AnyPin>>; GPIO_COUNT],
}

/// Peripherals other than GPIO that the bench uses
pub struct BoardPeripherals {
    pub spi0: Peri<'static, SPI0>,
    /// Present when reserved in [`PinBank::new`]
    pub spi0_pins: Option<Spi0Pins>,
}

impl PinBank {
    /// Split the peripherals into the pin bank and the rest
    ///
    /// With `reserve_spi0` the SPI0 pins stay out of the bank.
    pub fn new(p: Peripherals, reserve_spi0: bool) -> (Self, BoardPeripherals) {
        let (pin16, pin18, pin19, spi0_pins) = if reserve_spi0 {
            let pins = Spi0Pins {
                sck: p.PIN_18,
                tx: p.PIN_19,
                rx: p.PIN_16,
            };
            (None, None, None, Some(pins))
        } else {
            (
                Some(p.PIN_16.into()),
                Some(p.PIN_18.into()),
                Some(p.PIN_19.into()),
                None,
            )
        };
        let bank = Self {
            pins: [
                Some(p.PIN_0.into()),
                Some(p.PIN_1.into()),
                Some(p.PIN_2.into()),
                Some(p.PIN_3.into()),
                Some(p.PIN_4.into()),
                Some(p.PIN_5.into()),
                Some(p.PIN_6.into()),
                Some(p.PIN_7.into()),
                Some(p.PIN_8.into()),
                Some(p.PIN_9.into()),
                Some(p.PIN_10.into()),
                Some(p.PIN_11.into()),
                Some(p.PIN_12.into()),
                Some(p.PIN_13.into()),
                Some(p.PIN_14.into()),
                Some(p.PIN_15.into()),
                pin16,
                Some(p.PIN_17.into()),
                pin18,
                pin19,
                Some(p.PIN_20.into()),
                Some(p.PIN_21.into()),
                Some(p.PIN_22.into()),
                Some(p.PIN_23.into()),
                Some(p.PIN_24.into()),
                Some(p.PIN_25.into()),
                Some(p.PIN_26.into()),
                Some(p.PIN_27.into()),
                Some(p.PIN_28.into()),
                Some(p.PIN_29.into()),
            ],
        };
        let rest = BoardPeripherals {
            spi0: p.SPI0,
            spi0_pins,
        };
        (bank, rest)
    }

    /// Take a pin by number; `None` if out of range or already taken
    pub fn take(&mut self, number: u8) -> Option<Peri<'static, AnyPin>> {
        self.pins.get_mut(usize::from(number))?.take()
    }

    /// Check if a pin is still in the bank
    pub fn is_available(&self, number: u8) -> bool {
        matches!(self.pins.get(usize::from(number)), Some(Some(_)))
    }

    /// Put a pin back
    pub fn return_pin(&mut self, number: u8, pin: Peri<'static, AnyPin>) {
        if let Some(slot) = self.pins.get_mut(usize::from(number)) {
            *slot = Some(pin);
        }
    }
}
