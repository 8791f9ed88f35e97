//! RP2040 implementation of the phys605 HAL traits
//!
//! - GPIO bank with runtime line claiming (`gpio`)
//! - Pin bank built from the Embassy peripherals (`pins`)
//! - Blocking SPI controller adapter (`spi`)

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod pins;
pub mod spi;

pub use gpio::{GpioAllocator, GpioBank, GPIO_COUNT};
pub use pins::{BoardPeripherals, PinBank, Spi0Pins, SPI0_RX, SPI0_SCK, SPI0_TX};
pub use spi::Rp2040Spi;
