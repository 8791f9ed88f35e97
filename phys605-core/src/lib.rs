//! Bit-level bus engines for the phys605 lab bench
//!
//! This crate turns logical bit and byte streams into timed line
//! transitions and back, on top of the pin abstraction in `phys605-hal`:
//!
//! - Bit/byte serializer (`bits`)
//! - Software SPI engine and the hardware SPI transport (`spi`)
//! - Shift-register transfer for 74HC165/74HC595 chains (`shift`)
//! - Line roles and scoped acquisition (`line`)
//! - Bench configuration and its TOML parser (`config`)
//! - Simulated pin bank for host tests (`sim`, feature `sim`)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod bits;
pub mod config;
pub mod error;
pub mod line;
pub mod shift;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod spi;

pub use error::{Error, InvalidArgument, Result};
pub use line::{ChipSelect, Lines};
pub use shift::{ShiftIn, ShiftOut};
pub use spi::{BitBangTransport, Framing, HardwareSpiTransport, TransferRequest, Transport};
