//! phys605 Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction the bus engines are written
//! against. Board HALs (RP2040, or a Linux GPIO character device) implement
//! these traits; the engines and chip drivers never see a concrete pin type.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Chip drivers (phys605-drivers)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  Bus engines (phys605-core)             │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  phys605-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  phys605-hal-rp2040                     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::GpioPort`] - Addressable digital lines
//! - [`spi::SpiBus`] - Hardware SPI controller
//! - [`DelayNs`] - Half-clock dwell for software-timed buses

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use embedded_hal::delay::DelayNs;
pub use gpio::{GpioError, GpioPort, Level, LineId, NoPort, PinDirection, SharedPort};
pub use spi::{BitOrder, Mode, Phase, Polarity, SpiBus, SpiConfig};
