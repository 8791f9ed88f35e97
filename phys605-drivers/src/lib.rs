//! Chip drivers for the phys605 lab bench
//!
//! Each driver is written against the bus engines in `phys605-core`, so the
//! same code runs over GPIO bit-banging or the board's SPI controller:
//!
//! - ADCs (MCP3002/3004/3008, MCP3202/3204/3208)
//! - Shift registers (SN74HC165 inputs, SN74HC595 outputs)
//! - LED display controller (MAX7219)
//! - Digital potentiometers (MCP4251 over SPI, MCP4161 over a shared data pin)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod adc;
pub mod display;
pub mod pot;
pub mod shift;
