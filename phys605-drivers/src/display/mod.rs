//! LED display controllers

pub mod max7219;

pub use max7219::{DecodeMode, Max7219};
