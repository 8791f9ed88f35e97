//! Analog-to-digital converters

pub mod mcp320x;

pub use mcp320x::{Chip, InputMode, Mcp320x};
