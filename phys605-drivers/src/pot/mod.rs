//! Digital potentiometers

pub mod mcp4x51;

pub use mcp4x51::{Mcp4161, Mcp4251, Mcp4x51, Mcp4x51Error, Terminal, Wiper};
