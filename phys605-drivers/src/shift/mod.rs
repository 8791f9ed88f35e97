//! Shift-register chips

pub mod sn74hc165;
pub mod sn74hc595;

pub use sn74hc165::Sn74hc165;
pub use sn74hc595::Sn74hc595;

/// Outputs or inputs per chip
pub const BITS_PER_CHIP: u8 = 8;

/// Longest chain a 64-bit word holds
pub const MAX_CHIPS: u8 = 8;
