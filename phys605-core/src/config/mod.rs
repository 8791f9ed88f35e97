//! Configuration types
//!
//! Bus settings plus the bench description parsed from `bench.toml`.

pub mod parse;
pub mod types;

pub use parse::{parse_config, ParseError, ParseErrorKind};
pub use types::*;
