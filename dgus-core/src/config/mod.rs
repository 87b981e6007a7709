//! Configuration
//!
//! Port and bridge settings, plus a small parser for the `bridge.toml`
//! format the firmware embeds.

pub mod toml;
pub mod types;

pub use toml::{parse_config, ParseError};
pub use types::*;
