//! Board-agnostic frame engine for the DGUS VP bridge
//!
//! This crate contains everything between the UART data registers and the
//! display's VP memory that does not depend on a specific chip:
//!
//! - Interrupt-safe byte rings ([`ring`])
//! - Per-port transport shared with interrupt handlers ([`port`])
//! - Command execution against VP memory ([`dispatch`])
//! - The foreground engine with settle delays and the 0x0F00 upload poll
//!   ([`bridge`])
//! - A RAM-backed VP memory ([`vp_ram`])
//! - Configuration types and the `bridge.toml` parser ([`config`])

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod port;
pub mod ring;
pub mod vp_ram;

pub use bridge::{Bridge, BridgeEvent, PollOutcome, TxStart};
pub use config::{BridgeConfig, PortConfig};
pub use dispatch::{dispatch, DispatchError, DispatchOutcome};
pub use port::{PortLink, StatsSnapshot, TxError};
pub use vp_ram::VpRam;
