//! DGUS Bridge Hardware Abstraction Layer
//!
//! This crate defines the narrow interfaces the bridge core consumes from
//! the hardware around it. Chip-specific code implements them; the core and
//! its tests only ever see the traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Bridge core (dgus-core)                │
//! └─────────────────────────────────────────┘
//!           │                     │
//!           ▼                     ▼
//! ┌───────────────────┐  ┌───────────────────┐
//! │ uart::UartPeriph. │  │ vp::VpMemory      │
//! │ (byte in / out)   │  │ (display VP space)│
//! └───────────────────┘  └───────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::UartPeripheral`] - Data register access from interrupt context
//! - [`vp::VpMemory`] - Word-addressed VP memory of the display coprocessor

#![no_std]
#![deny(unsafe_code)]

pub mod uart;
pub mod vp;

// Re-export key traits at crate root for convenience
pub use uart::{DataBits, Parity, StopBits, UartConfig, UartPeripheral};
pub use vp::{VpError, VpMemory};
