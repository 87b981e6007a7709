//! DGUS VP Frame Protocol
//!
//! This crate defines the UART framing used to read and write the Variable
//! Pointer (VP) memory of a DGUS-class display coprocessor. It covers the
//! byte-level frame assembler, the CRC16 used by CRC-enabled links and the
//! command/response codec.
//!
//! # Protocol Overview
//!
//! ```text
//! ┌──────┬──────┬────────┬─────────┬────────────┬──────────────┬──────────┐
//! │ 0x5A │ 0xA5 │ LENGTH │ COMMAND │ VP ADDRESS │ PAYLOAD      │ CRC16    │
//! │ 1B   │ 1B   │ 1B     │ 1B      │ 2B (BE)    │ 0–252B       │ 2B (opt) │
//! └──────┴──────┴────────┴─────────┴────────────┴──────────────┴──────────┘
//! ```
//!
//! LENGTH counts every byte after itself, CRC included. There is no negative
//! acknowledgement: a frame that fails validation is dropped without reply.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod crc;
pub mod frame;
pub mod messages;

pub use crc::crc16;
pub use frame::{
    AssemblerState, Frame, FrameAssembler, FrameError, FRAME_BUFFER_SIZE, HEADER_1, HEADER_2,
    MAX_FRAME_LEN, MIN_FRAME_LEN,
};
pub use messages::{Command, FrameBuf, CMD_READ_VP, CMD_WRITE_VP};
