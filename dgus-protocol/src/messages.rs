//! Commands and responses for the DGUS VP protocol
//!
//! Two commands are executed:
//! - 0x82 write VP: payload bytes are stored starting at the address
//! - 0x83 read VP: one payload byte gives the number of words to return
//!
//! 0x80 and 0x81 are framed but carry no action here.

use heapless::Vec;

use crate::crc::crc16;
use crate::frame::{
    Frame, FrameError, COMMAND_OFFSET, FRAME_BUFFER_SIZE, HEADER_1, HEADER_2,
};

// Command codes
pub const CMD_RESERVED_80: u8 = 0x80;
pub const CMD_RESERVED_81: u8 = 0x81;
pub const CMD_WRITE_VP: u8 = 0x82;
pub const CMD_READ_VP: u8 = 0x83;

/// Body of the write acknowledgement ("OK")
pub const ACK_OK: [u8; 2] = [0x4F, 0x4B];

/// Offset of the first data word in a read response
pub const READ_DATA_OFFSET: usize = 7;

/// Size of the CRC trailer
pub const CRC_SIZE: usize = 2;

/// Largest value the LENGTH byte can carry
const MAX_LENGTH_FIELD: usize = u8::MAX as usize;

/// Scratch buffer large enough for any frame
pub type FrameBuf = Vec<u8, FRAME_BUFFER_SIZE>;

/// A command decoded from a complete frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    /// Store `data` starting at `address`
    WriteVp { address: u16, data: &'a [u8] },
    /// Return `count` words starting at `address`
    ReadVp { address: u16, count: u8 },
    /// 0x80 / 0x81: framed, not executed
    Reserved { code: u8 },
}

impl<'a> Command<'a> {
    /// Decode a frame
    ///
    /// With `crc` set, the trailing two bytes must be the CRC16 of the
    /// command byte through the end of the payload. They are stripped from
    /// the returned data.
    pub fn parse(frame: &Frame<'a>, crc: bool) -> Result<Self, FrameError> {
        let code = frame.command();
        if code == CMD_RESERVED_80 || code == CMD_RESERVED_81 {
            return Ok(Command::Reserved { code });
        }

        let body = if crc {
            verify_crc(frame)?;
            let payload = frame.payload();
            &payload[..payload.len() - CRC_SIZE]
        } else {
            frame.payload()
        };

        match code {
            CMD_WRITE_VP => Ok(Command::WriteVp {
                address: frame.address(),
                data: body,
            }),
            CMD_READ_VP => {
                let count = *body.first().ok_or(FrameError::Truncated)?;
                Ok(Command::ReadVp {
                    address: frame.address(),
                    count,
                })
            }
            other => Err(FrameError::UnknownCommand(other)),
        }
    }

    /// Encode this command as a request frame (host side, or for testing)
    pub fn encode(&self, crc: bool, out: &mut FrameBuf) -> Result<(), FrameError> {
        out.clear();
        match self {
            Command::WriteVp { address, data } => {
                let length = 3 + data.len();
                if length + crc_extra(crc) > MAX_LENGTH_FIELD {
                    return Err(FrameError::ResponseTooLarge);
                }
                push_all(out, &[HEADER_1, HEADER_2, length as u8, CMD_WRITE_VP])?;
                push_all(out, &address.to_be_bytes())?;
                push_all(out, data)?;
            }
            Command::ReadVp { address, count } => {
                push_all(out, &[HEADER_1, HEADER_2, 0x04, CMD_READ_VP])?;
                push_all(out, &address.to_be_bytes())?;
                push_all(out, &[*count])?;
            }
            Command::Reserved { code } => {
                push_all(out, &[HEADER_1, HEADER_2, 0x03, *code, 0x00, 0x00, 0x00, 0x00])?;
                return Ok(());
            }
        }
        if crc {
            append_crc(out)?;
        }
        Ok(())
    }
}

fn crc_extra(crc: bool) -> usize {
    if crc {
        CRC_SIZE
    } else {
        0
    }
}

fn push_all(out: &mut FrameBuf, bytes: &[u8]) -> Result<(), FrameError> {
    out.extend_from_slice(bytes)
        .map_err(|_| FrameError::ResponseTooLarge)
}

/// Check the trailing CRC of a frame
pub fn verify_crc(frame: &Frame<'_>) -> Result<(), FrameError> {
    let body = frame.crc_body().ok_or(FrameError::Truncated)?;
    let trailer = frame.crc_trailer().ok_or(FrameError::Truncated)?;
    if crc16(body) != trailer {
        return Err(FrameError::CrcMismatch);
    }
    Ok(())
}

/// Append a CRC16 trailer to a frame under construction
///
/// Adds two to the LENGTH field, then appends the CRC of everything from
/// the command byte onward, low byte first.
pub fn append_crc(out: &mut FrameBuf) -> Result<(), FrameError> {
    if out.len() <= COMMAND_OFFSET {
        return Err(FrameError::Truncated);
    }
    let length = out[2] as usize + CRC_SIZE;
    if length > MAX_LENGTH_FIELD {
        return Err(FrameError::ResponseTooLarge);
    }
    out[2] = length as u8;
    let crc = crc16(&out[COMMAND_OFFSET..]);
    push_all(out, &crc.to_le_bytes())
}

/// Build the write acknowledgement
///
/// `5A A5 03 82 4F 4B`, or `5A A5 05 82 4F 4B A5 EF` on CRC links.
pub fn encode_write_ack(crc: bool, out: &mut FrameBuf) -> Result<(), FrameError> {
    out.clear();
    push_all(out, &[HEADER_1, HEADER_2, 0x03, CMD_WRITE_VP])?;
    push_all(out, &ACK_OK)?;
    if crc {
        append_crc(out)?;
    }
    Ok(())
}

/// Start a read response for `count` words at `address`
///
/// Writes header, LENGTH (`2 * count + 4`), command, address and count, then
/// zero-fills the word area starting at [`READ_DATA_OFFSET`] for the caller
/// to fill. The CRC, if any, is added afterwards with [`append_crc`].
pub fn begin_read_response(
    address: u16,
    count: u8,
    crc: bool,
    out: &mut FrameBuf,
) -> Result<(), FrameError> {
    let words = 2 * count as usize;
    let length = words + 4;
    if length + crc_extra(crc) > MAX_LENGTH_FIELD {
        return Err(FrameError::ResponseTooLarge);
    }

    out.clear();
    push_all(out, &[HEADER_1, HEADER_2, length as u8, CMD_READ_VP])?;
    push_all(out, &address.to_be_bytes())?;
    push_all(out, &[count])?;
    out.resize(READ_DATA_OFFSET + words, 0)
        .map_err(|_| FrameError::ResponseTooLarge)?;
    Ok(())
}

/// Largest word count a read response can carry
pub const fn max_read_words(crc: bool) -> u8 {
    let budget = MAX_LENGTH_FIELD - 4 - if crc { CRC_SIZE } else { 0 };
    (budget / 2) as u8
}
