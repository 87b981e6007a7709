//! Command execution
//!
//! Runs one completed frame against VP memory and builds the reply in a
//! per-port scratch buffer. A failed frame leaves VP memory untouched and
//! the reply buffer empty.

use dgus_hal::{VpError, VpMemory};
use dgus_protocol::messages::{
    append_crc, begin_read_response, encode_write_ack, max_read_words, READ_DATA_OFFSET,
};
use dgus_protocol::{Command, Frame, FrameBuf, FrameError};

use crate::config::PortConfig;

/// What a frame did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchOutcome {
    /// `len` bytes stored at `address`; `acked` if a reply was built
    Written { address: u16, len: usize, acked: bool },
    /// `count` words read from `address` into the reply
    Read { address: u16, count: u8 },
    /// Reserved command, framed but not executed
    Ignored { code: u8 },
}

/// Why a frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    Frame(FrameError),
    Vp(VpError),
}

impl From<FrameError> for DispatchError {
    fn from(e: FrameError) -> Self {
        DispatchError::Frame(e)
    }
}

impl From<VpError> for DispatchError {
    fn from(e: VpError) -> Self {
        DispatchError::Vp(e)
    }
}

/// Execute `frame` for a port configured as `config`
///
/// On success `response` holds the bytes to send back, possibly none. On
/// error it is empty.
pub fn dispatch<M: VpMemory>(
    config: &PortConfig,
    frame: &Frame<'_>,
    vp: &mut M,
    response: &mut FrameBuf,
) -> Result<DispatchOutcome, DispatchError> {
    response.clear();
    let result = execute(config, frame, vp, response);
    if result.is_err() {
        response.clear();
    }
    result
}

fn execute<M: VpMemory>(
    config: &PortConfig,
    frame: &Frame<'_>,
    vp: &mut M,
    response: &mut FrameBuf,
) -> Result<DispatchOutcome, DispatchError> {
    match Command::parse(frame, config.crc)? {
        Command::WriteVp { address, data } => {
            vp.write_bytes(address, data)?;
            if config.response {
                encode_write_ack(config.crc, response)?;
            }
            Ok(DispatchOutcome::Written {
                address,
                len: data.len(),
                acked: config.response,
            })
        }
        Command::ReadVp { address, count } => {
            read_response(address, count, config.crc, vp, response)?;
            Ok(DispatchOutcome::Read { address, count })
        }
        Command::Reserved { code } => Ok(DispatchOutcome::Ignored { code }),
    }
}

/// Build a complete read response for `count` words at `address`
///
/// Shared by 0x83 requests and the VP-triggered upload.
pub fn read_response<M: VpMemory>(
    address: u16,
    count: u8,
    crc: bool,
    vp: &mut M,
    out: &mut FrameBuf,
) -> Result<(), DispatchError> {
    if count > max_read_words(crc) {
        return Err(FrameError::ResponseTooLarge.into());
    }
    begin_read_response(address, count, crc, out)?;
    vp.read_words(address, &mut out[READ_DATA_OFFSET..])?;
    if crc {
        append_crc(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vp_ram::VpRam;
    use dgus_protocol::{crc16, FrameAssembler};
    use proptest::prelude::*;

    type Ram = VpRam<0x100>;

    fn port(crc: bool, response: bool) -> PortConfig {
        PortConfig {
            crc,
            response,
            ..PortConfig::default()
        }
    }

    fn run(
        config: &PortConfig,
        bytes: &[u8],
        vp: &mut Ram,
        response: &mut FrameBuf,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut asm = FrameAssembler::new();
        let (_, done) = asm.feed_bytes(bytes);
        assert!(done, "frame did not complete");
        dispatch(config, &asm.frame().unwrap(), vp, response)
    }

    #[test]
    fn test_write_and_ack() {
        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        let outcome = run(
            &port(false, true),
            &[0x5A, 0xA5, 0x05, 0x82, 0x00, 0x10, 0x12, 0x34],
            &mut vp,
            &mut response,
        )
        .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Written {
                address: 0x0010,
                len: 2,
                acked: true
            }
        );
        assert_eq!(vp.read_word(0x0010).unwrap(), 0x1234);
        assert_eq!(&response[..], &[0x5A, 0xA5, 0x03, 0x82, 0x4F, 0x4B]);
    }

    #[test]
    fn test_write_without_response() {
        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        run(
            &port(false, false),
            &[0x5A, 0xA5, 0x05, 0x82, 0x00, 0x10, 0x12, 0x34],
            &mut vp,
            &mut response,
        )
        .unwrap();
        assert_eq!(vp.read_word(0x0010).unwrap(), 0x1234);
        assert!(response.is_empty());
    }

    #[test]
    fn test_minimum_length_write() {
        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        let outcome = run(
            &port(false, true),
            &[0x5A, 0xA5, 0x03, 0x82, 0x00, 0x00],
            &mut vp,
            &mut response,
        )
        .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Written {
                address: 0,
                len: 0,
                acked: true
            }
        );
        assert_eq!(vp.cell(0), Some(0));
    }

    #[test]
    fn test_read_matches_memory() {
        let mut vp = Ram::new();
        vp.write_word(0x0014, 0x0001).unwrap();
        vp.write_word(0x0015, 0x00FF).unwrap();
        let mut response = FrameBuf::new();

        let outcome = run(
            &port(false, true),
            &[0x5A, 0xA5, 0x04, 0x83, 0x00, 0x14, 0x02],
            &mut vp,
            &mut response,
        )
        .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Read {
                address: 0x0014,
                count: 2
            }
        );
        assert_eq!(
            &response[..],
            &[0x5A, 0xA5, 0x08, 0x83, 0x00, 0x14, 0x02, 0x00, 0x01, 0x00, 0xFF]
        );
    }

    #[test]
    fn test_read_sent_even_without_response_flag() {
        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        run(
            &port(false, false),
            &[0x5A, 0xA5, 0x04, 0x83, 0x00, 0x14, 0x01],
            &mut vp,
            &mut response,
        )
        .unwrap();
        assert_eq!(response.len(), 9);
    }

    #[test]
    fn test_read_with_crc() {
        let mut vp = Ram::new();
        vp.write_word(0x0014, 0x0001).unwrap();
        vp.write_word(0x0015, 0x00FF).unwrap();
        let mut response = FrameBuf::new();

        run(
            &port(true, true),
            &[0x5A, 0xA5, 0x06, 0x83, 0x00, 0x14, 0x02, 0xA7, 0x61],
            &mut vp,
            &mut response,
        )
        .unwrap();
        assert_eq!(
            &response[..],
            &[0x5A, 0xA5, 0x0A, 0x83, 0x00, 0x14, 0x02, 0x00, 0x01, 0x00, 0xFF, 0x63, 0x2A]
        );
        let body_end = response.len() - 2;
        assert_eq!(
            crc16(&response[3..body_end]).to_le_bytes(),
            [response[body_end], response[body_end + 1]]
        );
    }

    #[test]
    fn test_crc_write_and_ack() {
        let mut frame = [0x5A, 0xA5, 0x07, 0x82, 0x00, 0x20, 0xBE, 0xEF, 0x00, 0x00];
        let crc = crc16(&frame[3..8]).to_le_bytes();
        frame[8..].copy_from_slice(&crc);

        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        run(&port(true, true), &frame, &mut vp, &mut response).unwrap();
        assert_eq!(vp.read_word(0x0020).unwrap(), 0xBEEF);
        assert_eq!(
            &response[..],
            &[0x5A, 0xA5, 0x05, 0x82, 0x4F, 0x4B, 0xA5, 0xEF]
        );
    }

    #[test]
    fn test_corrupt_crc_write_has_no_effect() {
        let mut frame = [0x5A, 0xA5, 0x07, 0x82, 0x00, 0x20, 0xBE, 0xEF, 0x00, 0x00];
        let crc = crc16(&frame[3..8]).to_le_bytes();
        frame[8..].copy_from_slice(&crc);

        // Corrupt each byte after the command in turn
        for i in 4..frame.len() {
            let mut bad = frame;
            bad[i] ^= 0x40;
            let mut vp = Ram::new();
            let mut response = FrameBuf::new();
            let result = run(&port(true, true), &bad, &mut vp, &mut response);
            assert_eq!(result, Err(DispatchError::Frame(FrameError::CrcMismatch)));
            assert!(response.is_empty());
            for addr in 0..0x200u16 {
                assert_eq!(vp.read_word(addr).unwrap(), 0);
            }
        }
    }

    #[test]
    fn test_payload_header_bytes_are_data() {
        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        run(
            &port(false, true),
            &[0x5A, 0xA5, 0x07, 0x82, 0x00, 0x30, 0x5A, 0xA5, 0x5A, 0x5A],
            &mut vp,
            &mut response,
        )
        .unwrap();
        assert_eq!(vp.read_word(0x0030).unwrap(), 0x5AA5);
        assert_eq!(vp.read_word(0x0031).unwrap(), 0x5A5A);
    }

    #[test]
    fn test_vp_error_drops_frame() {
        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        let result = run(
            &port(false, true),
            &[0x5A, 0xA5, 0x04, 0x83, 0x01, 0xFF, 0x02],
            &mut vp,
            &mut response,
        );
        assert!(matches!(result, Err(DispatchError::Vp(_))));
        assert!(response.is_empty());
    }

    #[test]
    fn test_oversized_read_dropped() {
        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        let result = run(
            &port(false, true),
            &[0x5A, 0xA5, 0x04, 0x83, 0x00, 0x00, 126],
            &mut vp,
            &mut response,
        );
        assert_eq!(
            result,
            Err(DispatchError::Frame(FrameError::ResponseTooLarge))
        );
        assert!(response.is_empty());
    }

    #[test]
    fn test_reserved_command_ignored() {
        let mut vp = Ram::new();
        let mut response = FrameBuf::new();
        let outcome = run(
            &port(false, true),
            &[0x5A, 0xA5, 0x03, 0x80, 0x00, 0x00, 0x00, 0x00],
            &mut vp,
            &mut response,
        )
        .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored { code: 0x80 });
        assert!(response.is_empty());
    }

    proptest! {
        #[test]
        fn prop_write_then_read_back(
            crc in any::<bool>(),
            address in 0u16..0x180,
            payload in proptest::collection::vec(any::<u8>(), 1..=248),
        ) {
            let config = port(crc, true);
            let mut vp = Ram::new();
            let mut request = FrameBuf::new();
            let mut response = FrameBuf::new();

            Command::WriteVp { address, data: &payload }.encode(crc, &mut request).unwrap();
            let outcome = run(&config, &request, &mut vp, &mut response).unwrap();
            prop_assert_eq!(
                outcome,
                DispatchOutcome::Written { address, len: payload.len(), acked: true }
            );

            let count = payload.len().div_ceil(2) as u8;
            Command::ReadVp { address, count }.encode(crc, &mut request).unwrap();
            let outcome = run(&config, &request, &mut vp, &mut response).unwrap();
            prop_assert_eq!(outcome, DispatchOutcome::Read { address, count });

            // Header, echo, then the words; an odd tail leaves the low byte zeroed
            let words = &response[READ_DATA_OFFSET..READ_DATA_OFFSET + 2 * count as usize];
            prop_assert_eq!(&words[..payload.len()], &payload[..]);
            if payload.len() % 2 == 1 {
                prop_assert_eq!(words[payload.len()], 0);
            }
            prop_assert_eq!(response[3], 0x83);
            prop_assert_eq!(&response[4..6], &address.to_be_bytes());
            prop_assert_eq!(response[6], count);

            let extra = if crc { 2 } else { 0 };
            prop_assert_eq!(response[2] as usize, 2 * count as usize + 4 + extra);
            prop_assert_eq!(response.len(), 3 + response[2] as usize);
            if crc {
                let (body, trailer) = response.split_at(response.len() - 2);
                prop_assert_eq!(trailer, &crc16(&body[3..]).to_le_bytes());
            }
        }
    }
}
