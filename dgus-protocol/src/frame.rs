//! Frame assembly for the DGUS VP protocol.
//!
//! Frame format:
//! - HEADER (2 bytes): 0x5A 0xA5
//! - LENGTH (1 byte): bytes following the length field (3..=MAX_FRAME_LEN)
//! - COMMAND (1 byte): 0x82 write VP, 0x83 read VP, 0x80/0x81 reserved
//! - ADDRESS (2 bytes): big-endian VP word address
//! - PAYLOAD: write data, or the word count for a read
//! - CRC16 (2 bytes, optional): low byte first, only on CRC-enabled links
//!
//! The assembler only enforces framing. Whether the trailing bytes carry a
//! CRC is a per-port decision made when the frame is dispatched.

/// First header byte
pub const HEADER_1: u8 = 0x5A;

/// Second header byte
pub const HEADER_2: u8 = 0xA5;

/// Smallest accepted LENGTH byte (command + address)
pub const MIN_FRAME_LEN: u8 = 3;

/// Largest accepted LENGTH value, the whole range of the LENGTH byte
pub const MAX_FRAME_LEN: u8 = u8::MAX;

/// Size of the per-port frame buffer
pub const FRAME_BUFFER_SIZE: usize = 264;

/// Bytes preceding the counted part of a frame (header + length)
pub const PREAMBLE_SIZE: usize = 3;

/// Offset of the command byte
pub const COMMAND_OFFSET: usize = 3;

/// Offset of the first payload byte
pub const PAYLOAD_OFFSET: usize = 6;

/// Extra bytes implied by the reserved 0x80/0x81 commands
const RESERVED_LEN_ADJUST: usize = 2;

// The longest frame any LENGTH byte can announce fits the buffer, so
// storing a byte of an accepted frame never runs out of room
const _: () =
    assert!(PREAMBLE_SIZE + MAX_FRAME_LEN as usize + RESERVED_LEN_ADJUST <= FRAME_BUFFER_SIZE);

/// Errors raised while assembling or interpreting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Second header byte did not follow the first
    Resync,
    /// LENGTH byte below MIN_FRAME_LEN
    LengthOutOfRange(u8),
    /// Command byte is not one the assembler accepts
    UnknownCommand(u8),
    /// Frame is too short for its command
    Truncated,
    /// Trailing CRC does not match the frame body
    CrcMismatch,
    /// Response would not fit in one frame
    ResponseTooLarge,
}

/// Position of the assembler within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssemblerState {
    /// Discarding bytes until HEADER_1
    Idle,
    /// Got HEADER_1, waiting for HEADER_2
    GotHeader1,
    /// Got both header bytes, waiting for LENGTH
    GotHeader2,
    /// Got LENGTH, waiting for COMMAND
    GotLength,
    /// Got COMMAND, waiting for the address high byte
    GotCommand,
    /// Got the address high byte, waiting for the low byte
    GotAddrHigh,
    /// Address complete, accumulating payload
    GotAddrLow,
    /// A complete frame is held in the buffer
    Done,
}

/// A complete frame borrowed from the assembler buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Wrap raw frame bytes
    ///
    /// Returns `None` unless the slice starts with the header and holds
    /// exactly the number of bytes its LENGTH field declares.
    pub fn from_bytes(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < PAYLOAD_OFFSET || bytes[0] != HEADER_1 || bytes[1] != HEADER_2 {
            return None;
        }
        if bytes.len() != bytes[2] as usize + PREAMBLE_SIZE {
            return None;
        }
        Some(Self { bytes })
    }

    /// All bytes of the frame, header included
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// LENGTH field as received
    pub fn length(&self) -> u8 {
        self.bytes[2]
    }

    /// Command byte
    pub fn command(&self) -> u8 {
        self.bytes[COMMAND_OFFSET]
    }

    /// Big-endian VP address
    pub fn address(&self) -> u16 {
        u16::from_be_bytes([self.bytes[4], self.bytes[5]])
    }

    /// Bytes after the address, CRC trailer included if present
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[PAYLOAD_OFFSET..]
    }

    /// Bytes covered by the CRC when the trailing two bytes are a CRC
    pub fn crc_body(&self) -> Option<&'a [u8]> {
        let end = self.bytes.len().checked_sub(2)?;
        if end <= COMMAND_OFFSET {
            return None;
        }
        Some(&self.bytes[COMMAND_OFFSET..end])
    }

    /// Trailing two bytes read as a little-endian CRC
    pub fn crc_trailer(&self) -> Option<u16> {
        let n = self.bytes.len();
        if n < PAYLOAD_OFFSET + 2 {
            return None;
        }
        Some(u16::from_le_bytes([self.bytes[n - 2], self.bytes[n - 1]]))
    }
}

/// Byte-at-a-time frame assembler
///
/// One instance per port. Bytes are fed in arrival order; once a frame is
/// complete the assembler stops in [`AssemblerState::Done`] until the caller
/// has consumed the frame and called [`FrameAssembler::reset`].
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    state: AssemblerState,
    buffer: [u8; FRAME_BUFFER_SIZE],
    index: usize,
    expected: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an idle assembler
    pub const fn new() -> Self {
        Self {
            state: AssemblerState::Idle,
            buffer: [0; FRAME_BUFFER_SIZE],
            index: 0,
            expected: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Return to Idle, discarding any partial frame
    pub fn reset(&mut self) {
        self.state = AssemblerState::Idle;
        self.index = 0;
        self.expected = 0;
    }

    /// The completed frame, if the assembler is in `Done`
    pub fn frame(&self) -> Option<Frame<'_>> {
        if self.state != AssemblerState::Done {
            return None;
        }
        Some(Frame {
            bytes: &self.buffer[..self.index],
        })
    }

    fn store(&mut self, byte: u8) {
        self.buffer[self.index] = byte;
        self.index += 1;
    }

    fn check_complete(&mut self) -> bool {
        if self.index == self.expected {
            self.state = AssemblerState::Done;
            true
        } else {
            false
        }
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(true)` when this byte completed a frame, `Ok(false)` when
    /// more bytes are needed, or `Err` when the partial frame was abandoned.
    /// Feeding a byte while in `Done` discards the held frame first.
    pub fn feed(&mut self, byte: u8) -> Result<bool, FrameError> {
        match self.state {
            AssemblerState::Idle | AssemblerState::Done => {
                self.reset();
                if byte == HEADER_1 {
                    self.store(byte);
                    self.state = AssemblerState::GotHeader1;
                }
                // Silently ignore everything else while hunting for a header
                Ok(false)
            }
            AssemblerState::GotHeader1 => {
                if byte != HEADER_2 {
                    // No re-check for HEADER_1 here: the byte is dropped
                    self.reset();
                    return Err(FrameError::Resync);
                }
                self.store(byte);
                self.state = AssemblerState::GotHeader2;
                Ok(false)
            }
            AssemblerState::GotHeader2 => {
                if byte < MIN_FRAME_LEN {
                    self.reset();
                    return Err(FrameError::LengthOutOfRange(byte));
                }
                self.store(byte);
                self.expected = byte as usize + PREAMBLE_SIZE;
                self.state = AssemblerState::GotLength;
                Ok(false)
            }
            AssemblerState::GotLength => match byte {
                0x82 | 0x83 => {
                    self.store(byte);
                    self.state = AssemblerState::GotCommand;
                    Ok(false)
                }
                0x80 | 0x81 => {
                    self.expected += RESERVED_LEN_ADJUST;
                    self.store(byte);
                    self.state = AssemblerState::GotAddrLow;
                    Ok(false)
                }
                other => {
                    self.reset();
                    Err(FrameError::UnknownCommand(other))
                }
            },
            AssemblerState::GotCommand => {
                self.store(byte);
                self.state = AssemblerState::GotAddrHigh;
                Ok(false)
            }
            AssemblerState::GotAddrHigh => {
                self.store(byte);
                self.state = AssemblerState::GotAddrLow;
                Ok(self.check_complete())
            }
            AssemblerState::GotAddrLow => {
                // Payload is opaque: header bytes here do not restart framing
                self.store(byte);
                Ok(self.check_complete())
            }
        }
    }

    /// Feed bytes until a frame completes
    ///
    /// Returns the number of bytes consumed and whether a frame is ready.
    /// Bytes after a complete frame are left unconsumed. Framing errors are
    /// absorbed: the assembler resets and keeps scanning.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> (usize, bool) {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Ok(true) = self.feed(byte) {
                return (i + 1, true);
            }
        }
        (bytes.len(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed_all(asm: &mut FrameAssembler, bytes: &[u8]) -> usize {
        let mut completed = 0;
        for &b in bytes {
            if let Ok(true) = asm.feed(b) {
                completed += 1;
            }
        }
        completed
    }

    #[test]
    fn test_write_frame_assembles() {
        let bytes = [0x5A, 0xA5, 0x05, 0x82, 0x10, 0x00, 0x12, 0x34];
        let mut asm = FrameAssembler::new();
        assert_eq!(feed_all(&mut asm, &bytes), 1);

        let frame = asm.frame().unwrap();
        assert_eq!(frame.as_bytes(), &bytes);
        assert_eq!(frame.command(), 0x82);
        assert_eq!(frame.address(), 0x1000);
        assert_eq!(frame.payload(), &[0x12, 0x34]);
    }

    #[test]
    fn test_minimum_length_completes_after_address() {
        let bytes = [0x5A, 0xA5, 0x03, 0x82, 0x00, 0x00];
        let mut asm = FrameAssembler::new();
        assert_eq!(feed_all(&mut asm, &bytes), 1);
        assert_eq!(asm.state(), AssemblerState::Done);
        assert!(asm.frame().unwrap().payload().is_empty());
    }

    #[test]
    fn test_length_below_minimum_rejected() {
        let mut asm = FrameAssembler::new();
        asm.feed(0x5A).unwrap();
        asm.feed(0xA5).unwrap();
        assert_eq!(asm.feed(0x02), Err(FrameError::LengthOutOfRange(0x02)));
        assert_eq!(asm.state(), AssemblerState::Idle);
    }

    #[test]
    fn test_bad_second_header_drops_byte() {
        let mut asm = FrameAssembler::new();
        asm.feed(0x5A).unwrap();
        // A second 0x5A is not taken as a new frame start
        assert_eq!(asm.feed(0x5A), Err(FrameError::Resync));
        assert_eq!(asm.state(), AssemblerState::Idle);

        // So "5A 5A A5 ..." loses the frame
        let bytes = [0x5A, 0x5A, 0xA5, 0x04, 0x83, 0x00, 0x14, 0x01];
        let mut asm = FrameAssembler::new();
        assert_eq!(feed_all(&mut asm, &bytes), 0);
    }

    #[test]
    fn test_unknown_command_resets() {
        let mut asm = FrameAssembler::new();
        for b in [0x5A, 0xA5, 0x04] {
            asm.feed(b).unwrap();
        }
        assert_eq!(asm.feed(0x84), Err(FrameError::UnknownCommand(0x84)));
        assert_eq!(asm.state(), AssemblerState::Idle);
    }

    #[test]
    fn test_reserved_command_adds_two_bytes() {
        // LENGTH 3 + 2 implied bytes: 8 bytes in total after the header
        let bytes = [0x5A, 0xA5, 0x03, 0x80, 0x01, 0x02, 0x03, 0x04];
        let mut asm = FrameAssembler::new();
        for &b in &bytes[..7] {
            assert_eq!(asm.feed(b), Ok(false));
        }
        assert_eq!(asm.feed(bytes[7]), Ok(true));
        assert_eq!(asm.frame().unwrap().as_bytes().len(), 8);
    }

    #[test]
    fn test_longest_frames_fit_buffer() {
        for command in [0x82u8, 0x80] {
            let mut bytes = std::vec![HEADER_1, HEADER_2, MAX_FRAME_LEN, command];
            let extra = if command == 0x80 { 2 } else { 0 };
            bytes.resize(PREAMBLE_SIZE + MAX_FRAME_LEN as usize + extra, 0xEE);

            let mut asm = FrameAssembler::new();
            for &b in &bytes[..bytes.len() - 1] {
                assert_eq!(asm.feed(b), Ok(false));
            }
            assert_eq!(asm.feed(bytes[bytes.len() - 1]), Ok(true));
            assert_eq!(asm.frame().unwrap().as_bytes(), &bytes[..]);
        }
    }

    #[test]
    fn test_header_in_payload_is_data() {
        let bytes = [0x5A, 0xA5, 0x07, 0x82, 0x00, 0x20, 0x5A, 0xA5, 0x03, 0x82];
        let mut asm = FrameAssembler::new();
        assert_eq!(feed_all(&mut asm, &bytes), 1);
        assert_eq!(asm.frame().unwrap().payload(), &[0x5A, 0xA5, 0x03, 0x82]);
    }

    #[test]
    fn test_feed_bytes_stops_after_frame() {
        let bytes = [
            0x00, 0x5A, 0xA5, 0x04, 0x83, 0x00, 0x14, 0x02, // read frame
            0x5A, 0xA5, // start of the next one
        ];
        let mut asm = FrameAssembler::new();
        let (used, done) = asm.feed_bytes(&bytes);
        assert!(done);
        assert_eq!(used, 8);
        assert_eq!(asm.frame().unwrap().address(), 0x0014);
    }

    #[test]
    fn test_resync_after_garbage() {
        let bytes = [0xFF, 0x12, 0x5A, 0x00, 0x5A, 0xA5, 0x04, 0x83, 0x01, 0x00, 0x01];
        let mut asm = FrameAssembler::new();
        assert_eq!(feed_all(&mut asm, &bytes), 1);
        assert_eq!(asm.frame().unwrap().address(), 0x0100);
    }

    #[test]
    fn test_frame_from_bytes_checks_length() {
        assert!(Frame::from_bytes(&[0x5A, 0xA5, 0x03, 0x82, 0x00, 0x00]).is_some());
        assert!(Frame::from_bytes(&[0x5A, 0xA5, 0x04, 0x82, 0x00, 0x00]).is_none());
        assert!(Frame::from_bytes(&[0xA5, 0x5A, 0x03, 0x82, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_crc_accessors() {
        let bytes = [0x5A, 0xA5, 0x06, 0x83, 0x00, 0x14, 0x02, 0xA7, 0x61];
        let frame = Frame::from_bytes(&bytes).unwrap();
        assert_eq!(frame.crc_body(), Some(&bytes[3..7]));
        assert_eq!(frame.crc_trailer(), Some(0x61A7));
    }

    proptest! {
        #[test]
        fn prop_write_frame_roundtrip(
            address in any::<u16>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=200),
            noise in proptest::collection::vec(any::<u8>().prop_filter("not header", |b| *b != HEADER_1), 0..16),
        ) {
            let mut bytes = std::vec::Vec::new();
            bytes.extend_from_slice(&noise);
            let start = bytes.len();
            bytes.extend_from_slice(&[HEADER_1, HEADER_2, (payload.len() + 3) as u8, 0x82]);
            bytes.extend_from_slice(&address.to_be_bytes());
            bytes.extend_from_slice(&payload);

            let mut asm = FrameAssembler::new();
            let (used, done) = asm.feed_bytes(&bytes);
            prop_assert!(done);
            prop_assert_eq!(used, bytes.len());

            let frame = asm.frame().unwrap();
            prop_assert_eq!(frame.as_bytes(), &bytes[start..]);
            prop_assert_eq!(frame.address(), address);
            prop_assert_eq!(frame.payload(), &payload[..]);
        }
    }
}
