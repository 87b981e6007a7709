//! Variable Pointer (VP) memory access
//!
//! The display coprocessor exposes a register file addressed in 16-bit
//! words. Every VP address names one word; data crosses this interface as
//! big-endian byte pairs, the same order used on the UART link.

/// VP memory error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VpError {
    /// Address range not backed by memory
    OutOfRange { address: u16, words: usize },
}

/// Word-addressed VP memory
pub trait VpMemory {
    /// Read `out.len() / 2` consecutive words starting at `address`
    ///
    /// Each word is stored big-endian. A trailing odd byte in `out` is left
    /// untouched.
    fn read_words(&mut self, address: u16, out: &mut [u8]) -> Result<(), VpError>;

    /// Write `bytes` starting at `address`, two bytes per word, big-endian
    ///
    /// An odd trailing byte becomes the high byte of the last word; its low
    /// byte is preserved.
    fn write_bytes(&mut self, address: u16, bytes: &[u8]) -> Result<(), VpError>;

    /// Read a single word
    fn read_word(&mut self, address: u16) -> Result<u16, VpError> {
        let mut buf = [0u8; 2];
        self.read_words(address, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Write a single word
    fn write_word(&mut self, address: u16, value: u16) -> Result<(), VpError> {
        self.write_bytes(address, &value.to_be_bytes())
    }
}

impl<T: VpMemory + ?Sized> VpMemory for &mut T {
    fn read_words(&mut self, address: u16, out: &mut [u8]) -> Result<(), VpError> {
        T::read_words(self, address, out)
    }

    fn write_bytes(&mut self, address: u16, bytes: &[u8]) -> Result<(), VpError> {
        T::write_bytes(self, address, bytes)
    }
}
