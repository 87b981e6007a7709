//! RAM-backed VP memory
//!
//! Emulates the coprocessor's register file: storage is an array of 32-bit
//! cells, each holding two VP words. An even address selects the upper half
//! of its cell, an odd address the lower half.

use dgus_hal::{VpError, VpMemory};

/// VP memory backed by `CELLS` 32-bit cells (`2 * CELLS` words)
#[derive(Debug, Clone)]
pub struct VpRam<const CELLS: usize> {
    cells: [u32; CELLS],
}

impl<const CELLS: usize> Default for VpRam<CELLS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CELLS: usize> VpRam<CELLS> {
    /// Zeroed memory
    pub const fn new() -> Self {
        Self { cells: [0; CELLS] }
    }

    /// Number of addressable words
    pub const fn words(&self) -> usize {
        CELLS * 2
    }

    /// Raw 32-bit cell holding `address`
    pub fn cell(&self, address: u16) -> Option<u32> {
        self.cells.get(address as usize / 2).copied()
    }

    fn check(&self, address: u16, words: usize) -> Result<(), VpError> {
        if address as usize + words > self.words() {
            return Err(VpError::OutOfRange { address, words });
        }
        Ok(())
    }

    fn load(&self, address: usize) -> u16 {
        let cell = self.cells[address / 2];
        if address % 2 == 0 {
            (cell >> 16) as u16
        } else {
            cell as u16
        }
    }

    fn store(&mut self, address: usize, value: u16) {
        let cell = &mut self.cells[address / 2];
        *cell = if address % 2 == 0 {
            (*cell & 0x0000_FFFF) | ((value as u32) << 16)
        } else {
            (*cell & 0xFFFF_0000) | value as u32
        };
    }
}

impl<const CELLS: usize> VpMemory for VpRam<CELLS> {
    fn read_words(&mut self, address: u16, out: &mut [u8]) -> Result<(), VpError> {
        let words = out.len() / 2;
        self.check(address, words)?;
        for (i, pair) in out.chunks_exact_mut(2).enumerate() {
            pair.copy_from_slice(&self.load(address as usize + i).to_be_bytes());
        }
        Ok(())
    }

    fn write_bytes(&mut self, address: u16, bytes: &[u8]) -> Result<(), VpError> {
        let words = bytes.len().div_ceil(2);
        self.check(address, words)?;
        for (i, chunk) in bytes.chunks(2).enumerate() {
            let at = address as usize + i;
            let value = match *chunk {
                [hi, lo] => u16::from_be_bytes([hi, lo]),
                [hi] => (self.load(at) & 0x00FF) | ((hi as u16) << 8),
                _ => continue,
            };
            self.store(at, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_slots() {
        let mut vp = VpRam::<16>::new();
        vp.write_word(0x0014, 0x1234).unwrap();
        vp.write_word(0x0015, 0xABCD).unwrap();
        assert_eq!(vp.cell(0x0014), Some(0x1234_ABCD));
        assert_eq!(vp.read_word(0x0014).unwrap(), 0x1234);
        assert_eq!(vp.read_word(0x0015).unwrap(), 0xABCD);
    }

    #[test]
    fn test_unaligned_block() {
        let mut vp = VpRam::<16>::new();
        vp.write_bytes(0x0003, &[0x00, 0x01, 0x00, 0x02, 0x00, 0x03])
            .unwrap();
        let mut out = [0u8; 6];
        vp.read_words(0x0003, &mut out).unwrap();
        assert_eq!(out, [0x00, 0x01, 0x00, 0x02, 0x00, 0x03]);
        assert_eq!(vp.cell(0x0002), Some(0x0000_0001));
        assert_eq!(vp.cell(0x0004), Some(0x0002_0003));
    }

    #[test]
    fn test_odd_byte_keeps_low_half() {
        let mut vp = VpRam::<4>::new();
        vp.write_word(0x0001, 0x00FF).unwrap();
        vp.write_bytes(0x0001, &[0x7E]).unwrap();
        assert_eq!(vp.read_word(0x0001).unwrap(), 0x7EFF);
    }

    #[test]
    fn test_out_of_range() {
        let mut vp = VpRam::<4>::new();
        let mut out = [0u8; 4];
        assert_eq!(
            vp.read_words(0x0007, &mut out),
            Err(VpError::OutOfRange {
                address: 0x0007,
                words: 2
            })
        );
        assert!(vp.write_bytes(0x0008, &[1]).is_err());
        assert!(vp.read_words(0x0006, &mut out).is_ok());
    }

    #[test]
    fn test_empty_access() {
        let mut vp = VpRam::<4>::new();
        assert!(vp.write_bytes(0x0008, &[]).is_ok());
        assert!(vp.read_words(0x0008, &mut []).is_ok());
    }
}
