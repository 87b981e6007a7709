//! CRC16 used by CRC-enabled links
//!
//! CRC-16/MODBUS: reflected polynomial 0xA001, initial value 0xFFFF, no final
//! XOR. On the wire the result is sent low byte first.

/// Reflected generator polynomial
const POLY: u16 = 0xA001;

/// Initial register value
const INIT: u16 = 0xFFFF;

/// Lookup table, one entry per possible low byte of the running value
static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC16 of `data`
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(INIT, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ byte as u16) & 0x00FF) as usize]
    })
}

/// Compute the CRC16 of `data` and return it in wire order (low byte first)
pub fn crc16_le_bytes(data: &[u8]) -> [u8; 2] {
    crc16(data).to_le_bytes()
}
