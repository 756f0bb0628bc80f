//! CRC-16 used by the packet protocol
//!
//! Reflected CCITT polynomial (0x8408), seed 0xFFFF, result complemented.
//! This is the CRC-16/X-25 variant; the display rejects anything else.

/// Reflected polynomial
const POLY: u16 = 0x8408;

/// Lookup table, built at compile time
pub const CRC_TABLE: [u16; 256] = build_table();

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

#[inline]
fn update(crc: u16, byte: u8) -> u16 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u16) & 0xFF) as usize]
}

/// CRC over an arbitrary byte sequence
pub fn crc16(bytes: &[u8]) -> u16 {
    !bytes.iter().fold(0xFFFF, |crc, &b| update(crc, b))
}

/// CRC of a frame: command byte, length byte, then payload.
///
/// Callers guarantee `data.len() <= MAX_DATA_SIZE`, so the length fits a byte.
pub fn frame_crc(command: u8, data: &[u8]) -> u16 {
    let crc = update(0xFFFF, command);
    let crc = update(crc, data.len() as u8);
    !data.iter().fold(crc, |crc, &b| update(crc, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_device_table() {
        assert_eq!(CRC_TABLE[0], 0x0000);
        assert_eq!(CRC_TABLE[1], 0x1189);
        assert_eq!(CRC_TABLE[2], 0x2312);
        assert_eq!(CRC_TABLE[16], 0x1081);
        assert_eq!(CRC_TABLE[128], 0x8408);
        assert_eq!(CRC_TABLE[255], 0x0F78);
    }

    #[test]
    fn test_check_value() {
        // Standard X-25 check value
        assert_eq!(crc16(b"123456789"), 0x906E);
    }

    #[test]
    fn test_frame_crc_matches_flat_crc() {
        let data = [0x4B];
        assert_eq!(frame_crc(0x0D, &data), crc16(&[0x0D, 0x01, 0x4B]));
        assert_eq!(frame_crc(0x4D, &[]), crc16(&[0x4D, 0x00]));
    }

    #[test]
    fn test_deterministic() {
        let payload = b"Hello";
        assert_eq!(frame_crc(0x1F, payload), frame_crc(0x1F, payload));
        assert_ne!(frame_crc(0x1F, payload), frame_crc(0x1F, b"Hellp"));
    }
}
