//! Checksum functions used by the frame codec
//!
//! The codec never hard-codes a CRC algorithm: it is handed a `CrcSuite`,
//! a pair of plain functions, so a peer with different polynomials can be
//! matched without touching the framing code.

use crc::{Crc, CRC_16_IBM_3740, CRC_32_ISO_HDLC};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-16/IBM-3740 (poly 0x1021, init 0xFFFF)
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// CRC-32/ISO-HDLC (the zlib/Ethernet CRC32)
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Pair of checksum functions: 16-bit for headers, 32-bit for payloads
#[derive(Clone, Copy)]
pub struct CrcSuite {
    pub crc16: fn(&[u8]) -> u16,
    pub crc32: fn(&[u8]) -> u32,
}

impl CrcSuite {
    pub const fn new(crc16: fn(&[u8]) -> u16, crc32: fn(&[u8]) -> u32) -> Self {
        CrcSuite { crc16, crc32 }
    }

    #[inline]
    pub fn header(&self, data: &[u8]) -> u16 {
        (self.crc16)(data)
    }

    #[inline]
    pub fn payload(&self, data: &[u8]) -> u32 {
        (self.crc32)(data)
    }
}

impl Default for CrcSuite {
    fn default() -> Self {
        CrcSuite::new(crc16, crc32)
    }
}

impl std::fmt::Debug for CrcSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrcSuite").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_values() {
        // Catalogue check values over "123456789"
        assert_eq!(crc16(b"123456789"), 0x29B1);
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_custom_suite() {
        fn zero16(_: &[u8]) -> u16 {
            0
        }
        fn zero32(_: &[u8]) -> u32 {
            0
        }

        let suite = CrcSuite::new(zero16, zero32);
        assert_eq!(suite.header(b"abc"), 0);
        assert_eq!(suite.payload(b"abc"), 0);

        let standard = CrcSuite::default();
        assert_eq!(standard.header(b"123456789"), 0x29B1);
    }
}
