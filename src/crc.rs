//! CRC-16 used by the module firmware to validate command frames.

use crc::{Crc, CRC_16_XMODEM};

/// Polynomial 0x1021, init 0x0000, MSB-first, no reflection, no output xor.
///
/// The firmware feeds each byte into the top of the register before shifting,
/// which is the XMODEM parameter set.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Checksum of `data` as the module firmware computes it.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
