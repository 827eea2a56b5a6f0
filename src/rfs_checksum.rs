// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                          RFS Checksums
// —————————————————————————————————————————————————————————————————————————————————————————————————

//! Two independent integrity checks:
//! - an 8 bit XOR over the 3 leading header bytes,
//! - a 32 bit CRC over the payload, bit exact with the STM32 CRC peripheral.
//!
//! The peripheral consumes 32 bit words, so the byte stream is fed in groups of 4 with
//! the order reversed inside each group (byte 3, 2, 1, 0). Polynomial 0x04C11DB7, seed
//! 0xFFFFFFFF, no reflection, no final XOR. A trailing partial word is zero padded.

use crate::rfs_shared::*;

pub const CRC32_POLY: u32 = 0x04C1_1DB7;
pub const CRC32_INIT: u32 = 0xFFFF_FFFF;

static CRC32_TABLE: [u32; 256] = build_crc32_table(CRC32_POLY);

const fn build_crc32_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            c = if c & 0x8000_0000 != 0 { (c << 1) ^ poly } else { c << 1 };
            bit += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

// ——————————————————————————————————————— Header Checksum —————————————————————————————————————————

/// XOR of SOF and the two size bytes.
#[inline]
pub fn header_checksum(header: [u8; 3]) -> u8 {
    header[0] ^ header[1] ^ header[2]
}

/// Checksum for a header carrying `payload_size`.
#[inline]
pub fn header_checksum_for(payload_size: u16) -> u8 {
    let [lo, hi] = payload_size.to_le_bytes();
    header_checksum([SOF, lo, hi])
}

/// Checks the XOR byte of a 4 byte header. The marker value itself is not checked here.
#[inline]
pub fn header_is_valid(header: &[u8; HEADER_LEN]) -> bool {
    header_checksum([header[0], header[1], header[2]]) == header[3]
}

// ————————————————————————————————————————————— CRC32 —————————————————————————————————————————————

#[inline(always)]
fn crc32_step(crc: u32, byte: u8) -> u32 {
    (crc << 8) ^ CRC32_TABLE[((crc >> 24) as u8 ^ byte) as usize]
}

/// STM32 peripheral compatible CRC32.
pub fn payload_crc32(data: &[u8]) -> u32 {
    let mut crc = CRC32_INIT;

    let mut words = data.chunks_exact(4);
    for w in &mut words {
        crc = crc32_step(crc, w[3]);
        crc = crc32_step(crc, w[2]);
        crc = crc32_step(crc, w[1]);
        crc = crc32_step(crc, w[0]);
    }

    let tail = words.remainder();
    if !tail.is_empty() {
        let mut w = [0u8; 4];
        w[..tail.len()].copy_from_slice(tail);
        for &b in w.iter().rev() {
            crc = crc32_step(crc, b);
        }
    }

    crc
}
