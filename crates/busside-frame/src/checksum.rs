//! CRC-32 (reflected, polynomial 0xEDB88320) computed a nibble at a time.
//!
//! The 16-entry table trades a little speed for a table small enough to live
//! in the programmer's firmware too; the result is bit-identical to the usual
//! 256-entry CRC-32.

#[rustfmt::skip]
const CRC_TABLE: [u32; 16] = [
    0x0000_0000, 0x1db7_1064, 0x3b6e_20c8, 0x26d9_30ac,
    0x76dc_4190, 0x6b6b_51f4, 0x4db2_6158, 0x5005_713c,
    0xedb8_8320, 0xf00f_9344, 0xd6d6_a3e8, 0xcb61_b38c,
    0x9b64_c2b0, 0x86d3_d2d4, 0xa00a_e278, 0xbdbd_f21c,
];

/// Incremental CRC-32 state.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Start a new checksum (seeded with all ones).
    pub const fn new() -> Self {
        Self { state: !0 }
    }

    /// Feed more bytes.
    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        for &byte in bytes {
            self.state = update_byte(self.state, byte);
        }
        self
    }

    /// Final (complemented) checksum.
    pub fn finish(&self) -> u32 {
        !self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-32 of `bytes`.
pub fn checksum(bytes: &[u8]) -> u32 {
    Crc32::new().update(bytes).finish()
}

#[inline]
fn update_byte(crc: u32, byte: u8) -> u32 {
    let byte = u32::from(byte);
    let crc = CRC_TABLE[((crc ^ byte) & 0x0f) as usize] ^ (crc >> 4);
    CRC_TABLE[((crc ^ (byte >> 4)) & 0x0f) as usize] ^ (crc >> 4)
}
