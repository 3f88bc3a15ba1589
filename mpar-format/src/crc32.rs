//! Streaming CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`).

const POLYNOMIAL: u32 = 0xEDB8_8320;

const TABLE: [u32; 256] = make_table();

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

#[inline]
pub const fn init() -> u32 {
    0xFFFF_FFFF
}

pub fn update(mut crc: u32, bytes: &[u8]) -> u32 {
    for &byte in bytes {
        crc = TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

#[inline]
pub const fn finalize(crc: u32) -> u32 {
    crc ^ 0xFFFF_FFFF
}

/// One-shot checksum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u32 {
    finalize(update(init(), bytes))
}

#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    pub const fn new() -> Crc32 {
        Crc32 { state: init() }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.state = update(self.state, bytes);
    }

    /// The checksum of everything fed so far. Does not reset the state.
    pub const fn value(&self) -> u32 {
        finalize(self.state)
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Crc32::new()
    }
}
