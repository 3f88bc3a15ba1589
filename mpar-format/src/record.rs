use crate::crc32;

/// One stored entry: its bytes and the CRC-32 computed when they were stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    pub(crate) bytes: Vec<u8>,
    pub(crate) crc: u32,
}

impl BlobRecord {
    pub fn new(bytes: Vec<u8>) -> BlobRecord {
        let crc = crc32::checksum(&bytes);
        BlobRecord { bytes, crc }
    }

    #[inline(always)]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[inline(always)]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline(always)]
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Whether the bytes still hash to the stored checksum.
    pub fn verify(&self) -> bool {
        crc32::checksum(&self.bytes) == self.crc
    }
}
