use crate::cipher::Cipher;

// Plain ASCII on purpose: the whole archive must survive any text pipeline.
pub const MAGIC: &str = "MXPSQL's Portable Archive";

/// Highest format version this library reads, and the version it writes.
pub const WRITER_VERSION: u64 = 1;

/// Structural characters of the text format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    pub magic_sep: u8,
    pub meta_sep: u8,
    pub entry_sep: u8,
    pub comment: u8,
    pub begin_entry: u8,
    pub checksum_sep: u8,
    pub end_entry: u8,
    pub end_file: u8,
}

pub const MARKERS: Markers = Markers {
    magic_sep: b';',
    meta_sep: b'$',
    entry_sep: b'\n',
    comment: b'#',
    begin_entry: b'>',
    checksum_sep: b'%',
    end_entry: b'@',
    end_file: b'~',
};

impl Markers {
    /// The two-byte footer, `@~`.
    pub const fn footer(&self) -> [u8; 2] {
        [self.end_entry, self.end_file]
    }
}

impl Default for Markers {
    fn default() -> Self {
        MARKERS
    }
}

/// The parsed `MAGIC;<version>$<metadata>>` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArchiveHeader {
    pub(crate) version: u64,
    pub(crate) ciphers: Vec<Cipher>,
}

impl ArchiveHeader {
    pub(crate) fn new(ciphers: Vec<Cipher>) -> ArchiveHeader {
        ArchiveHeader {
            version: WRITER_VERSION,
            ciphers,
        }
    }
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        ArchiveHeader::new(Vec::new())
    }
}
