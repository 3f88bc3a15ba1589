mod archive;
pub mod base64;
mod cipher;
pub mod crc32;
#[cfg(feature = "reader")]
mod de;
mod error;
pub mod hashing;
mod header;
pub mod json;
pub mod path;
mod record;
#[cfg(feature = "writer")]
mod ser;
pub mod store;

pub use archive::{
    Archive, DirLister, DirMaker, ExtractOptions, ExtractStats, PushOptions, SortMode,
};
pub use cipher::{constants, rot_in_place, xor_in_place, Cipher, CipherConfig, KeyChange};
#[cfg(feature = "reader")]
pub use de::{BlobChecksum, ParseOptions};
pub use error::{status_message, Error, ErrorKind, Result};
pub use header::{Markers, MAGIC, MARKERS, WRITER_VERSION};
pub use record::BlobRecord;
