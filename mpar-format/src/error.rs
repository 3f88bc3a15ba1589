use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::base64::Base64Error;
use crate::cipher::Cipher;
use crate::json::JsonError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of failure categories an archive operation can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Invalid,
    KeyNotExists,
    KeyExists,
    OutOfMemory,
    NotArchive,
    ArchiveTooNew,
    Checksum,
    NoCrypt,
    ConstructFail,
    OpPartial,
    FileError,
    Internal,
    Unknown,
}

impl ErrorKind {
    pub const fn message(self) -> &'static str {
        use ErrorKind::*;

        match self {
            Invalid => "Invalid argument or state",
            KeyNotExists => "Entry does not exist",
            KeyExists => "Entry already exists",
            OutOfMemory => "Out of memory",
            NotArchive => "Not an MPAR archive",
            ArchiveTooNew => "Archive was written by a newer version",
            Checksum => "Checksum mismatch, archive may be corrupted",
            NoCrypt => "Archive is encrypted with a cipher that is not configured",
            ConstructFail => "Failed to construct archive",
            OpPartial => "Operation incomplete, a directory must be created",
            FileError => "File I/O failed",
            Internal => "Internal error",
            Unknown => "Unknown error",
        }
    }

    /// Writes `<prefix>: <message>` followed by a newline, or just the message
    /// when `prefix` is empty.
    pub fn write_message<W: io::Write>(self, mut writer: W, prefix: &str) -> io::Result<()> {
        if prefix.is_empty() {
            writeln!(writer, "{}", self.message())
        } else {
            writeln!(writer, "{}: {}", prefix, self.message())
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Message for an optional status, where `None` stands for success.
pub fn status_message(status: Option<ErrorKind>) -> &'static str {
    match status {
        Some(kind) => kind.message(),
        None => "Success",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    Invalid(String),

    #[error("Entry does not exist: `{0}`")]
    KeyNotExists(String),

    #[error("Entry already exists: `{0}`")]
    KeyExists(String),

    #[error("Out of memory")]
    OutOfMemory(#[source] Option<std::collections::TryReserveError>),

    #[error("Not an MPAR archive: {0}")]
    NotArchive(String),

    #[error("Archive version {found} is newer than supported version {supported}")]
    ArchiveTooNew { found: u64, supported: u64 },

    #[error("Checksum mismatch for {context}. Expected: {expected}, actual: {actual}")]
    Checksum {
        context: String,
        expected: u32,
        actual: u32,
    },

    #[error("Checksum field is not a number: {0}")]
    BadChecksumField(String),

    #[error("Archive requires cipher {0} which is not configured")]
    NoCrypt(Cipher),

    #[error("Failed to construct archive")]
    ConstructFail(#[source] io::Error),

    #[error("Directory must be created before extraction can continue: '{}'", .0.display())]
    OpPartial(PathBuf),

    #[error("File operation failed. Path: '{}'", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O failed")]
    Io(#[from] io::Error),

    #[error("Internal invariant violated: {0}")]
    Internal(&'static str),

    #[error("Unknown error")]
    Unknown,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            Invalid(_) => ErrorKind::Invalid,
            KeyNotExists(_) => ErrorKind::KeyNotExists,
            KeyExists(_) => ErrorKind::KeyExists,
            OutOfMemory(_) => ErrorKind::OutOfMemory,
            NotArchive(_) => ErrorKind::NotArchive,
            ArchiveTooNew { .. } => ErrorKind::ArchiveTooNew,
            Checksum { .. } | BadChecksumField(_) => ErrorKind::Checksum,
            NoCrypt(_) => ErrorKind::NoCrypt,
            ConstructFail(_) => ErrorKind::ConstructFail,
            OpPartial(_) => ErrorKind::OpPartial,
            File { .. } | Io(_) => ErrorKind::FileError,
            Internal(_) => ErrorKind::Internal,
            Unknown => ErrorKind::Unknown,
        }
    }

    /// The directory the caller has to create when the error is `OpPartial`.
    pub fn dir_to_make(&self) -> Option<&std::path::Path> {
        match self {
            Error::OpPartial(path) => Some(path),
            _ => None,
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::File {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OutOfMemory(source) => Error::OutOfMemory(Some(source)),
        }
    }
}

impl From<Base64Error> for Error {
    fn from(err: Base64Error) -> Self {
        Error::Invalid(err.to_string())
    }
}

impl From<JsonError> for Error {
    fn from(err: JsonError) -> Self {
        Error::Invalid(err.to_string())
    }
}
