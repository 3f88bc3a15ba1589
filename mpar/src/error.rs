use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot open archive `{}`", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: mpar_format::Error,
    },

    #[error("Cannot write archive `{}`", .path.display())]
    WriteArchive {
        path: PathBuf,
        #[source]
        source: mpar_format::Error,
    },

    #[error("Archive already exists: `{}`; use -f/--force to overwrite", .path.display())]
    ArchiveExists { path: PathBuf },

    #[error("No files specified to add to archive")]
    NoFilesSpecified,

    #[error("Cowardly refusing to recursively archive self: `{}`", .path.display())]
    ArchiveSelf { path: PathBuf },

    #[error("Cannot handle path `{}`", .path.display())]
    InvalidPath { path: PathBuf },

    #[error("Cannot process directory `{}`", .path.display())]
    ProcessDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read file `{}`", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot add `{name}` to archive")]
    AddFile {
        name: String,
        #[source]
        source: mpar_format::Error,
    },

    #[error("Cannot determine the current directory")]
    CurrentDir {
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create directory `{}`", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot extract files")]
    Extract {
        #[source]
        source: mpar_format::Error,
    },

    #[error("Cannot delete `{name}` from archive")]
    Delete {
        name: String,
        #[source]
        source: mpar_format::Error,
    },

    #[error("Cannot print listing")]
    Listing {
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// The archive-level failure behind this error, if any.
    pub fn archive_kind(&self) -> Option<mpar_format::ErrorKind> {
        match self {
            Error::OpenArchive { source, .. }
            | Error::WriteArchive { source, .. }
            | Error::AddFile { source, .. }
            | Error::Extract { source }
            | Error::Delete { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}
