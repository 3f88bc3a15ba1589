use std::io;
use std::path::{Component, Path, PathBuf};

use jwalk::WalkDir;
use mpar_format::{Archive, CipherConfig, DirLister, ParseOptions, SortMode};
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Archive settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Settings {
    pub xor_key: Option<Vec<u8>>,
    pub rot_key: Option<Vec<i32>>,
    pub sort: SortMode,
    pub strict: bool,
}

impl Settings {
    pub fn new_archive(&self) -> Archive {
        let mut archive =
            Archive::with_ciphers(CipherConfig::new(self.xor_key.clone(), self.rot_key.clone()));
        archive.set_sort_mode(self.sort);
        archive
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            strict: self.strict,
            ..Default::default()
        }
    }

    pub fn open_archive(&self, path: &Path, options: ParseOptions) -> Result<Archive> {
        let mut archive = self.new_archive();
        archive
            .parse_path(path, options)
            .map_err(|source| Error::OpenArchive {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), entries = archive.len(), "opened archive");
        Ok(archive)
    }
}

pub fn write_archive(archive: &Archive, path: &Path) -> Result<()> {
    archive
        .construct_path(path)
        .map_err(|source| Error::WriteArchive {
            path: path.to_path_buf(),
            source,
        })
}

#[inline(always)]
pub fn format_size(size: u64) -> String {
    use humansize::{file_size_opts as options, FileSize};

    size.file_size(options::BINARY)
        .unwrap_or_else(|_| size.to_string())
}

/// Lists regular files with `jwalk`, in sorted order.
pub struct WalkLister;

impl DirLister for WalkLister {
    fn list_dir(&mut self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        let depth = if recursive { usize::MAX } else { 1 };
        let mut files = vec![];

        for entry in WalkDir::new(path).max_depth(depth).sort(true) {
            let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            if entry.file_type().is_file() {
                files.push(entry.path());
            }
        }

        Ok(files)
    }
}

/// Expands directories in `paths` to the files below them.
pub fn collect_files(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut lister = WalkLister;
    let mut files = vec![];

    for path in paths {
        if path.is_dir() {
            let found = lister
                .list_dir(path, recursive)
                .map_err(|source| Error::ProcessDirectory {
                    path: path.clone(),
                    source,
                })?;
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    Ok(files)
}

/// Entry name for a file on disk. Absolute paths are made relative to `cwd`
/// when they live below it, otherwise their root is dropped.
pub fn entry_key(path: &Path, cwd: &Path) -> Result<String> {
    let relative = if path.is_absolute() {
        match pathdiff::diff_paths(path, cwd) {
            Some(diff) if !matches!(diff.components().next(), Some(Component::ParentDir)) => diff,
            _ => path
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect(),
        }
    } else {
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    };

    mpar_format::path::entry_name(&relative, false)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::InvalidPath {
            path: path.to_path_buf(),
        })
}

/// Reads every file in parallel. The result keeps the order of `files`.
pub fn read_files(files: &[PathBuf]) -> Result<Vec<(PathBuf, Vec<u8>)>> {
    files
        .par_iter()
        .map(|path| {
            std::fs::read(path)
                .map(|bytes| (path.clone(), bytes))
                .map_err(|source| Error::ReadFile {
                    path: path.clone(),
                    source,
                })
        })
        .collect()
}

/// Reads `paths` (expanding directories) and pushes them into `archive`.
/// Returns the number of entries added.
pub fn add_files(
    archive: &mut Archive,
    archive_path: &Path,
    paths: &[PathBuf],
    recursive: bool,
    overwrite: bool,
) -> Result<usize> {
    if paths.is_empty() {
        return Err(Error::NoFilesSpecified);
    }

    let cwd = std::env::current_dir().map_err(|source| Error::CurrentDir { source })?;
    let own = archive_path.canonicalize().ok();
    let files = collect_files(paths, recursive)?;

    if let Some(own) = own {
        for file in &files {
            if file.canonicalize().ok().as_ref() == Some(&own) {
                return Err(Error::ArchiveSelf { path: file.clone() });
            }
        }
    }

    let contents = read_files(&files)?;
    let options = mpar_format::PushOptions {
        overwrite,
        strip_dir: false,
    };

    for (path, bytes) in &contents {
        let name = entry_key(path, &cwd)?;
        tracing::debug!(name = %name, bytes = bytes.len(), "adding");
        archive
            .push_with(&name, bytes, options)
            .map_err(|source| Error::AddFile { name, source })?;
    }

    Ok(contents.len())
}
