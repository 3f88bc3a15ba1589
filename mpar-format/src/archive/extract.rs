use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{Archive, PushOptions};
use crate::error::{Error, Result};
use crate::hashing::{HashingReader, HashingWriter};
use crate::path::entry_path;
use crate::record::BlobRecord;

/// Creates a directory (and its parents) when extraction finds one missing.
pub trait DirMaker {
    fn make_dir(&mut self, path: &Path) -> io::Result<()>;
}

impl<F> DirMaker for F
where
    F: FnMut(&Path) -> io::Result<()>,
{
    fn make_dir(&mut self, path: &Path) -> io::Result<()> {
        self(path)
    }
}

/// Lists the files below a directory for [`Archive::read_dir`].
pub trait DirLister {
    fn list_dir(&mut self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>>;
}

impl<F> DirLister for F
where
    F: FnMut(&Path, bool) -> io::Result<Vec<PathBuf>>,
{
    fn list_dir(&mut self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        self(path, recursive)
    }
}

#[derive(Default)]
pub struct ExtractOptions<'a> {
    /// Called with each entry name before it is written.
    pub on_item: Option<&'a mut dyn FnMut(&str)>,
    /// Called once per entry when its parent directory is missing. Without
    /// it, extraction stops with `OpPartial` naming the directory.
    pub mkdir: Option<&'a mut dyn DirMaker>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: u64,
    pub bytes: u64,
}

impl Archive {
    /// Writes every entry below `dest`, in name order.
    pub fn extract<P: AsRef<Path>>(&self, dest: P) -> Result<ExtractStats> {
        self.extract_with(dest, ExtractOptions::default())
    }

    pub fn extract_with<P: AsRef<Path>>(
        &self,
        dest: P,
        options: ExtractOptions<'_>,
    ) -> Result<ExtractStats> {
        let names = self.list();
        self.extract_entries(dest, &names, options)
    }

    /// Writes the named entries below `dest`. Each file is read back after
    /// writing and must hash to the stored checksum.
    pub fn extract_entries<P, S>(
        &self,
        dest: P,
        names: &[S],
        mut options: ExtractOptions<'_>,
    ) -> Result<ExtractStats>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let dest = dest.as_ref();
        let result = (|| -> Result<ExtractStats> {
            let mut stats = ExtractStats::default();

            for name in names {
                let name = name.as_ref();
                if let Some(on_item) = options.on_item.as_mut() {
                    on_item(name);
                }

                let record = self.record(name)?;
                let path = entry_path(dest, name)
                    .map_err(|e| Error::Invalid(format!("`{}`: {}", name, e)))?;
                let file = create_entry_file(&path, &mut options.mkdir)?;
                write_verified(file, &path, record)?;

                tracing::debug!(name, path = %path.display(), bytes = record.size(), "extracted");
                stats.files += 1;
                stats.bytes += record.size();
            }

            Ok(stats)
        })();
        self.track(result)
    }

    /// Pushes every file `lister` reports below `src`. Returns how many
    /// files were added.
    pub fn read_dir<P, L>(
        &mut self,
        src: P,
        recursive: bool,
        mut lister: L,
        options: PushOptions,
    ) -> Result<usize>
    where
        P: AsRef<Path>,
        L: DirLister,
    {
        let src = src.as_ref();
        let files = match lister.list_dir(src, recursive) {
            Ok(files) => files,
            Err(err) => return self.track(Err(Error::file(src, err))),
        };

        for file in &files {
            self.push_path(file, options)?;
        }
        Ok(files.len())
    }
}

/// Opens `path` for writing. A missing parent directory is handed to `mkdir`
/// and the open retried once.
fn create_entry_file(path: &Path, mkdir: &mut Option<&mut dyn DirMaker>) -> Result<File> {
    let mut retried = false;

    loop {
        let err = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
        {
            Ok(file) => return Ok(file),
            Err(err) => err,
        };

        if err.kind() != io::ErrorKind::NotFound {
            return Err(Error::file(path, err));
        }

        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        match mkdir {
            Some(maker) if !retried => {
                maker
                    .make_dir(&parent)
                    .map_err(|e| Error::file(&parent, e))?;
                retried = true;
            }
            _ => return Err(Error::OpPartial(parent)),
        }
    }
}

fn write_verified(file: File, path: &Path, record: &BlobRecord) -> Result<()> {
    let mut writer = HashingWriter::new(file);
    writer
        .write_all(record.bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| Error::file(path, e))?;

    let mut file = writer.into_inner();
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::file(path, e))?;

    let mut reader = HashingReader::new(file);
    io::copy(&mut reader, &mut io::sink()).map_err(|e| Error::file(path, e))?;

    if reader.bytes_read() != record.size() || reader.checksum() != record.crc() {
        return Err(Error::Checksum {
            context: format!("extracted file '{}'", path.display()),
            expected: record.crc(),
            actual: reader.checksum(),
        });
    }
    Ok(())
}
