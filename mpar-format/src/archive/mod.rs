mod extract;

use std::cell::Cell;
use std::io::Read;
use std::path::Path;

pub use self::extract::{DirLister, DirMaker, ExtractOptions, ExtractStats};

use crate::cipher::{Cipher, CipherConfig, KeyChange};
use crate::error::{Error, ErrorKind, Result};
use crate::header::{Markers, MARKERS, WRITER_VERSION};
use crate::json::Json;
use crate::path;
use crate::record::BlobRecord;
use crate::store::Store;

/// Order of entry lines in a constructed archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// By entry name, ties broken by the encoded line.
    ByName,
    /// By the encoded line, which starts with the line checksum.
    ByLine,
    /// Store iteration order.
    Unordered,
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::ByName
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOptions {
    /// Replace an existing entry instead of failing with `KeyExists`.
    pub overwrite: bool,
    /// Keep only the final path component of the name.
    pub strip_dir: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        PushOptions {
            overwrite: true,
            strip_dir: false,
        }
    }
}

impl PushOptions {
    pub fn no_overwrite() -> PushOptions {
        PushOptions {
            overwrite: false,
            ..Default::default()
        }
    }
}

/// An in-memory archive: entries keyed by name, cipher keys and header
/// metadata.
#[derive(Debug, Clone)]
pub struct Archive {
    pub(crate) store: Store<BlobRecord>,
    pub(crate) ciphers: CipherConfig,
    pub(crate) metadata: Json,
    pub(crate) sort_mode: SortMode,
    pub(crate) loaded_version: Option<u64>,
    pub(crate) loaded_ciphers: Vec<Cipher>,
    last_error: Cell<Option<ErrorKind>>,
}

impl Default for Archive {
    fn default() -> Self {
        Archive::new()
    }
}

impl Archive {
    pub fn new() -> Archive {
        Archive {
            store: Store::new(),
            ciphers: CipherConfig::default(),
            metadata: Json::with_object_root(),
            sort_mode: SortMode::default(),
            loaded_version: None,
            loaded_ciphers: Vec::new(),
            last_error: Cell::new(None),
        }
    }

    pub fn with_ciphers(ciphers: CipherConfig) -> Archive {
        Archive {
            ciphers,
            ..Archive::new()
        }
    }

    /// Records the outcome of a public operation for [`Archive::last_error`].
    pub(crate) fn track<T>(&self, result: Result<T>) -> Result<T> {
        self.last_error.set(result.as_ref().err().map(Error::kind));
        result
    }

    /// Kind of the most recent failure, `None` if the last operation succeeded.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error.get()
    }

    #[inline(always)]
    pub fn version(&self) -> u64 {
        WRITER_VERSION
    }

    /// Version declared by the last parsed archive text.
    #[inline(always)]
    pub fn loaded_version(&self) -> Option<u64> {
        self.loaded_version
    }

    /// Ciphers declared by the header of the last parsed archive text.
    #[inline(always)]
    pub fn loaded_ciphers(&self) -> &[Cipher] {
        &self.loaded_ciphers
    }

    #[inline(always)]
    pub fn markers(&self) -> &Markers {
        &MARKERS
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.sort_mode = mode;
    }

    /// Extra header metadata, an object. Its `encrypt` member, if any, is
    /// ignored when constructing.
    pub fn metadata(&self) -> &Json {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Json {
        &mut self.metadata
    }

    pub fn cipher_config(&self) -> &CipherConfig {
        &self.ciphers
    }

    /// Applies the requested key changes and returns the resulting
    /// configuration. `cipher(KeyChange::Keep, KeyChange::Keep)` is a query.
    pub fn cipher(&mut self, xor: KeyChange<Vec<u8>>, rot: KeyChange<Vec<i32>>) -> &CipherConfig {
        self.ciphers.apply(xor, rot);
        self.last_error.set(None);
        &self.ciphers
    }

    pub fn set_xor_key(&mut self, key: Option<Vec<u8>>) {
        self.ciphers.set_xor_key(key);
    }

    pub fn set_rot_key(&mut self, key: Option<Vec<i32>>) {
        self.ciphers.set_rot_key(key);
    }

    pub(crate) fn insert_record(
        &mut self,
        name: &str,
        record: BlobRecord,
        options: PushOptions,
    ) -> Result<()> {
        let name = if options.strip_dir {
            path::basename(name)
        } else {
            name
        };
        path::check_entry_name(name).map_err(|e| Error::Invalid(e.to_string()))?;
        if !options.overwrite && self.store.contains_key(name) {
            return Err(Error::KeyExists(name.to_string()));
        }

        tracing::trace!(name, size = record.size(), crc = record.crc(), "push");
        self.store.set(name, record)?;
        Ok(())
    }

    /// Stores a copy of `bytes` under `name`, replacing any existing entry.
    pub fn push(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.push_with(name, bytes, PushOptions::default())
    }

    pub fn push_with(&mut self, name: &str, bytes: &[u8], options: PushOptions) -> Result<()> {
        let result = self.insert_record(name, BlobRecord::new(bytes.to_vec()), options);
        self.track(result)
    }

    /// Stores everything `reader` yields under `name`.
    pub fn push_reader<R: Read>(
        &mut self,
        name: &str,
        mut reader: R,
        options: PushOptions,
    ) -> Result<()> {
        let mut bytes = Vec::new();
        let result = match reader.read_to_end(&mut bytes) {
            Ok(_) => self.insert_record(name, BlobRecord::new(bytes), options),
            Err(err) => Err(Error::file(name, err)),
        };
        self.track(result)
    }

    /// Stores the file at `path`. The entry is named after the path as given,
    /// or its file name with `strip_dir`.
    pub fn push_path<P: AsRef<Path>>(&mut self, path: P, options: PushOptions) -> Result<()> {
        let file = path.as_ref();
        let result = (|| -> Result<()> {
            let name = path::entry_name(file, options.strip_dir).ok_or_else(|| {
                Error::Invalid(format!("path is not valid UTF-8: '{}'", file.display()))
            })?;
            let bytes = std::fs::read(file).map_err(|e| Error::file(file, e))?;
            self.insert_record(&name, BlobRecord::new(bytes), options)
        })();
        self.track(result)
    }

    pub fn pop(&mut self, name: &str) -> Result<()> {
        let result = match self.store.remove(name) {
            Some(_) => {
                tracing::trace!(name, "pop");
                Ok(())
            }
            None => Err(Error::KeyNotExists(name.to_string())),
        };
        self.track(result)
    }

    /// `Ok` when `name` is stored, `KeyNotExists` otherwise.
    pub fn exists(&self, name: &str) -> Result<()> {
        let result = if self.store.contains_key(name) {
            Ok(())
        } else {
            Err(Error::KeyNotExists(name.to_string()))
        };
        self.track(result)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }

    pub(crate) fn record(&self, name: &str) -> Result<&BlobRecord> {
        self.store
            .get(name)
            .ok_or_else(|| Error::KeyNotExists(name.to_string()))
    }

    /// A copy of the bytes stored under `name`.
    pub fn peek(&self, name: &str) -> Result<Vec<u8>> {
        let result = self.record(name).map(|r| r.bytes().to_vec());
        self.track(result)
    }

    pub fn size(&self, name: &str) -> Result<u64> {
        let result = self.record(name).map(BlobRecord::size);
        self.track(result)
    }

    /// CRC-32 of the bytes stored under `name`.
    pub fn checksum(&self, name: &str) -> Result<u32> {
        let result = self.record(name).map(BlobRecord::crc);
        self.track(result)
    }

    pub fn rename(&mut self, old: &str, new: &str, overwrite: bool) -> Result<()> {
        let result = (|| -> Result<()> {
            let record = self.record(old)?.clone();
            if old == new {
                return Ok(());
            }
            let options = PushOptions {
                overwrite,
                strip_dir: false,
            };
            self.insert_record(new, record, options)?;
            self.store.remove(old);
            Ok(())
        })();
        self.track(result)
    }

    pub fn duplicate(&mut self, src: &str, dest: &str, overwrite: bool) -> Result<()> {
        let result = (|| -> Result<()> {
            let record = self.record(src)?.clone();
            if src == dest {
                return if overwrite {
                    Ok(())
                } else {
                    Err(Error::KeyExists(dest.to_string()))
                };
            }
            let options = PushOptions {
                overwrite,
                strip_dir: false,
            };
            self.insert_record(dest, record, options)
        })();
        self.track(result)
    }

    /// Exchanges the contents of two existing entries.
    pub fn swap(&mut self, a: &str, b: &str) -> Result<()> {
        let result = (|| -> Result<()> {
            let first = self.record(a)?.clone();
            self.record(b)?;
            if a == b {
                return Ok(());
            }
            let second = match self.store.get_mut(b) {
                Some(slot) => std::mem::replace(slot, first),
                None => return Err(Error::Internal("entry vanished during swap")),
            };
            match self.store.get_mut(a) {
                Some(slot) => *slot = second,
                None => return Err(Error::Internal("entry vanished during swap")),
            }
            Ok(())
        })();
        self.track(result)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.store.clear();
        self.last_error.set(None);
    }

    /// Entry names, sorted byte-wise.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.store.keys().map(str::to_string).collect();
        names.sort_unstable();
        names
    }

    /// Entry names in store order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.store.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BlobRecord)> {
        self.store.iter()
    }

    /// Calls `f` for each entry in store order, stopping at the first error.
    pub fn try_for_each<E, F>(&self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&str, &BlobRecord) -> std::result::Result<(), E>,
    {
        for (name, record) in self.store.iter() {
            f(name, record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_peek_pop() {
        let mut archive = Archive::new();
        archive.push("a.txt", b"hello").unwrap();
        assert_eq!(archive.peek("a.txt").unwrap(), b"hello");
        assert_eq!(archive.size("a.txt").unwrap(), 5);
        assert_eq!(
            archive.checksum("a.txt").unwrap(),
            crate::crc32::checksum(b"hello")
        );
        assert!(archive.exists("a.txt").is_ok());

        archive.pop("a.txt").unwrap();
        assert_eq!(
            archive.exists("a.txt").unwrap_err().kind(),
            ErrorKind::KeyNotExists
        );
        assert_eq!(archive.last_error(), Some(ErrorKind::KeyNotExists));
        assert_eq!(
            archive.pop("a.txt").unwrap_err().kind(),
            ErrorKind::KeyNotExists
        );
        assert_eq!(
            archive.peek("a.txt").unwrap_err().kind(),
            ErrorKind::KeyNotExists
        );
    }

    #[test]
    fn push_respects_overwrite() {
        let mut archive = Archive::new();
        archive.push("a", b"1").unwrap();
        let err = archive
            .push_with("a", b"2", PushOptions::no_overwrite())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyExists);
        assert_eq!(archive.peek("a").unwrap(), b"1");

        archive.push("a", b"3").unwrap();
        assert_eq!(archive.peek("a").unwrap(), b"3");
        assert_eq!(archive.last_error(), None);
    }

    #[test]
    fn push_strips_directories() {
        let mut archive = Archive::new();
        let options = PushOptions {
            overwrite: true,
            strip_dir: true,
        };
        archive.push_with("deep/dir/file.txt", b"x", options).unwrap();
        assert_eq!(archive.list(), vec!["file.txt"]);

        let err = archive.push_with("dir/", b"x", options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn push_rejects_nul_in_name() {
        let mut archive = Archive::new();
        let err = archive.push("a\0b", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert!(archive.is_empty());

        let err = archive.push("", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn peek_returns_independent_copy() {
        let mut archive = Archive::new();
        archive.push("a", b"abc").unwrap();
        let mut copy = archive.peek("a").unwrap();
        copy[0] = b'z';
        assert_eq!(archive.peek("a").unwrap(), b"abc");
    }

    #[test]
    fn rename_duplicate_swap() {
        let mut archive = Archive::new();
        archive.push("a", b"A").unwrap();
        archive.push("b", b"B").unwrap();

        archive.swap("a", "b").unwrap();
        assert_eq!(archive.peek("a").unwrap(), b"B");
        assert_eq!(archive.peek("b").unwrap(), b"A");
        assert_eq!(
            archive.swap("a", "missing").unwrap_err().kind(),
            ErrorKind::KeyNotExists
        );

        archive.duplicate("a", "c", false).unwrap();
        assert_eq!(archive.peek("c").unwrap(), b"B");
        assert_eq!(
            archive.duplicate("a", "b", false).unwrap_err().kind(),
            ErrorKind::KeyExists
        );

        archive.rename("c", "d", false).unwrap();
        assert!(!archive.contains("c"));
        assert_eq!(archive.peek("d").unwrap(), b"B");

        archive.rename("d", "d", false).unwrap();
        assert_eq!(archive.peek("d").unwrap(), b"B");

        assert_eq!(
            archive.rename("d", "a", false).unwrap_err().kind(),
            ErrorKind::KeyExists
        );
        archive.rename("d", "a", true).unwrap();
        assert_eq!(archive.list(), vec!["a", "b"]);
    }

    #[test]
    fn list_is_sorted_and_clear_empties() {
        let mut archive = Archive::new();
        for name in &["zeta", "alpha", "Mid", "beta"] {
            archive.push(name, name.as_bytes()).unwrap();
        }
        assert_eq!(archive.list(), vec!["Mid", "alpha", "beta", "zeta"]);
        assert_eq!(archive.keys().count(), 4);

        archive.clear();
        assert!(archive.is_empty());
        assert!(archive.list().is_empty());
    }

    #[test]
    fn try_for_each_stops_on_error() {
        let mut archive = Archive::new();
        archive.push("a", b"1").unwrap();
        archive.push("b", b"2").unwrap();
        archive.push("c", b"3").unwrap();

        let mut visited = 0;
        let result: std::result::Result<(), &str> = archive.try_for_each(|_, _| {
            visited += 1;
            if visited == 2 {
                Err("stop")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(visited, 2);

        let mut total = 0;
        archive
            .try_for_each::<(), _>(|_, record| {
                total += record.size();
                Ok(())
            })
            .unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn cipher_query_and_update() {
        let mut archive = Archive::new();
        let config = archive.cipher(KeyChange::Keep, KeyChange::Keep);
        assert_eq!(config.xor_key(), None);

        let config = archive.cipher(KeyChange::Set(b"key".to_vec()), KeyChange::Keep);
        assert_eq!(config.xor_key(), Some(&b"key"[..]));
        archive.set_rot_key(Some(vec![3]));
        assert_eq!(archive.cipher_config().rot_key(), Some(&[3][..]));
    }

    #[test]
    fn clone_is_deep() {
        let mut archive = Archive::new();
        archive.push("a", b"1").unwrap();
        let mut copy = archive.clone();
        copy.push("a", b"2").unwrap();
        copy.push("b", b"3").unwrap();
        assert_eq!(archive.peek("a").unwrap(), b"1");
        assert_eq!(archive.len(), 1);
        assert_eq!(copy.len(), 2);
    }

    #[test]
    fn push_reader_and_path() {
        let mut archive = Archive::new();
        archive
            .push_reader("r.bin", &b"from reader"[..], PushOptions::default())
            .unwrap();
        assert_eq!(archive.peek("r.bin").unwrap(), b"from reader");

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("on_disk.txt");
        std::fs::write(&file, b"disk").unwrap();
        let options = PushOptions {
            overwrite: false,
            strip_dir: true,
        };
        archive.push_path(&file, options).unwrap();
        assert_eq!(archive.peek("on_disk.txt").unwrap(), b"disk");

        let err = archive
            .push_path(dir.path().join("missing"), options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileError);
        assert_eq!(archive.last_error(), Some(ErrorKind::FileError));
    }
}
