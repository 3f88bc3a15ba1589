use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::archive::{Archive, SortMode};
use crate::base64;
use crate::cipher::CipherConfig;
use crate::crc32;
use crate::error::{Error, Result};
use crate::header::{ArchiveHeader, MAGIC, MARKERS};
use crate::json::{Json, JsonError};
use crate::record::BlobRecord;

pub(crate) trait Serialize {
    fn write<W: Write>(&self, writer: &mut W) -> io::Result<()>;
}

/// `MAGIC;<version>$<metadata>>`
pub(crate) struct EncodedHeader(String);

impl EncodedHeader {
    fn new(header: &ArchiveHeader, extra: &Json) -> std::result::Result<Self, JsonError> {
        let mut meta = Json::new();
        let root = meta.new_object();
        meta.set_root(Some(root));

        let encrypt = meta.new_array();
        for cipher in &header.ciphers {
            let name = meta.new_string(cipher.name());
            meta.append_element(encrypt, name)?;
        }
        meta.append_member(root, "encrypt", encrypt)?;

        if let Some(extra_root) = extra.root() {
            for member in extra.children(extra_root) {
                let key = match extra.key(member) {
                    Some(key) if key != "encrypt" => key,
                    _ => continue,
                };
                let copy = meta.import(extra, member)?;
                meta.append_member(root, key, copy)?;
            }
        }

        let text = format!(
            "{}{}{}{}{}{}",
            MAGIC,
            MARKERS.magic_sep as char,
            header.version,
            MARKERS.meta_sep as char,
            meta.encode_ascii(root)?,
            MARKERS.begin_entry as char,
        );
        Ok(EncodedHeader(text))
    }
}

impl Serialize for EncodedHeader {
    fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.0.as_bytes())
    }
}

/// `<crc32 of json>%<json>` for one entry.
pub(crate) struct EncodedEntry<'a> {
    name: &'a str,
    line: String,
}

impl<'a> EncodedEntry<'a> {
    fn new(
        name: &'a str,
        record: &BlobRecord,
        ciphers: &CipherConfig,
    ) -> std::result::Result<Self, JsonError> {
        let mut bytes = record.bytes().to_vec();
        ciphers.encrypt(&mut bytes);

        let mut doc = Json::new();
        let root = doc.new_object();
        let filename = doc.new_string(name);
        let blob = doc.new_string(base64::encode(&bytes));
        let crcsum = doc.new_string(record.crc().to_string());
        doc.append_member(root, "filename", filename)?;
        doc.append_member(root, "blob", blob)?;
        doc.append_member(root, "crcsum", crcsum)?;

        let json = doc.encode_ascii(root)?;
        let line = format!(
            "{}{}{}",
            crc32::checksum(json.as_bytes()),
            MARKERS.checksum_sep as char,
            json
        );
        Ok(EncodedEntry { name, line })
    }
}

impl<'a> Serialize for EncodedEntry<'a> {
    fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[MARKERS.entry_sep])?;
        writer.write_all(self.line.as_bytes())
    }
}

fn sort_entries(entries: &mut [EncodedEntry<'_>], mode: SortMode) {
    match mode {
        SortMode::ByName => entries.sort_by(|a, b| {
            a.name
                .as_bytes()
                .cmp(b.name.as_bytes())
                .then_with(|| a.line.as_bytes().cmp(b.line.as_bytes()))
        }),
        SortMode::ByLine => entries.sort_by(|a, b| {
            a.line
                .as_bytes()
                .cmp(b.line.as_bytes())
                .then_with(|| a.name.as_bytes().cmp(b.name.as_bytes()))
        }),
        SortMode::Unordered => {}
    }
}

impl Archive {
    fn encode_parts(&self) -> Result<(EncodedHeader, Vec<EncodedEntry<'_>>)> {
        let internal = |_| Error::Internal("failed to encode archive JSON");

        let header = ArchiveHeader::new(self.ciphers.active());
        let header = EncodedHeader::new(&header, &self.metadata).map_err(internal)?;

        let mut entries = Vec::with_capacity(self.store.len());
        for (name, record) in self.store.iter() {
            entries.push(EncodedEntry::new(name, record, &self.ciphers).map_err(internal)?);
        }
        sort_entries(&mut entries, self.sort_mode);

        Ok((header, entries))
    }

    fn write_parts<W: Write>(
        header: &EncodedHeader,
        entries: &[EncodedEntry<'_>],
        writer: &mut W,
    ) -> io::Result<()> {
        header.write(writer)?;
        for entry in entries {
            entry.write(writer)?;
        }
        writer.write_all(&MARKERS.footer())?;
        writer.flush()
    }

    /// Serializes the archive to its text form.
    pub fn construct(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.construct_to(&mut buf)?;
        let result = String::from_utf8(buf)
            .map_err(|_| Error::Internal("constructed archive is not ASCII"));
        self.track(result)
    }

    pub fn construct_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let result = self.encode_parts().and_then(|(header, entries)| {
            Archive::write_parts(&header, &entries, &mut writer).map_err(Error::ConstructFail)?;
            tracing::debug!(
                count = entries.len(),
                ciphers = ?self.ciphers.active(),
                "serialized archive"
            );
            Ok(())
        });
        self.track(result)
    }

    /// Writes the archive text to `path`, replacing any existing file.
    pub fn construct_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = match File::create(path) {
            Ok(file) => file,
            Err(err) => return self.track(Err(Error::file(path, err))),
        };
        self.construct_to(BufWriter::new(file))
    }
}
