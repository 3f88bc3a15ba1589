use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;

use crate::archive::Archive;
use crate::base64;
use crate::cipher::{Cipher, CipherConfig};
use crate::crc32;
use crate::error::{Error, Result};
use crate::header::{ArchiveHeader, MAGIC, MARKERS, WRITER_VERSION};
use crate::json::{self, Json, Tag};
use crate::path;
use crate::record::BlobRecord;

/// What to do when a decoded blob does not match its recorded checksum.
/// The entry line itself is always verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobChecksum {
    /// Log a warning and keep the entry.
    Lenient,
    /// Fail the parse with `Checksum`.
    Strict,
}

impl Default for BlobChecksum {
    fn default() -> Self {
        BlobChecksum::Lenient
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Fail with `KeyExists` instead of overwriting entries that are already
    /// stored or repeated in the text.
    pub err_on_duplicate: bool,
    /// Require the text to start with the magic and end with the footer.
    pub strict: bool,
    pub blob_checksum: BlobChecksum,
}

impl ParseOptions {
    pub fn strict() -> ParseOptions {
        ParseOptions {
            err_on_duplicate: true,
            strict: true,
            blob_checksum: BlobChecksum::Strict,
        }
    }
}

fn not_archive(reason: impl Into<String>) -> Error {
    Error::NotArchive(reason.into())
}

/// Parses `MAGIC;<version>$<metadata>>` and returns the header, the extra
/// metadata members and the offset just past `>`.
pub(crate) fn parse_header(
    text: &str,
    strict: bool,
    ciphers: &CipherConfig,
) -> Result<(ArchiveHeader, Json, usize)> {
    let start = if strict {
        if !text.starts_with(MAGIC) {
            return Err(not_archive("missing magic"));
        }
        0
    } else {
        text.find(MAGIC)
            .ok_or_else(|| not_archive("missing magic"))?
    };

    let bytes = text.as_bytes();
    let mut pos = start + MAGIC.len();

    if bytes.get(pos) != Some(&MARKERS.magic_sep) {
        return Err(not_archive("missing separator after magic"));
    }
    pos += 1;

    let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(not_archive("missing version"));
    }
    let version: u64 = text[pos..pos + digits]
        .parse()
        .map_err(|_| not_archive("version out of range"))?;
    pos += digits;

    if version == 0 {
        return Err(not_archive("version 0 is not valid"));
    }
    if version > WRITER_VERSION {
        return Err(Error::ArchiveTooNew {
            found: version,
            supported: WRITER_VERSION,
        });
    }

    if bytes.get(pos) != Some(&MARKERS.meta_sep) {
        return Err(not_archive("missing separator after version"));
    }
    pos += 1;

    let (meta, consumed) = json::decode_prefix(&text[pos..])
        .map_err(|e| not_archive(format!("metadata: {}", e)))?;
    pos += consumed;

    if bytes.get(pos) != Some(&MARKERS.begin_entry) {
        return Err(not_archive("missing start of entries"));
    }
    pos += 1;

    let (declared, extra) = read_metadata(&meta, ciphers)?;
    tracing::debug!(
        start,
        end = pos,
        version,
        ciphers = ?declared,
        "deserialized header"
    );

    Ok((
        ArchiveHeader {
            version,
            ciphers: declared,
        },
        extra,
        pos,
    ))
}

/// Checks the `encrypt` list against the configured keys and collects every
/// other member.
fn read_metadata(meta: &Json, ciphers: &CipherConfig) -> Result<(Vec<Cipher>, Json)> {
    let root = match meta.root() {
        Some(root) if meta.tag(root) == Some(Tag::Object) => root,
        _ => return Err(not_archive("metadata is not an object")),
    };

    let encrypt = meta
        .find_member(root, "encrypt")
        .filter(|&id| meta.tag(id) == Some(Tag::Array))
        .ok_or_else(|| not_archive("metadata has no encrypt list"))?;

    let mut declared = Vec::new();
    for element in meta.children(encrypt) {
        let name = meta
            .as_str(element)
            .ok_or_else(|| not_archive("encrypt list holds a non-string"))?;
        let cipher: Cipher = match name.parse() {
            Ok(cipher) => cipher,
            Err(never) => match never {},
        };
        if !ciphers.is_enabled(&cipher) {
            return Err(Error::NoCrypt(cipher));
        }
        if !declared.contains(&cipher) {
            declared.push(cipher);
        }
    }

    let mut extra = Json::new();
    let extra_root = extra.new_object();
    extra.set_root(Some(extra_root));
    for member in meta.children(root) {
        let key = match meta.key(member) {
            Some(key) if key != "encrypt" => key,
            _ => continue,
        };
        let copy = extra.import(meta, member)?;
        extra.append_member(extra_root, key, copy)?;
    }

    Ok((declared, extra))
}

/// Byte offset of the footer at or after `from`.
pub(crate) fn find_footer(text: &str, from: usize, strict: bool) -> Result<usize> {
    let footer = MARKERS.footer();
    let bytes = text.as_bytes();

    let at = if strict {
        if !bytes.ends_with(&footer) {
            return Err(not_archive("missing footer or data after footer"));
        }
        bytes.len() - footer.len()
    } else {
        bytes
            .get(from..)
            .and_then(|tail| tail.windows(footer.len()).rposition(|w| w == footer))
            .map(|i| from + i)
            .ok_or_else(|| not_archive("missing footer"))?
    };

    if at < from {
        return Err(not_archive("footer overlaps header"));
    }
    Ok(at)
}

/// Verifies and decodes one entry line. `None` for blank and comment lines.
fn parse_entry(
    line: &str,
    line_no: usize,
    ciphers: &CipherConfig,
    declared: &[Cipher],
    policy: BlobChecksum,
) -> Result<Option<(String, BlobRecord)>> {
    if line.is_empty() || line.as_bytes()[0] == MARKERS.comment {
        return Ok(None);
    }

    let (crc_text, json_text) = line
        .split_once(MARKERS.checksum_sep as char)
        .ok_or_else(|| not_archive(format!("line {}: no checksum separator", line_no)))?;
    let expected: u32 = crc_text
        .parse()
        .map_err(|_| Error::BadChecksumField(format!("line {}: `{}`", line_no, crc_text)))?;
    if json_text.is_empty() {
        return Err(not_archive(format!("line {}: empty entry", line_no)));
    }

    let actual = crc32::checksum(json_text.as_bytes());
    if actual != expected {
        return Err(Error::Checksum {
            context: format!("entry on line {}", line_no),
            expected,
            actual,
        });
    }

    let doc = json::decode(json_text)
        .map_err(|e| not_archive(format!("line {}: {}", line_no, e)))?;
    let root = match doc.root() {
        Some(root) if doc.tag(root) == Some(Tag::Object) => root,
        _ => return Err(not_archive(format!("line {}: entry is not an object", line_no))),
    };

    let (mut filename, mut blob, mut crcsum) = (None, None, None);
    for member in doc.children(root) {
        let value = match doc.as_str(member) {
            Some(value) => value,
            None => continue,
        };
        match doc.key(member) {
            Some("filename") => filename = Some(value),
            Some("blob") => blob = Some(value),
            Some("crcsum") => crcsum = Some(value),
            _ => {}
        }
    }

    let missing = |field| not_archive(format!("line {}: entry has no {}", line_no, field));
    let filename = filename.ok_or_else(|| missing("filename"))?;
    let blob = blob.ok_or_else(|| missing("blob"))?;
    let crcsum = crcsum.ok_or_else(|| missing("crcsum"))?;
    path::check_entry_name(filename)
        .map_err(|e| not_archive(format!("line {}: {}", line_no, e)))?;

    let recorded: u32 = crcsum
        .parse()
        .map_err(|_| Error::BadChecksumField(format!("entry `{}`: `{}`", filename, crcsum)))?;

    let mut bytes = if blob.is_empty() {
        Vec::new()
    } else {
        base64::decode(blob)
            .map_err(|e| not_archive(format!("entry `{}`: {}", filename, e)))?
    };
    ciphers.decrypt(&mut bytes, declared);

    let record = BlobRecord::new(bytes);
    if record.crc() != recorded {
        match policy {
            BlobChecksum::Strict => {
                return Err(Error::Checksum {
                    context: format!("blob `{}`", filename),
                    expected: recorded,
                    actual: record.crc(),
                })
            }
            BlobChecksum::Lenient => tracing::warn!(
                name = filename,
                expected = recorded,
                actual = record.crc(),
                "blob checksum mismatch"
            ),
        }
    }

    Ok(Some((filename.to_string(), record)))
}

impl Archive {
    /// Loads the entries of an archive text with default [`ParseOptions`].
    pub fn parse(&mut self, text: &str) -> Result<()> {
        self.parse_with(text, ParseOptions::default())
    }

    pub fn parse_with(&mut self, text: &str, options: ParseOptions) -> Result<()> {
        self.parse_bytes(text.as_bytes(), options)
    }

    /// Nothing is stored unless the whole text verifies.
    pub fn parse_bytes(&mut self, input: &[u8], options: ParseOptions) -> Result<()> {
        let result = self.load(input, options);
        self.track(result)
    }

    pub fn parse_reader<R: Read>(&mut self, mut reader: R, options: ParseOptions) -> Result<()> {
        let mut buf = Vec::new();
        if let Err(err) = reader.read_to_end(&mut buf) {
            return self.track(Err(Error::Io(err)));
        }
        self.parse_bytes(&buf, options)
    }

    /// Memory-maps the file at `path` and parses it.
    pub fn parse_path<P: AsRef<Path>>(&mut self, path: P, options: ParseOptions) -> Result<()> {
        let path = path.as_ref();
        let mapped = File::open(path).and_then(|file| unsafe { Mmap::map(&file) });
        match mapped {
            Ok(mmap) => self.parse_bytes(&mmap, options),
            Err(err) => self.track(Err(Error::file(path, err))),
        }
    }

    fn load(&mut self, input: &[u8], options: ParseOptions) -> Result<()> {
        if !input.is_ascii() {
            return Err(not_archive("input contains non-ASCII bytes"));
        }
        let text = std::str::from_utf8(input)
            .map_err(|_| Error::Internal("ASCII input failed UTF-8 validation"))?;

        let (header, extra, body_start) = parse_header(text, options.strict, &self.ciphers)?;
        let body_end = find_footer(text, body_start, options.strict)?;

        let mut entries: Vec<(String, BlobRecord)> = Vec::new();
        let mut seen = HashSet::new();
        for (index, line) in text[body_start..body_end]
            .split(MARKERS.entry_sep as char)
            .enumerate()
        {
            // The header occupies line 1; the first piece is what follows `>`
            // on that line.
            let line_no = index + 1;
            let (name, record) = match parse_entry(
                line,
                line_no,
                &self.ciphers,
                &header.ciphers,
                options.blob_checksum,
            )? {
                Some(entry) => entry,
                None => continue,
            };

            if options.err_on_duplicate
                && (self.store.contains_key(&name) || !seen.insert(name.clone()))
            {
                return Err(Error::KeyExists(name));
            }
            entries.push((name, record));
        }

        tracing::debug!(
            bytes = input.len(),
            count = entries.len(),
            "deserialized entries"
        );

        for (name, record) in entries {
            self.store.set(&name, record)?;
        }
        self.metadata = extra;
        self.loaded_version = Some(header.version);
        self.loaded_ciphers = header.ciphers;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::KeyChange;
    use crate::error::ErrorKind;

    const EMPTY: &str = "MXPSQL's Portable Archive;1${\"encrypt\":[]}>@~";

    fn entry_line(json: &str) -> String {
        format!("{}%{}", crc32::checksum(json.as_bytes()), json)
    }

    fn archive_text(lines: &[String]) -> String {
        let mut text = String::from("MXPSQL's Portable Archive;1${\"encrypt\":[]}>");
        for line in lines {
            text.push('\n');
            text.push_str(line);
        }
        text.push_str("@~");
        text
    }

    #[test]
    fn parses_empty_archive() {
        let mut archive = Archive::new();
        archive.parse(EMPTY).unwrap();
        assert!(archive.is_empty());
        assert_eq!(archive.loaded_version(), Some(1));
    }

    #[test]
    fn header_errors() {
        let cases: &[(&str, ErrorKind)] = &[
            ("", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;${\"encrypt\":[]}>@~", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;0${\"encrypt\":[]}>@~", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;2${\"encrypt\":[]}>@~", ErrorKind::ArchiveTooNew),
            ("MXPSQL's Portable Archive;1{\"encrypt\":[]}>@~", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;1${}>@~", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;1${\"encrypt\":{}}>@~", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;1${\"encrypt\":[1]}>@~", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;1$[]>@~", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;1${\"encrypt\":[]}@~", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;1${\"encrypt\":[]}>", ErrorKind::NotArchive),
            ("MXPSQL's Portable Archive;1${\"encrypt\":[\"XOR\"]}>@~", ErrorKind::NoCrypt),
            ("MXPSQL's Portable Archive;1${\"encrypt\":[\"AES\"]}>@~", ErrorKind::NoCrypt),
            ("\u{feff}MXPSQL's Portable Archive;1${\"encrypt\":[]}>@~", ErrorKind::NotArchive),
        ];

        for (text, kind) in cases {
            let mut archive = Archive::new();
            let err = archive.parse(text).unwrap_err();
            assert_eq!(err.kind(), *kind, "parsing {:?}", text);
            assert_eq!(archive.last_error(), Some(*kind));
        }
    }

    #[test]
    fn metadata_strings_may_contain_markers() {
        let mut archive = Archive::new();
        archive
            .parse("MXPSQL's Portable Archive;1${\"encrypt\":[],\"note\":\">@~\\n\"}>@~")
            .unwrap();
        let meta = archive.metadata();
        let note = meta.find_member(meta.root().unwrap(), "note").unwrap();
        assert_eq!(meta.as_str(note), Some(">@~\n"));
    }

    #[test]
    fn strictness_controls_surroundings() {
        let leading = format!("junk{}", EMPTY);
        let trailing = format!("{}x", EMPTY);

        for text in &[&leading, &trailing] {
            let mut archive = Archive::new();
            archive.parse(text).unwrap();

            let err = archive
                .parse_with(text, ParseOptions::strict())
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotArchive);
        }
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let json = format!(
            r#"{{"filename":"a","blob":"YQ==","crcsum":"{}"}}"#,
            crc32::checksum(b"a")
        );
        let text = archive_text(&[
            "# a comment line".to_string(),
            String::new(),
            entry_line(&json),
            "#another".to_string(),
        ]);
        let mut archive = Archive::new();
        archive.parse_with(&text, ParseOptions::strict()).unwrap();
        assert_eq!(archive.peek("a").unwrap(), b"a");
    }

    #[test]
    fn entry_line_errors() {
        let good = format!(
            r#"{{"filename":"a","blob":"YQ==","crcsum":"{}"}}"#,
            crc32::checksum(b"a")
        );
        let cases: Vec<(String, ErrorKind)> = vec![
            ("no separator here".to_string(), ErrorKind::NotArchive),
            (format!("abc%{}", good), ErrorKind::Checksum),
            (format!("{}%{}", crc32::checksum(good.as_bytes()) ^ 1, good), ErrorKind::Checksum),
            (format!("{}%", crc32::checksum(b"")), ErrorKind::NotArchive),
            (entry_line("[1,2]"), ErrorKind::NotArchive),
            (entry_line("{\"filename\":\"a\""), ErrorKind::NotArchive),
            (entry_line(r#"{"filename":"a","blob":"YQ=="}"#), ErrorKind::NotArchive),
            (entry_line(r#"{"blob":"YQ==","crcsum":"1"}"#), ErrorKind::NotArchive),
            (entry_line(r#"{"filename":"a","blob":"YQ==","crcsum":"x"}"#), ErrorKind::Checksum),
            (entry_line(r#"{"filename":"a","blob":"Y*==","crcsum":"1"}"#), ErrorKind::NotArchive),
            (entry_line(r#"{"filename":"","blob":"YQ==","crcsum":"3904355907"}"#), ErrorKind::NotArchive),
            (entry_line(r#"{"filename":"","blob":"","crcsum":"0"}"#), ErrorKind::NotArchive),
            (entry_line(r#"{"filename":"a\u0000b","blob":"","crcsum":"0"}"#), ErrorKind::NotArchive),
        ];

        for (line, kind) in cases {
            let text = archive_text(&[line.clone()]);
            let mut archive = Archive::new();
            let err = archive.parse(&text).unwrap_err();
            assert_eq!(err.kind(), kind, "parsing line {:?}", line);
        }
    }

    #[test]
    fn blob_checksum_policy() {
        let json = r#"{"filename":"a","blob":"YQ==","crcsum":"12345"}"#;
        let text = archive_text(&[entry_line(json)]);

        let mut archive = Archive::new();
        archive.parse(&text).unwrap();
        assert_eq!(archive.peek("a").unwrap(), b"a");
        assert_eq!(archive.checksum("a").unwrap(), crc32::checksum(b"a"));

        let mut archive = Archive::new();
        let options = ParseOptions {
            blob_checksum: BlobChecksum::Strict,
            ..Default::default()
        };
        let err = archive.parse_with(&text, options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Checksum);
        assert!(archive.is_empty());
    }

    #[test]
    fn empty_blob_decodes_to_empty_entry() {
        let json = format!(
            r#"{{"filename":"empty","blob":"","crcsum":"{}"}}"#,
            crc32::checksum(b"")
        );
        let mut archive = Archive::new();
        archive
            .parse_with(&archive_text(&[entry_line(&json)]), ParseOptions::strict())
            .unwrap();
        assert_eq!(archive.peek("empty").unwrap(), b"");
    }

    #[test]
    fn duplicates() {
        let json = |body: &[u8], b64: &str| {
            entry_line(&format!(
                r#"{{"filename":"dup","blob":"{}","crcsum":"{}"}}"#,
                b64,
                crc32::checksum(body)
            ))
        };
        let text = archive_text(&[json(b"a", "YQ=="), json(b"b", "Yg==")]);

        let mut archive = Archive::new();
        archive.parse(&text).unwrap();
        assert_eq!(archive.peek("dup").unwrap(), b"b");

        let options = ParseOptions {
            err_on_duplicate: true,
            ..Default::default()
        };
        let mut archive = Archive::new();
        let err = archive.parse_with(&text, options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyExists);
        assert!(archive.is_empty());

        let single = archive_text(&[json(b"a", "YQ==")]);
        let mut archive = Archive::new();
        archive.push("dup", b"already").unwrap();
        let err = archive.parse_with(&single, options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyExists);
        assert_eq!(archive.peek("dup").unwrap(), b"already");
    }

    #[test]
    fn failed_parse_leaves_store_untouched() {
        let good = entry_line(&format!(
            r#"{{"filename":"ok","blob":"YQ==","crcsum":"{}"}}"#,
            crc32::checksum(b"a")
        ));
        let text = archive_text(&[good, "1%{}".to_string()]);
        let mut archive = Archive::new();
        archive.push("keep", b"me").unwrap();
        assert!(archive.parse(&text).is_err());
        assert_eq!(archive.list(), vec!["keep"]);
    }

    #[test]
    #[cfg(feature = "writer")]
    fn decrypts_only_declared_ciphers() {
        let mut writer = Archive::new();
        writer.cipher(KeyChange::Set(vec![0x5A]), KeyChange::Keep);
        writer.push("secret", b"payload").unwrap();
        let text = writer.construct().unwrap();
        assert!(text.contains("\"encrypt\":[\"XOR\"]"));

        let mut reader = Archive::new();
        assert_eq!(
            reader.parse(&text).unwrap_err().kind(),
            ErrorKind::NoCrypt
        );

        // Extra configured ciphers are not applied to an archive that does
        // not declare them.
        let mut reader = Archive::new();
        reader.cipher(KeyChange::Set(vec![0x5A]), KeyChange::Set(vec![9]));
        reader.parse_with(&text, ParseOptions::strict()).unwrap();
        assert_eq!(reader.peek("secret").unwrap(), b"payload");
        assert_eq!(reader.loaded_ciphers(), &[Cipher::Xor][..]);
    }

    #[test]
    #[cfg(feature = "writer")]
    fn parse_path_and_reader() {
        let mut writer = Archive::new();
        writer.push("x", b"y").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mpar");
        writer.construct_path(&path).unwrap();

        let mut archive = Archive::new();
        archive.parse_path(&path, ParseOptions::strict()).unwrap();
        assert_eq!(archive.peek("x").unwrap(), b"y");

        let mut archive = Archive::new();
        let text = std::fs::read(&path).unwrap();
        archive
            .parse_reader(&text[..], ParseOptions::default())
            .unwrap();
        assert_eq!(archive.peek("x").unwrap(), b"y");

        let err = Archive::new()
            .parse_path(dir.path().join("missing"), ParseOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileError);
    }
}
