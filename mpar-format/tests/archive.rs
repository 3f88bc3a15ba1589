//! End-to-end tests for constructing, parsing and extracting MPAR archives.

use mpar_format::{
    base64, crc32, Archive, BlobChecksum, ErrorKind, ExtractOptions, KeyChange, ParseOptions,
    PushOptions, SortMode,
};
use proptest::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// Deterministic filler bytes (xorshift32).
fn noise(len: usize, mut seed: u32) -> Vec<u8> {
    (0..len)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed as u8
        })
        .collect()
}

/// Entry lines of a constructed archive, without the header and footer.
fn entry_lines(text: &str) -> Vec<&str> {
    let body = &text[text.find('>').unwrap() + 1..text.rfind("@~").unwrap()];
    body.split('\n').filter(|l| !l.is_empty()).collect()
}

#[test]
fn test_strtok_end_to_end() {
    let content = b"strtok stinks, use strtok_r instead!";
    assert_eq!(content.len(), 36);

    let mut archive = Archive::new();
    archive.push("strtok.txt", content).unwrap();
    let text = archive.construct().unwrap();

    assert!(text.starts_with("MXPSQL's Portable Archive;1$"));
    assert!(text.contains("encrypt\":[]"));
    assert!(text.ends_with("@~"));

    let lines = entry_lines(&text);
    assert_eq!(lines.len(), 1);
    let (crc, json) = lines[0].split_once('%').unwrap();
    assert_eq!(crc.parse::<u32>().unwrap(), crc32::checksum(json.as_bytes()));

    let entry: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(entry["filename"], "strtok.txt");
    let blob = base64::decode(entry["blob"].as_str().unwrap()).unwrap();
    assert_eq!(blob, &content[..]);
    assert_eq!(
        entry["crcsum"].as_str().unwrap(),
        crc32::checksum(content).to_string()
    );
}

#[test]
fn test_round_trip_text_and_binary() {
    let binary = noise(500, 0x1234_5678);

    let mut archive = Archive::new();
    archive.push("a.txt", b"hello").unwrap();
    archive.push("b.bin", &binary).unwrap();
    let text = archive.construct().unwrap();

    let mut loaded = Archive::new();
    loaded
        .parse_with(&text, ParseOptions::strict())
        .unwrap();
    assert_eq!(loaded.list(), vec!["a.txt", "b.bin"]);
    assert_eq!(loaded.peek("a.txt").unwrap(), b"hello");
    assert_eq!(loaded.peek("b.bin").unwrap(), binary);
    assert_eq!(loaded.size("b.bin").unwrap(), 500);
    assert_eq!(loaded.checksum("b.bin").unwrap(), crc32::checksum(&binary));

    // Reconstructing a parsed archive is byte-for-byte stable.
    assert_eq!(loaded.construct().unwrap(), text);
}

#[test]
fn test_tampered_entry_is_rejected() {
    let mut archive = Archive::new();
    archive.push("a.txt", b"hello").unwrap();
    let text = archive.construct().unwrap();

    let tampered = text.replace("\"a.txt\"", "\"b.txt\"");
    assert_ne!(tampered, text);

    let err = Archive::new().parse(&tampered).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Checksum);
}

#[test]
fn test_newer_version_is_rejected() {
    let mut archive = Archive::new();
    archive.push("a", b"a").unwrap();
    let text = archive
        .construct()
        .unwrap()
        .replacen("Archive;1$", "Archive;2$", 1);

    let mut reader = Archive::new();
    let err = reader.parse(&text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveTooNew);
    assert_eq!(reader.last_error(), Some(ErrorKind::ArchiveTooNew));
    assert!(reader.is_empty());
}

#[test]
fn test_footer_strictness() {
    let mut archive = Archive::new();
    archive.push("a", b"a").unwrap();
    let text = format!("{}\n", archive.construct().unwrap());

    let mut lenient = Archive::new();
    lenient.parse(&text).unwrap();
    assert_eq!(lenient.peek("a").unwrap(), b"a");

    let err = Archive::new()
        .parse_with(&text, ParseOptions::strict())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotArchive);
}

#[test]
fn test_extract_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let binary = noise(500, 42);

    let mut archive = Archive::new();
    archive.push("docs/a.txt", b"hello").unwrap();
    archive.push("b.bin", &binary).unwrap();

    let archive_path = temp_dir.path().join("test.mpar");
    archive.construct_path(&archive_path).unwrap();

    let mut loaded = Archive::new();
    loaded
        .parse_path(&archive_path, ParseOptions::strict())
        .unwrap();

    let out = temp_dir.path().join("out");
    let mut mkdir = |path: &Path| std::fs::create_dir_all(path);
    let stats = loaded
        .extract_with(
            &out,
            ExtractOptions {
                on_item: None,
                mkdir: Some(&mut mkdir),
            },
        )
        .unwrap();

    assert_eq!(stats.files, 2);
    assert_eq!(stats.bytes, 505);
    assert_eq!(std::fs::read(out.join("docs/a.txt")).unwrap(), b"hello");
    assert_eq!(std::fs::read(out.join("b.bin")).unwrap(), binary);
}

#[test]
fn test_push_path_and_read_back() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("input.txt");
    std::fs::write(&file, b"from disk").unwrap();

    let mut archive = Archive::new();
    archive
        .push_path(
            &file,
            PushOptions {
                overwrite: true,
                strip_dir: true,
            },
        )
        .unwrap();
    assert_eq!(archive.peek("input.txt").unwrap(), b"from disk");

    let err = archive
        .push_path(
            &file,
            PushOptions {
                overwrite: false,
                strip_dir: true,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyExists);

    let err = archive
        .push_path(temp_dir.path().join("missing"), PushOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileError);
}

#[test]
fn test_metadata_survives_round_trip() {
    let text = "MXPSQL's Portable Archive;1${\"encrypt\":[],\"tool\":{\"name\":\"mpar\",\"n\":[1,2.5]}}>@~";
    let mut archive = Archive::new();
    archive.parse_with(text, ParseOptions::strict()).unwrap();
    assert_eq!(archive.construct().unwrap(), text);
}

#[test]
fn test_sort_modes_keep_every_entry() {
    let mut archive = Archive::new();
    for name in &["zeta", "alpha", "mid"] {
        archive.push(name, name.as_bytes()).unwrap();
    }

    for mode in &[SortMode::ByName, SortMode::ByLine, SortMode::Unordered] {
        archive.set_sort_mode(*mode);
        let text = archive.construct().unwrap();
        assert_eq!(entry_lines(&text).len(), 3);

        let mut loaded = Archive::new();
        loaded.parse(&text).unwrap();
        assert_eq!(loaded.list(), vec!["alpha", "mid", "zeta"]);
    }
}

#[test]
fn test_lenient_blob_checksum_is_default() {
    assert_eq!(ParseOptions::default().blob_checksum, BlobChecksum::Lenient);
    assert_eq!(ParseOptions::strict().blob_checksum, BlobChecksum::Strict);
}

proptest! {
    #[test]
    fn test_cipher_round_trip(
        data in proptest::collection::vec(any::<u8>(), 0..256),
        xor in proptest::collection::vec(any::<u8>(), 0..8),
        rot in proptest::collection::vec(any::<i32>(), 0..8),
    ) {
        let mut writer = Archive::new();
        writer.cipher(KeyChange::Set(xor.clone()), KeyChange::Set(rot.clone()));
        writer.push("blob", &data).unwrap();
        let text = writer.construct().unwrap();

        let mut reader = Archive::new();
        reader.cipher(KeyChange::Set(xor), KeyChange::Set(rot));
        reader.parse_with(&text, ParseOptions::strict()).unwrap();
        prop_assert_eq!(reader.peek("blob").unwrap(), data);
    }

    #[test]
    fn test_any_entry_names_round_trip(
        names in proptest::collection::btree_set("[a-z0-9_./ -]{1,12}", 1..8),
    ) {
        let mut writer = Archive::new();
        for name in &names {
            writer.push(name, name.as_bytes()).unwrap();
        }
        let text = writer.construct().unwrap();

        let mut reader = Archive::new();
        reader.parse_with(&text, ParseOptions::strict()).unwrap();
        let listed: Vec<String> = names.iter().cloned().collect();
        prop_assert_eq!(reader.list(), listed);
        for name in &names {
            prop_assert_eq!(reader.peek(name).unwrap(), name.as_bytes());
        }
    }
}
