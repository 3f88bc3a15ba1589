use std::path::Path;

use mpar_format::Archive;

use crate::error::{Error, Result};
use crate::util::{format_size, Settings};

pub fn run(settings: &Settings, archive_path: &Path, json: bool) -> Result<()> {
    let archive = settings.open_archive(archive_path, settings.parse_options())?;

    if json {
        println!("{}", list_json(&archive)?);
    } else {
        list_table(&archive);
    }
    Ok(())
}

fn list_table(archive: &Archive) {
    println!("{:>12}  {:>10}  Name", "Size", "CRC32");
    println!("{}", "-".repeat(40));

    let mut total = 0u64;
    for name in archive.list() {
        // Names come from the archive itself.
        let (size, crc) = match (archive.size(&name), archive.checksum(&name)) {
            (Ok(size), Ok(crc)) => (size, crc),
            _ => continue,
        };
        total += size;
        println!("{:>12}  {:>10}  {}", format_size(size), format!("{:08x}", crc), name);
    }

    println!("{}", "-".repeat(40));
    println!("{:>12}  {:>10}  {} entries", format_size(total), "", archive.len());
}

fn list_json(archive: &Archive) -> Result<String> {
    let entries: Vec<serde_json::Value> = archive
        .list()
        .into_iter()
        .filter_map(|name| {
            let size = archive.size(&name).ok()?;
            let crc = archive.checksum(&name).ok()?;
            Some(serde_json::json!({
                "name": name,
                "size": size,
                "crc32": crc,
            }))
        })
        .collect();

    let ciphers: Vec<String> = archive
        .loaded_ciphers()
        .iter()
        .map(|cipher| cipher.name().to_string())
        .collect();

    let listing = serde_json::json!({
        "version": archive.loaded_version(),
        "ciphers": ciphers,
        "entries": entries,
    });
    serde_json::to_string_pretty(&listing).map_err(|source| Error::Listing { source })
}
