use std::path::{Path, PathBuf};

use mpar_format::ExtractOptions;

use crate::error::{Error, Result};
use crate::util::Settings;

pub fn run(
    settings: &Settings,
    archive_path: &Path,
    output: Option<PathBuf>,
    names: &[String],
    verbose: bool,
) -> Result<()> {
    let archive = settings.open_archive(archive_path, settings.parse_options())?;

    let output_path = match output {
        Some(path) => path,
        None => std::env::current_dir().map_err(|source| Error::CurrentDir { source })?,
    };
    std::fs::create_dir_all(&output_path).map_err(|source| Error::CreateDirectory {
        path: output_path.clone(),
        source,
    })?;

    let mut on_item = |name: &str| {
        if verbose {
            println!("{}", name);
        }
    };
    let mut mkdir = |path: &Path| std::fs::create_dir_all(path);
    let options = ExtractOptions {
        on_item: Some(&mut on_item),
        mkdir: Some(&mut mkdir),
    };

    let stats = if names.is_empty() {
        archive.extract_with(&output_path, options)
    } else {
        archive.extract_entries(&output_path, names, options)
    }
    .map_err(|source| Error::Extract { source })?;

    tracing::info!(
        files = stats.files,
        bytes = stats.bytes,
        path = %output_path.display(),
        "extracted"
    );
    Ok(())
}
