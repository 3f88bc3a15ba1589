use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::util::{add_files, write_archive, Settings};

pub fn run(
    settings: &Settings,
    archive_path: &Path,
    files: &[PathBuf],
    recursive: bool,
    force: bool,
) -> Result<()> {
    let mut archive = settings.open_archive(archive_path, settings.parse_options())?;
    let added = add_files(&mut archive, archive_path, files, recursive, force)?;
    write_archive(&archive, archive_path)?;

    tracing::info!(path = %archive_path.display(), entries = added, "appended to archive");
    Ok(())
}
