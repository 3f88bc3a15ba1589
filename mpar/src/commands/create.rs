use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::util::{add_files, write_archive, Settings};

pub fn run(
    settings: &Settings,
    archive_path: &Path,
    files: &[PathBuf],
    recursive: bool,
    force: bool,
) -> Result<()> {
    if archive_path.exists() && !force {
        return Err(Error::ArchiveExists {
            path: archive_path.to_path_buf(),
        });
    }

    let mut archive = settings.new_archive();
    let added = add_files(&mut archive, archive_path, files, recursive, true)?;
    write_archive(&archive, archive_path)?;

    tracing::info!(path = %archive_path.display(), entries = added, "created archive");
    Ok(())
}
