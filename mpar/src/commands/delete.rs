use std::path::Path;

use crate::error::{Error, Result};
use crate::util::{write_archive, Settings};

pub fn run(settings: &Settings, archive_path: &Path, names: &[String]) -> Result<()> {
    let mut archive = settings.open_archive(archive_path, settings.parse_options())?;

    for name in names {
        archive.pop(name).map_err(|source| Error::Delete {
            name: name.clone(),
            source,
        })?;
        tracing::debug!(name = %name, "deleted");
    }

    write_archive(&archive, archive_path)
}
