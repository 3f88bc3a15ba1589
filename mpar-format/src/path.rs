use std::path::{Path, PathBuf};

use relative_path::{Component, RelativePath};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryPathError {
    #[error("entry name is empty")]
    EmptyPath,
    #[error("entry name contains a NUL character")]
    ContainsNul,
    #[error("entry name points outside the destination")]
    EscapesRoot,
}

/// Names must be non-empty and free of NUL, which the archive text cannot
/// carry.
pub fn check_entry_name(name: &str) -> Result<(), EntryPathError> {
    if name.is_empty() {
        Err(EntryPathError::EmptyPath)
    } else if name.contains('\0') {
        Err(EntryPathError::ContainsNul)
    } else {
        Ok(())
    }
}

/// The final component of `name`. Only `/` separates components, plus `\` on
/// Windows.
pub fn basename(name: &str) -> &str {
    let cut = if cfg!(windows) {
        name.rfind(|c| c == '/' || c == '\\')
    } else {
        name.rfind('/')
    };
    match cut {
        Some(index) => &name[index + 1..],
        None => name,
    }
}

/// Where the entry `name` lands under `dest`. Names are interpreted as
/// `/`-separated relative paths; a leading `/` is ignored and `..` may not
/// climb above `dest`.
pub fn entry_path(dest: &Path, name: &str) -> Result<PathBuf, EntryPathError> {
    let relative = RelativePath::new(name).normalize();

    match relative.components().next() {
        None => return Err(EntryPathError::EmptyPath),
        Some(Component::ParentDir) => return Err(EntryPathError::EscapesRoot),
        Some(_) => {}
    }

    Ok(relative.to_path(dest))
}

/// Entry name for a file on disk: the path as given, or its final component.
pub fn entry_name(path: &Path, strip_dir: bool) -> Option<String> {
    let name = if strip_dir {
        path.file_name()?.to_str()?.to_string()
    } else {
        path.to_str()?.to_string()
    };
    if cfg!(windows) {
        Some(name.replace('\\', "/"))
    } else {
        Some(name)
    }
}
