//! A utility module for common operations.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Write a file, creating missing parent directories first.
///
/// The content is written to a temporary sibling which is then renamed
/// into place, so readers never observe a half-written file.
pub fn write_file(path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut temp = path.to_path_buf();
    temp.as_mut_os_string().push(".new");
    fs::write(&temp, content)
        .map_err(|err| format!("cannot write '{}': {err}", temp.display()))?;
    rename_path(&temp, path)
}

/// Read a file into a string.
pub fn read_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path)
        .map_err(|err| format!("cannot read '{}': {err}", path.display()).into())
}

/// Create a directory and all of its parents.
pub fn create_dir_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path)
        .map_err(|err| format!("cannot create directory '{}': {err}", path.display()).into())
}

/// Rename a file.
pub fn rename_path(old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<()> {
    let (old, new) = (old.as_ref(), new.as_ref());
    fs::rename(old, new).map_err(|err| {
        format!(
            "could not move '{}' to '{}': {err}",
            old.display(),
            new.display()
        )
        .into()
    })
}
