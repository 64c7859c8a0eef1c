//! Flattening of nested installer output.
//!
//! Installers told to write into `Voicelib/<name>` often create
//! `Voicelib/<name>/<name>/<bank>`. [`flatten`] moves the bank directories up
//! one level so they end up at `Voicelib/<name>/<bank>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Move every child directory of `path` into `path`'s parent, then remove
/// `path` if nothing is left in it.
///
/// Returns the new locations of the moved directories. A nonexistent path,
/// or one without child directories, is left untouched. A child whose
/// destination already exists stays where it is.
pub fn flatten(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut moved = Vec::new();
    if !path.is_dir() {
        return Ok(moved);
    }
    let parent = match path.parent() {
        Some(parent) => parent,
        None => return Ok(moved),
    };

    let mut children = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            children.push(entry);
        }
    }
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let dest = parent.join(child.file_name());
        if dest.exists() {
            warn!(
                source = %child.path().display(),
                dest = %dest.display(),
                "destination exists, leaving directory in place"
            );
            continue;
        }
        debug!(source = %child.path().display(), dest = %dest.display(), "moving level up");
        fs::rename(child.path(), &dest)?;
        moved.push(dest);
    }

    if fs::read_dir(path)?.next().is_none() {
        debug!(path = %path.display(), "removing empty wrapper directory");
        fs::remove_dir(path)?;
    }

    Ok(moved)
}
