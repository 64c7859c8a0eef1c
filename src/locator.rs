use crate::bank::{BankId, BankRecord};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Finds the directory of a newly seen bank and reads its display name from
/// the primary data file (`<display name>.ddb` by default).
#[derive(Debug, Clone)]
pub struct BankMetadataLocator {
    data_extension: String,
}

impl BankMetadataLocator {
    pub fn new(data_extension: &str) -> Self {
        Self {
            data_extension: data_extension.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    /// Search `root` for a directory named `id` holding a data file.
    ///
    /// Returns `(display name, bank directory)`. When several directories or
    /// files match, the last one in walk order (sorted by name) wins.
    pub fn locate(&self, id: &BankId, root: &Path) -> Option<(String, PathBuf)> {
        debug!(id = %id, root = %root.display(), "looking for bank metadata");
        let mut found = None;

        let dirs = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir() && e.file_name() == OsStr::new(id.as_str()));

        for dir in dirs {
            let mut files: Vec<PathBuf> = match fs::read_dir(dir.path()) {
                Ok(entries) => entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .collect(),
                Err(e) => {
                    debug!(dir = %dir.path().display(), error = %e, "cannot list bank directory");
                    continue;
                }
            };
            files.sort();

            for file in files.iter().filter(|f| self.is_data_file(f)) {
                if let Some(stem) = file.file_stem() {
                    debug!(file = %file.display(), "found data file");
                    found = Some((stem.to_string_lossy().into_owned(), dir.path().to_path_buf()));
                }
            }
        }

        found
    }

    /// [`locate`](Self::locate), packaged as a record.
    pub fn record(&self, id: &BankId, root: &Path) -> Option<BankRecord> {
        self.locate(id, root).map(|(display_name, installed_path)| BankRecord {
            identifier: id.clone(),
            display_name,
            installed_path,
        })
    }

    fn is_data_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.eq_ignore_ascii_case(&self.data_extension))
            .unwrap_or(false)
    }
}
