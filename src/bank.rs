use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of a bank's directory, e.g. `BCNFCY43LB2LZCD4`.
///
/// Only produced by a [`BankNamePolicy`](crate::snapshot::BankNamePolicy)
/// accepting the name, so every value here passed the naming heuristic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BankId(String);

impl BankId {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bank discovered by a run and handed to the registrar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankRecord {
    pub identifier: BankId,
    pub display_name: String,
    pub installed_path: PathBuf,
}

impl BankRecord {
    /// Directory holding the bank directory. This is what the consumer
    /// application expects as the bank path.
    pub fn parent_path(&self) -> PathBuf {
        parent_of(&self.installed_path)
    }
}

pub(crate) fn parent_of(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}

/// Installer executable and destination root chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallTarget {
    installer: PathBuf,
    destination: PathBuf,
}

impl InstallTarget {
    /// Validate and absolutize both paths.
    ///
    /// The destination does not have to exist yet; the installer creates it.
    pub fn new(installer: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Result<Self> {
        let installer = absolutize(installer.into())?;
        let destination = absolutize(destination.into())?;

        if !installer.is_file() {
            return Err(Error::InvalidTarget(format!(
                "installer {:?} is not a file",
                installer
            )));
        }
        if installer.file_stem().is_none() {
            return Err(Error::InvalidTarget(format!(
                "installer {:?} has no file name",
                installer
            )));
        }
        if destination.exists() && !destination.is_dir() {
            return Err(Error::InvalidTarget(format!(
                "destination {:?} is not a directory",
                destination
            )));
        }

        Ok(Self { installer, destination })
    }

    pub fn installer(&self) -> &Path {
        &self.installer
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidTarget("empty path".to_string()));
    }
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
