//! Error types for the install pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for voicedepot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end an install run.
///
/// A non-zero installer exit code is not an error (see
/// [`InstallOutcome::Failed`](crate::installer::InstallOutcome::Failed)),
/// and neither is a missing root or a bank without metadata.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid install target: {0}")]
    InvalidTarget(String),

    #[error("Failed to launch installer {path:?}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Installer did not finish within {after:?} and was killed")]
    InstallerTimeout { after: Duration },

    #[error("Installer run was cancelled")]
    Cancelled,

    #[error("Failed to write configuration for {namespace}: {reason}")]
    StoreWrite { namespace: String, reason: String },

    #[error("Failed to read configuration for {namespace}: {reason}")]
    StoreRead { namespace: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
