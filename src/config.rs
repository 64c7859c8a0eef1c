//! Run configuration.
//!
//! Every field has a default matching the VOCALOID5 voice library layout, so
//! a config file only needs the values that differ. Site-specific
//! registration values (style id, access key, date stamp) have no
//! compiled-in default and come from the config file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pipeline configuration shared by all components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Regex a directory name must match to count as a bank.
    pub bank_pattern: String,
    /// Extension of the file whose stem is the bank's display name.
    pub data_extension: String,
    /// Extensions whose presence marks an install directory as populated.
    pub artifact_extensions: Vec<String>,
    /// Arguments passed to the installer, before the install dir flag.
    pub silent_flags: Vec<String>,
    /// Prefix of the argument carrying the install directory.
    pub install_dir_flag: String,
    /// Kill the installer after this many seconds. `None` waits forever.
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: u64,
    pub registration: RegistrationSchema,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            bank_pattern: r"^B\w+".to_string(),
            data_extension: "ddb".to_string(),
            artifact_extensions: vec!["ddb".to_string(), "ddi".to_string(), "vvd".to_string()],
            silent_flags: [
                "/SP-",
                "/VERYSILENT",
                "/NOCANCEL",
                "/NORESTART",
                "/SUPPRESSMSGBOXES",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            install_dir_flag: "/DIR=".to_string(),
            timeout_secs: None,
            poll_interval_ms: 100,
            registration: RegistrationSchema::default(),
        }
    }
}

impl InstallerConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {:?}: {}", path, e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {:?}: {}", path, e)))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Fixed schema written for every registered bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSchema {
    /// Namespace holding one sub-namespace per bank identifier.
    pub root: String,
    pub drp: String,
    pub default_style_id: String,
    pub access_key: String,
    pub date_stamp: String,
    pub version_major: u32,
    pub version_minor: u32,
    pub version_revision: u32,
}

impl Default for RegistrationSchema {
    fn default() -> Self {
        Self {
            root: r"SOFTWARE\VOCALOID5\Voice\Components".to_string(),
            drp: String::new(),
            default_style_id: String::new(),
            access_key: String::new(),
            date_stamp: String::new(),
            version_major: 4,
            version_minor: 0,
            version_revision: 0,
        }
    }
}

/// Default voice library directory for the current platform.
pub fn default_voice_library() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        PathBuf::from(r"C:\Program Files\Common Files\VOCALOID5\Voicelib")
    }

    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support/VOCALOID5/Voicelib")
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(format!("{}/.local/share/VOCALOID5/Voicelib", home)),
            Err(_) => PathBuf::from("VOCALOID5/Voicelib"),
        }
    }
}

/// Location of the JSON component store used where no registry exists.
pub fn default_store_file() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("LOCALAPPDATA")
            .map_err(|_| Error::Config("LOCALAPPDATA environment variable not set".to_string()))?;
        Ok(PathBuf::from(format!("{}\\VoiceDepot\\components.json", appdata)))
    }

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME")
            .map_err(|_| Error::Config("HOME environment variable not set".to_string()))?;
        Ok(PathBuf::from(format!(
            "{}/Library/Application Support/VoiceDepot/components.json",
            home
        )))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let home = std::env::var("HOME")
            .map_err(|_| Error::Config("HOME environment variable not set".to_string()))?;
        Ok(PathBuf::from(format!("{}/.config/voicedepot/components.json", home)))
    }
}
