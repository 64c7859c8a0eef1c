#![allow(dead_code)]

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use voicedepot_core::{
    BankRecord, InstallReporter, InstallerConfig, InstallerLauncher, LaunchResult, Result,
};

/// Stands in for a wrapped installer: writes
/// `<install dir>/<wrapper>/<bank>/<file>` and exits with `code`.
pub struct FakeLauncher {
    pub wrapper: String,
    pub bank: String,
    pub file: String,
    pub code: i32,
    launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(wrapper: &str, bank: &str, file: &str) -> Self {
        Self {
            wrapper: wrapper.to_string(),
            bank: bank.to_string(),
            file: file.to_string(),
            code: 0,
            launches: AtomicUsize::new(0),
        }
    }

    pub fn exiting_with(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl InstallerLauncher for FakeLauncher {
    fn launch(
        &self,
        _installer: &Path,
        args: &[OsString],
        _cancel: &CancellationToken,
    ) -> Result<LaunchResult> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let install_dir = args
            .iter()
            .filter_map(|a| a.to_str())
            .find_map(|a| a.strip_prefix("/DIR="))
            .map(PathBuf::from)
            .expect("install dir argument");
        let bank = install_dir.join(&self.wrapper).join(&self.bank);
        fs::create_dir_all(&bank)?;
        fs::write(bank.join(&self.file), b"voice data")?;
        Ok(LaunchResult {
            code: Some(self.code),
        })
    }
}

/// Collects reporter calls.
#[derive(Default)]
pub struct RecordingReporter {
    pub installed: Mutex<Vec<BankRecord>>,
    pub failures: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn installed(&self) -> Vec<BankRecord> {
        self.installed.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl InstallReporter for RecordingReporter {
    fn bank_installed(&self, record: &BankRecord) {
        self.installed.lock().unwrap().push(record.clone());
    }

    fn run_failed(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }
}

/// Config whose bank payload is `<name>.dat`.
pub fn dat_config() -> InstallerConfig {
    InstallerConfig {
        data_extension: "dat".to_string(),
        artifact_extensions: vec!["dat".to_string()],
        ..InstallerConfig::default()
    }
}

/// An empty file standing in for the installer executable.
pub fn installer_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"").unwrap();
    path
}
