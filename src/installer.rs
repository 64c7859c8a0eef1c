//! Running the bank's own installer.
//!
//! The installer is an opaque executable driven with silent-mode flags. It is
//! pointed at `<destination>/<installer name>`, and skipped entirely when that
//! directory already holds bank artifacts.

use crate::config::InstallerConfig;
use crate::error::{Error, Result};
use crate::relocate;
use serde::Serialize;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What happened to the installer step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallOutcome {
    /// Artifacts were already present; nothing was launched.
    AlreadyInstalled,
    /// The installer exited with code 0.
    Installed,
    /// The installer exited with a non-zero code, or was killed by a signal
    /// (`code` is `None`).
    Failed { code: Option<i32> },
}

impl InstallOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, InstallOutcome::Failed { .. })
    }
}

/// Exit status of a finished installer process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchResult {
    pub code: Option<i32>,
}

impl LaunchResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Starts an installer and blocks until it exits.
///
/// Implemented by [`ProcessLauncher`] for real executables; tests provide
/// launchers that fake the installer's filesystem output.
pub trait InstallerLauncher: Send + Sync {
    fn launch(
        &self,
        installer: &Path,
        args: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<LaunchResult>;
}

/// Launches the installer as a child process and polls it until it exits,
/// times out, or is cancelled.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ProcessLauncher {
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self {
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

impl InstallerLauncher for ProcessLauncher {
    fn launch(
        &self,
        installer: &Path,
        args: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<LaunchResult> {
        let mut child = Command::new(installer)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::Launch {
                path: installer.to_path_buf(),
                source,
            })?;

        self.supervise(&mut child, cancel)
    }
}

impl ProcessLauncher {
    /// Poll `child` until it exits. Every error path terminates it first.
    fn supervise(
        &self,
        child: &mut impl Supervised,
        cancel: &CancellationToken,
    ) -> Result<LaunchResult> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(code)) => return Ok(LaunchResult { code }),
                Ok(None) => {}
                Err(e) => {
                    child.terminate();
                    return Err(e.into());
                }
            }
            if cancel.is_cancelled() {
                child.terminate();
                return Err(Error::Cancelled);
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    child.terminate();
                    return Err(Error::InstallerTimeout { after: timeout });
                }
            }
            thread::sleep(self.poll_interval);
        }
    }
}

/// A running installer as seen by the polling loop.
trait Supervised {
    /// `Some(code)` once the process has exited.
    fn try_wait(&mut self) -> io::Result<Option<Option<i32>>>;

    /// Kill and reap.
    fn terminate(&mut self);
}

impl Supervised for Child {
    fn try_wait(&mut self) -> io::Result<Option<Option<i32>>> {
        Child::try_wait(self).map(|status| status.map(|status| status.code()))
    }

    fn terminate(&mut self) {
        if let Err(e) = self.kill() {
            warn!(pid = self.id(), error = %e, "failed to kill installer");
        }
        // Reap so no zombie is left behind.
        let _ = self.wait();
    }
}

/// Decides whether an install is needed and runs the installer at most once.
pub struct InstallerInvoker {
    launcher: Arc<dyn InstallerLauncher>,
    silent_flags: Vec<String>,
    install_dir_flag: String,
    artifact_extensions: Vec<String>,
    cancel: CancellationToken,
}

impl InstallerInvoker {
    pub fn new(config: &InstallerConfig, launcher: Arc<dyn InstallerLauncher>) -> Self {
        Self {
            launcher,
            silent_flags: config.silent_flags.clone(),
            install_dir_flag: config.install_dir_flag.clone(),
            artifact_extensions: config
                .artifact_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to abort a running installer from another thread.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Deterministic install directory: `<destination>/<installer stem>`.
    pub fn install_dir(installer: &Path, destination: &Path) -> Result<PathBuf> {
        Ok(destination.join(installer_name(installer)?))
    }

    /// True when any file below `install_dir` carries an artifact extension.
    pub fn is_installed(&self, install_dir: &Path) -> bool {
        if !install_dir.is_dir() {
            return false;
        }
        WalkDir::new(install_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .any(|e| {
                e.path()
                    .extension()
                    .and_then(OsStr::to_str)
                    .map(|ext| self.artifact_extensions.contains(&ext.to_ascii_lowercase()))
                    .unwrap_or(false)
            })
    }

    /// Run the installer unless the bank is already in place, then flatten
    /// `<destination>/<name>/<name>` whatever the outcome.
    ///
    /// A non-zero exit code is reported as [`InstallOutcome::Failed`], never
    /// as an error. Launch failures, timeouts and cancellation are errors.
    pub fn install(&self, installer: &Path, destination: &Path) -> Result<InstallOutcome> {
        let name = installer_name(installer)?;
        let install_dir = destination.join(name);
        debug!(installer = %installer.display(), name = ?name, "resolved installer");

        let result = if self.is_installed(&install_dir) {
            info!(dir = %install_dir.display(), "bank already installed, skipping installer");
            Ok(InstallOutcome::AlreadyInstalled)
        } else {
            let args = self.arguments(&install_dir);
            info!(
                installer = %installer.display(),
                dir = %install_dir.display(),
                "running installer"
            );
            self.launcher
                .launch(installer, &args, &self.cancel)
                .map(|exit| {
                    if exit.success() {
                        info!(dir = %install_dir.display(), "installer finished");
                        InstallOutcome::Installed
                    } else {
                        warn!(code = ?exit.code, "installer exited with failure");
                        InstallOutcome::Failed { code: exit.code }
                    }
                })
        };

        let nested = install_dir.join(name);
        if let Err(e) = relocate::flatten(&nested) {
            warn!(path = %nested.display(), error = %e, "failed to flatten installer output");
        }

        result
    }

    fn arguments(&self, install_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.silent_flags.iter().map(OsString::from).collect();
        let mut dir_arg = OsString::from(&self.install_dir_flag);
        dir_arg.push(install_dir.as_os_str());
        args.push(dir_arg);
        args
    }
}

fn installer_name(installer: &Path) -> Result<&OsStr> {
    installer
        .file_stem()
        .ok_or_else(|| Error::InvalidTarget(format!("installer {:?} has no file name", installer)))
}
