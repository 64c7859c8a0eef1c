//! The install pipeline: snapshot, install, snapshot, diff, register.
//!
//! The installer's effects are only known through the filesystem, so every
//! bank directory that appears between the two snapshots is treated as
//! produced by this run. Banks that were already present are never
//! registered again.
//!
//! Runs against the same destination must not overlap. Nothing here
//! prevents it; two concurrent runs would see overlapping diffs.

use crate::bank::{BankId, BankRecord, InstallTarget};
use crate::config::InstallerConfig;
use crate::error::Result;
use crate::installer::{InstallOutcome, InstallerInvoker, InstallerLauncher};
use crate::locator::BankMetadataLocator;
use crate::registrar::ConfigRegistrar;
use crate::snapshot::{self, DirectorySnapshot, PatternPolicy};
use crate::store::ConfigStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives the user-visible results of a run.
pub trait InstallReporter {
    /// A bank was registered.
    fn bank_installed(&self, record: &BankRecord);

    /// The run stopped on an error. Called at most once per run.
    fn run_failed(&self, message: &str);
}

/// Reporter that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl InstallReporter for LogReporter {
    fn bank_installed(&self, record: &BankRecord) {
        info!(
            id = %record.identifier,
            name = %record.display_name,
            path = %record.installed_path.display(),
            "bank was successfully installed"
        );
    }

    fn run_failed(&self, message: &str) {
        error!("install failed: {}", message);
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: InstallTarget,
    pub outcome: InstallOutcome,
    pub new_banks: Vec<BankId>,
    pub records: Vec<BankRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// What a run would do, computed without launching or writing anything.
#[derive(Debug, Clone, Serialize)]
pub struct InstallPlan {
    pub install_dir: PathBuf,
    pub already_installed: bool,
    pub visible_banks: Vec<BankId>,
}

/// Composes the pipeline components.
pub struct Reconciler {
    scanner: DirectorySnapshot,
    invoker: InstallerInvoker,
    locator: BankMetadataLocator,
    registrar: ConfigRegistrar,
}

impl Reconciler {
    pub fn new(
        scanner: DirectorySnapshot,
        invoker: InstallerInvoker,
        locator: BankMetadataLocator,
        registrar: ConfigRegistrar,
    ) -> Self {
        Self {
            scanner,
            invoker,
            locator,
            registrar,
        }
    }

    /// Build every component from `config`.
    pub fn from_config(
        config: &InstallerConfig,
        launcher: Arc<dyn InstallerLauncher>,
        store: Arc<dyn ConfigStore>,
    ) -> Result<Self> {
        let policy = PatternPolicy::new(&config.bank_pattern)?;
        Ok(Self::new(
            DirectorySnapshot::new(Box::new(policy)),
            InstallerInvoker::new(config, launcher),
            BankMetadataLocator::new(&config.data_extension),
            ConfigRegistrar::new(store, config.registration.clone()),
        ))
    }

    /// Abort a running installer when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.invoker = self.invoker.with_cancellation(token);
        self
    }

    /// Install `target` and register every bank it produced.
    ///
    /// Each registered bank is passed to `reporter.bank_installed`. On error,
    /// `reporter.run_failed` is called once with the error message; entries
    /// committed before the error stay in the store.
    pub fn run(
        &self,
        target: &InstallTarget,
        reporter: &dyn InstallReporter,
    ) -> Result<Vec<BankRecord>> {
        self.run_report(target, reporter).map(|report| report.records)
    }

    /// [`run`](Self::run), returning the full report.
    pub fn run_report(
        &self,
        target: &InstallTarget,
        reporter: &dyn InstallReporter,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        match self.reconcile(target, reporter) {
            Ok((outcome, new_banks, records)) => Ok(RunReport {
                target: target.clone(),
                outcome,
                new_banks,
                records,
                started_at,
                finished_at: Utc::now(),
            }),
            Err(e) => {
                reporter.run_failed(&e.to_string());
                Err(e)
            }
        }
    }

    fn reconcile(
        &self,
        target: &InstallTarget,
        reporter: &dyn InstallReporter,
    ) -> Result<(InstallOutcome, Vec<BankId>, Vec<BankRecord>)> {
        let destination = target.destination();

        let before = self.scanner.scan(destination);
        let outcome = self.invoker.install(target.installer(), destination)?;
        if !outcome.succeeded() {
            warn!(?outcome, "installer did not succeed, checking for partial output");
        }
        let after = self.scanner.scan(destination);

        let new_banks = snapshot::new_banks(&before, &after);
        info!(count = new_banks.len(), ids = ?new_banks, "new banks detected");

        let mut records = Vec::new();
        for (idx, id) in new_banks.iter().enumerate() {
            debug!("processing bank {}/{} {}", idx + 1, new_banks.len(), id);
            let record = match self.locator.record(id, destination) {
                Some(record) => record,
                None => {
                    warn!(id = %id, "no data file found, skipping registration");
                    continue;
                }
            };
            self.registrar
                .register(&record.identifier, &record.display_name, &record.installed_path)?;
            reporter.bank_installed(&record);
            records.push(record);
        }

        Ok((outcome, new_banks, records))
    }

    /// Inspect `target` without launching the installer or touching the store.
    pub fn plan(&self, target: &InstallTarget) -> Result<InstallPlan> {
        let install_dir = InstallerInvoker::install_dir(target.installer(), target.destination())?;
        Ok(InstallPlan {
            already_installed: self.invoker.is_installed(&install_dir),
            install_dir,
            visible_banks: self.scanner.scan(target.destination()).into_iter().collect(),
        })
    }
}
