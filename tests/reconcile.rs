mod common;

use common::{dat_config, installer_file, FakeLauncher, RecordingReporter};
use std::fs;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use voicedepot_core::{
    BankId, ConfigEntry, ConfigStore, ConfigValue, Error, FileStore, InstallOutcome,
    InstallTarget, InstallerConfig, InstallerLauncher, LaunchResult, MemoryStore, Reconciler,
    Result,
};

fn reconciler(
    config: &InstallerConfig,
    launcher: Arc<FakeLauncher>,
    store: Arc<dyn ConfigStore>,
) -> Reconciler {
    Reconciler::from_config(config, launcher, store).unwrap()
}

#[test]
fn installs_relocates_and_registers_new_bank() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    let installer = installer_file(tmp.path(), "Fake.exe");
    let launcher = Arc::new(FakeLauncher::new("Fake", "Bxyz123", "payload.dat"));
    let store = Arc::new(MemoryStore::new());
    let reporter = RecordingReporter::default();

    let target = InstallTarget::new(&installer, &dest).unwrap();
    let records = reconciler(&dat_config(), launcher.clone(), store.clone())
        .run(&target, &reporter)
        .unwrap();

    assert_eq!(launcher.launches(), 1);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.identifier.as_str(), "Bxyz123");
    assert_eq!(record.display_name, "payload");
    assert_eq!(record.installed_path, dest.join("Fake/Bxyz123"));

    assert!(dest.join("Fake/Bxyz123/payload.dat").is_file());
    assert!(!dest.join("Fake/Fake").exists());

    let entry = store.load(&record.identifier).unwrap().unwrap();
    assert_eq!(entry.values["Name"], ConfigValue::Text("payload".to_string()));
    assert_eq!(
        entry.values["Path"],
        ConfigValue::Text(dest.join("Fake").to_string_lossy().into_owned())
    );
    assert_eq!(entry.version["Major"], ConfigValue::Dword(4));

    assert_eq!(reporter.installed(), records);
    assert!(reporter.failures().is_empty());
}

#[test]
fn second_run_skips_installer_and_registers_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    let installer = installer_file(tmp.path(), "Fake.exe");
    let launcher = Arc::new(FakeLauncher::new("Fake", "Bxyz123", "payload.dat"));
    let store = Arc::new(MemoryStore::new());
    let target = InstallTarget::new(&installer, &dest).unwrap();
    let reconciler = reconciler(&dat_config(), launcher.clone(), store.clone());

    let first = reconciler.run(&target, &RecordingReporter::default()).unwrap();
    assert_eq!(first.len(), 1);

    let reporter = RecordingReporter::default();
    let report = reconciler.run_report(&target, &reporter).unwrap();

    assert_eq!(launcher.launches(), 1);
    assert_eq!(report.outcome, InstallOutcome::AlreadyInstalled);
    assert!(report.new_banks.is_empty());
    assert!(report.records.is_empty());
    assert!(reporter.installed().is_empty());
    assert_eq!(store.identifiers().len(), 1);
}

#[test]
fn banks_present_before_the_run_are_not_registered() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    fs::create_dir_all(dest.join("Other/Bold1")).unwrap();
    fs::write(dest.join("Other/Bold1/old.dat"), b"x").unwrap();
    let installer = installer_file(tmp.path(), "Fake.exe");
    let launcher = Arc::new(FakeLauncher::new("Fake", "Bnew1", "fresh.dat"));
    let store = Arc::new(MemoryStore::new());

    let target = InstallTarget::new(&installer, &dest).unwrap();
    let records = reconciler(&dat_config(), launcher, store.clone())
        .run(&target, &RecordingReporter::default())
        .unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["Bnew1"]);
    assert_eq!(store.identifiers().len(), 1);
}

#[test]
fn new_directory_without_data_file_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    let installer = installer_file(tmp.path(), "Fake.exe");
    let launcher = Arc::new(FakeLauncher::new("Fake", "Bxyz123", "readme.txt"));
    let store = Arc::new(MemoryStore::new());
    let reporter = RecordingReporter::default();

    let target = InstallTarget::new(&installer, &dest).unwrap();
    let report = reconciler(&dat_config(), launcher, store.clone())
        .run_report(&target, &reporter)
        .unwrap();

    assert_eq!(report.new_banks.len(), 1);
    assert!(report.records.is_empty());
    assert!(store.identifiers().is_empty());
    assert!(reporter.failures().is_empty());
}

#[test]
fn failed_installer_output_is_still_registered() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    let installer = installer_file(tmp.path(), "Fake.exe");
    let launcher = Arc::new(FakeLauncher::new("Fake", "Bxyz123", "payload.dat").exiting_with(3));
    let store = Arc::new(MemoryStore::new());

    let target = InstallTarget::new(&installer, &dest).unwrap();
    let report = reconciler(&dat_config(), launcher, store)
        .run_report(&target, &RecordingReporter::default())
        .unwrap();

    assert_eq!(report.outcome, InstallOutcome::Failed { code: Some(3) });
    assert_eq!(report.records.len(), 1);
    assert!(dest.join("Fake/Bxyz123").is_dir());
}

#[test]
fn registrations_persist_in_file_store() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    let store_path = tmp.path().join("store/components.json");
    let installer = installer_file(tmp.path(), "Fake.exe");
    let launcher = Arc::new(FakeLauncher::new("Fake", "Bxyz123", "payload.dat"));
    let config = dat_config();
    let store = Arc::new(FileStore::new(&store_path, &config.registration.root));

    let target = InstallTarget::new(&installer, &dest).unwrap();
    let records = reconciler(&config, launcher, store)
        .run(&target, &RecordingReporter::default())
        .unwrap();

    let reopened = FileStore::new(&store_path, &config.registration.root);
    let entry = reopened.load(&records[0].identifier).unwrap().unwrap();
    assert_eq!(entry.values["BankName"], ConfigValue::Text("payload".to_string()));
    assert_eq!(entry.version.len(), 3);
}

struct RejectingStore;

impl ConfigStore for RejectingStore {
    fn commit(&self, entry: &ConfigEntry) -> Result<()> {
        Err(Error::StoreWrite {
            namespace: entry.identifier.to_string(),
            reason: "access denied".to_string(),
        })
    }

    fn load(&self, _id: &BankId) -> Result<Option<ConfigEntry>> {
        Ok(None)
    }
}

#[test]
fn store_failure_is_reported_once_and_ends_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    let installer = installer_file(tmp.path(), "Fake.exe");
    let launcher = Arc::new(FakeLauncher::new("Fake", "Bxyz123", "payload.dat"));
    let reporter = RecordingReporter::default();

    let target = InstallTarget::new(&installer, &dest).unwrap();
    let err = reconciler(&dat_config(), launcher, Arc::new(RejectingStore))
        .run(&target, &reporter)
        .unwrap_err();

    assert!(matches!(err, Error::StoreWrite { .. }));
    assert_eq!(reporter.failures().len(), 1);
    assert!(reporter.failures()[0].contains("access denied"));
    assert!(reporter.installed().is_empty());
}

/// Exits cleanly unless the run's token was cancelled.
struct TokenAwareLauncher;

impl InstallerLauncher for TokenAwareLauncher {
    fn launch(
        &self,
        _installer: &Path,
        _args: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<LaunchResult> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(LaunchResult { code: Some(0) })
    }
}

#[test]
fn cancelled_installer_ends_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let installer = installer_file(tmp.path(), "Fake.exe");
    let reporter = RecordingReporter::default();
    let store = Arc::new(MemoryStore::new());

    let token = CancellationToken::new();
    token.cancel();

    let target = InstallTarget::new(&installer, tmp.path().join("dest")).unwrap();
    let err = Reconciler::from_config(&dat_config(), Arc::new(TokenAwareLauncher), store.clone())
        .unwrap()
        .with_cancellation(token)
        .run(&target, &reporter)
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(reporter.failures().len(), 1);
    assert!(store.identifiers().is_empty());
}

#[test]
fn plan_does_not_launch_or_write() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    fs::create_dir_all(dest.join("Fake/Bxyz123")).unwrap();
    fs::write(dest.join("Fake/Bxyz123/payload.dat"), b"x").unwrap();
    let installer = installer_file(tmp.path(), "Fake.exe");
    let launcher = Arc::new(FakeLauncher::new("Fake", "Bother", "other.dat"));
    let store = Arc::new(MemoryStore::new());

    let target = InstallTarget::new(&installer, &dest).unwrap();
    let plan = reconciler(&dat_config(), launcher.clone(), store.clone())
        .plan(&target)
        .unwrap();

    assert_eq!(plan.install_dir, dest.join("Fake"));
    assert!(plan.already_installed);
    assert_eq!(plan.visible_banks.len(), 1);
    assert_eq!(launcher.launches(), 0);
    assert!(store.identifiers().is_empty());
}
