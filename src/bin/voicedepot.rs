use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voicedepot_core::config::{default_voice_library, InstallerConfig};
use voicedepot_core::store::{self, ConfigStore, FileStore};
use voicedepot_core::{InstallTarget, LogReporter, ProcessLauncher, Reconciler};

#[derive(Parser)]
#[command(name = "voicedepot", version, about = "Unattended voice bank installer")]
struct Cli {
    /// Path to the bank installer (setup.exe)
    #[arg(short, long)]
    installer: PathBuf,

    /// Directory the bank should be installed into
    #[arg(short, long, default_value_os_t = default_voice_library())]
    source: PathBuf,

    /// JSON config file overriding the built-in settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write registrations to this JSON file instead of the platform store
    #[arg(long)]
    store_file: Option<PathBuf>,

    /// Kill the installer after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Show what would happen without running the installer
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => InstallerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => InstallerConfig::default(),
    };
    if cli.timeout.is_some() {
        config.timeout_secs = cli.timeout;
    }

    let target = InstallTarget::new(&cli.installer, &cli.source).context("Invalid install target")?;
    info!(
        installer = %target.installer().display(),
        destination = %target.destination().display(),
        "install target"
    );

    let store: Arc<dyn ConfigStore> = match &cli.store_file {
        Some(path) => Arc::new(FileStore::new(path, &config.registration.root)),
        None => Arc::from(
            store::default_store(&config.registration).context("Failed to open config store")?,
        ),
    };
    let launcher = Arc::new(ProcessLauncher::from_config(&config));
    let reconciler = Reconciler::from_config(&config, launcher, store)?;

    if cli.dry_run {
        let plan = reconciler.plan(&target)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            println!("Install directory: {}", plan.install_dir.display());
            println!("Already installed: {}", plan.already_installed);
            println!("Banks present: {}", plan.visible_banks.len());
        }
        return Ok(());
    }

    let report = reconciler
        .run_report(&target, &LogReporter)
        .context("Install failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for record in &report.records {
            println!(
                "Bank {} ({}) was successfully installed",
                record.display_name, record.identifier
            );
        }
        if report.records.is_empty() {
            println!("No new banks registered");
        }
    }

    Ok(())
}
