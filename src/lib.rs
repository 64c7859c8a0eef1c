//! VoiceDepot Core Library
//!
//! Unattended installer for VOCALOID voice banks shipped as opaque
//! silent-mode setup executables.
//!
//! # Architecture
//!
//! The installer's output is never reported directly, so a run works it out
//! from the filesystem:
//!
//! 1. snapshot the bank directories under the destination (`snapshot`)
//! 2. run the installer once, or skip it when the bank is already there
//!    (`installer`), then flatten nested output (`relocate`)
//! 3. snapshot again and diff
//! 4. for each new bank, read its display name (`locator`) and commit its
//!    registration entries to the configuration store (`registrar`, `store`)
//!
//! `reconcile` ties the steps together. Native front ends (file pickers and
//! message boxes) drive it through the C ABI in `ffi`; the `voicedepot`
//! binary drives it from the command line.
//!
//! # Configuration store
//!
//! On Windows entries go to `HKLM\SOFTWARE\VOCALOID5\Voice\Components\<id>`
//! inside a registry transaction. Elsewhere, and whenever a store file is
//! given, they go to a JSON document replaced atomically.

pub mod bank;
pub mod config;
pub mod error;
pub mod ffi;
pub mod installer;
pub mod locator;
pub mod reconcile;
pub mod registrar;
pub mod relocate;
pub mod snapshot;
pub mod store;

pub use bank::{BankId, BankRecord, InstallTarget};
pub use config::{InstallerConfig, RegistrationSchema};
pub use error::{Error, Result};
pub use installer::{InstallOutcome, InstallerInvoker, InstallerLauncher, LaunchResult, ProcessLauncher};
pub use locator::BankMetadataLocator;
pub use reconcile::{InstallPlan, InstallReporter, LogReporter, Reconciler, RunReport};
pub use registrar::ConfigRegistrar;
pub use snapshot::{BankNamePolicy, DirectorySnapshot, PatternPolicy, Snapshot};
pub use store::{ConfigEntry, ConfigStore, ConfigValue, FileStore, MemoryStore};
