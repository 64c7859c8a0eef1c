//! FFI (Foreign Function Interface) bindings for native front ends.
//!
//! The native app owns the pickers and message boxes: it asks the user for
//! the installer and destination, calls [`voicedepot_install`], shows one
//! success message per `on_installed` callback and one error message if
//! `on_error` fires.
//!
//! # Memory Management
//!
//! - Rust allocates memory and returns pointers to Swift/C#
//! - The calling code MUST call the corresponding `_free` functions to prevent leaks
//! - Strings are null-terminated UTF-8
//! - Pointers handed to callbacks are only valid during the callback
//!
//! # Usage from C# (Windows)
//!
//! ```csharp
//! [DllImport("voicedepot_core.dll")]
//! private static extern IntPtr voicedepot_install(string installer, string destination,
//!     string storePath, string configPath, BankCallback onInstalled,
//!     ErrorCallback onError, IntPtr userData);
//!
//! [DllImport("voicedepot_core.dll")]
//! private static extern void voicedepot_free_bank_list(IntPtr list);
//! ```

use crate::bank::{BankRecord, InstallTarget};
use crate::config::{self, InstallerConfig};
use crate::error::{Error, Result};
use crate::installer::{InstallerLauncher, ProcessLauncher};
use crate::reconcile::{InstallReporter, Reconciler};
use crate::store::{self, ConfigStore, FileStore};
use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

// ============================================================================
// C-Compatible Types
// ============================================================================

/// Opaque handle to the banks registered by a run
pub struct CBankList {
    banks: Vec<BankRecord>,
}

/// C-compatible bank information
#[repr(C)]
pub struct CBank {
    pub id: *mut c_char,
    pub display_name: *mut c_char,
    pub installed_path: *mut c_char,
    /// Path written to the configuration store
    pub parent_path: *mut c_char,
}

/// Called once per registered bank.
pub type CBankCallback = extern "C" fn(bank: *const CBank, user_data: *mut c_void);

/// Called at most once, when the run fails.
pub type CErrorCallback = extern "C" fn(message: *const c_char, user_data: *mut c_void);

struct CallbackReporter {
    on_installed: Option<CBankCallback>,
    on_error: Option<CErrorCallback>,
    user_data: *mut c_void,
}

impl InstallReporter for CallbackReporter {
    fn bank_installed(&self, record: &BankRecord) {
        if let Some(callback) = self.on_installed {
            let bank = bank_to_c(record);
            callback(&bank, self.user_data);
            free_bank_strings(&bank);
        }
    }

    fn run_failed(&self, message: &str) {
        if let Some(callback) = self.on_error {
            let message = string_to_c_char(message);
            callback(message, self.user_data);
            free_c_char(message);
        }
    }
}

// ============================================================================
// Install
// ============================================================================

/// Install a voice bank and register every bank the installer produced.
///
/// `store_path` and `config_path` may be null: a null store path selects
/// the platform store (the registry on Windows), a null config path uses
/// the built-in configuration.
///
/// Returns the registered banks, or null if the run failed (after
/// `on_error` has been called). Caller MUST call
/// voicedepot_free_bank_list() on a non-null result.
#[no_mangle]
pub extern "C" fn voicedepot_install(
    installer: *const c_char,
    destination: *const c_char,
    store_path: *const c_char,
    config_path: *const c_char,
    on_installed: Option<CBankCallback>,
    on_error: Option<CErrorCallback>,
    user_data: *mut c_void,
) -> *mut CBankList {
    let reporter = CallbackReporter {
        on_installed,
        on_error,
        user_data,
    };

    let request = match unsafe { InstallRequest::from_raw(installer, destination, store_path, config_path) } {
        Ok(request) => request,
        Err(e) => {
            reporter.run_failed(&e.to_string());
            return ptr::null_mut();
        }
    };

    let launcher = Arc::new(ProcessLauncher::from_config(&request.config));
    match request.run(launcher, &reporter) {
        Ok(banks) => Box::into_raw(Box::new(CBankList { banks })),
        Err(_) => ptr::null_mut(),
    }
}

struct InstallRequest {
    target: InstallTarget,
    store_path: Option<PathBuf>,
    config: InstallerConfig,
}

impl InstallRequest {
    unsafe fn from_raw(
        installer: *const c_char,
        destination: *const c_char,
        store_path: *const c_char,
        config_path: *const c_char,
    ) -> Result<Self> {
        let installer = c_str_to_path(installer)
            .ok_or_else(|| Error::InvalidTarget("installer path is missing".to_string()))?;
        let destination = c_str_to_path(destination)
            .ok_or_else(|| Error::InvalidTarget("destination path is missing".to_string()))?;
        let config = match c_str_to_path(config_path) {
            Some(path) => InstallerConfig::from_file(&path)?,
            None => InstallerConfig::default(),
        };

        Ok(Self {
            target: InstallTarget::new(installer, destination)?,
            store_path: c_str_to_path(store_path),
            config,
        })
    }

    /// Errors after the reconciler is built are reported by the reconciler
    /// itself; earlier ones are reported here.
    fn run(
        &self,
        launcher: Arc<dyn InstallerLauncher>,
        reporter: &dyn InstallReporter,
    ) -> Result<Vec<BankRecord>> {
        let reconciler = match self.build(launcher) {
            Ok(reconciler) => reconciler,
            Err(e) => {
                reporter.run_failed(&e.to_string());
                return Err(e);
            }
        };
        reconciler.run(&self.target, reporter)
    }

    fn build(&self, launcher: Arc<dyn InstallerLauncher>) -> Result<Reconciler> {
        let store: Arc<dyn ConfigStore> = match &self.store_path {
            Some(path) => Arc::new(FileStore::new(path, &self.config.registration.root)),
            None => Arc::from(store::default_store(&self.config.registration)?),
        };
        Reconciler::from_config(&self.config, launcher, store)
    }
}

/// Default destination to preselect in the directory picker.
/// Caller MUST call voicedepot_free_string() when done.
#[no_mangle]
pub extern "C" fn voicedepot_default_voice_library() -> *mut c_char {
    string_to_c_char(&config::default_voice_library().to_string_lossy())
}

// ============================================================================
// Bank List
// ============================================================================

/// Get the number of banks in a list.
#[no_mangle]
pub extern "C" fn voicedepot_bank_list_count(list: *const CBankList) -> c_int {
    if list.is_null() {
        return 0;
    }
    let list = unsafe { &*list };
    list.banks.len() as c_int
}

/// Get bank information at a specific index.
/// Caller MUST call voicedepot_free_bank() when done.
#[no_mangle]
pub extern "C" fn voicedepot_bank_list_get(list: *const CBankList, index: c_int) -> *mut CBank {
    if list.is_null() || index < 0 {
        return ptr::null_mut();
    }

    let list = unsafe { &*list };
    match list.banks.get(index as usize) {
        Some(record) => Box::into_raw(Box::new(bank_to_c(record))),
        None => ptr::null_mut(),
    }
}

/// Free a list returned by voicedepot_install().
#[no_mangle]
pub extern "C" fn voicedepot_free_bank_list(list: *mut CBankList) {
    if !list.is_null() {
        unsafe {
            let _ = Box::from_raw(list);
        }
    }
}

/// Free a CBank returned by voicedepot_bank_list_get().
#[no_mangle]
pub extern "C" fn voicedepot_free_bank(bank: *mut CBank) {
    if !bank.is_null() {
        unsafe {
            let bank = Box::from_raw(bank);
            free_bank_strings(&bank);
        }
    }
}

// ============================================================================
// String Management
// ============================================================================

/// Free a string returned by FFI functions.
#[no_mangle]
pub extern "C" fn voicedepot_free_string(s: *mut c_char) {
    free_c_char(s);
}

// ============================================================================
// Helper Functions
// ============================================================================

fn bank_to_c(record: &BankRecord) -> CBank {
    CBank {
        id: string_to_c_char(record.identifier.as_str()),
        display_name: string_to_c_char(&record.display_name),
        installed_path: string_to_c_char(&record.installed_path.to_string_lossy()),
        parent_path: string_to_c_char(&record.parent_path().to_string_lossy()),
    }
}

fn free_bank_strings(bank: &CBank) {
    free_c_char(bank.id);
    free_c_char(bank.display_name);
    free_c_char(bank.installed_path);
    free_c_char(bank.parent_path);
}

unsafe fn c_str_to_path(s: *const c_char) -> Option<PathBuf> {
    if s.is_null() {
        return None;
    }
    match CStr::from_ptr(s).to_str() {
        Ok(s) if !s.is_empty() => Some(PathBuf::from(s)),
        _ => None,
    }
}

fn string_to_c_char(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn free_c_char(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            let _ = CString::from_raw(s);
        }
    }
}
