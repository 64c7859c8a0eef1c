//! Configuration stores the consumer application reads banks from.
//!
//! A store receives one [`ConfigEntry`] per bank and must make all of its
//! values visible at once, or none of them:
//! - [`RegistryStore`] (Windows): one KTM registry transaction per entry.
//! - [`FileStore`]: JSON document replaced through a temp file and rename.
//! - [`MemoryStore`]: in-process map, for tests and embedding.

#[cfg(windows)]
mod registry;

#[cfg(windows)]
pub use registry::RegistryStore;

use crate::bank::BankId;
use crate::config::RegistrationSchema;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Name of the nested namespace holding the version marker.
pub const VERSION_NAMESPACE: &str = "Version";

/// A typed value in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Text(String),
    Dword(u32),
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        ConfigValue::Dword(value)
    }
}

/// All values written for one bank: `<root>\<id>` and `<root>\<id>\Version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub identifier: BankId,
    pub values: BTreeMap<String, ConfigValue>,
    pub version: BTreeMap<String, ConfigValue>,
}

impl ConfigEntry {
    pub fn new(identifier: BankId) -> Self {
        Self {
            identifier,
            values: BTreeMap::new(),
            version: BTreeMap::new(),
        }
    }

    /// Overwrite values present in `other`, keep the rest.
    fn merge(&mut self, other: &ConfigEntry) {
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.version
            .extend(other.version.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Path-like namespace of a bank, e.g. `SOFTWARE\VOCALOID5\Voice\Components\B123`.
pub fn namespace(root: &str, id: &BankId) -> String {
    format!("{}\\{}", root.trim_end_matches('\\'), id)
}

/// Hierarchical key/value store keyed by bank identifier.
///
/// Stores create or overwrite values; they never delete them.
pub trait ConfigStore: Send + Sync {
    /// Write every value of `entry` as one atomic unit.
    fn commit(&self, entry: &ConfigEntry) -> Result<()>;

    /// Read back everything stored for `id`.
    fn load(&self, id: &BankId) -> Result<Option<ConfigEntry>>;
}

/// Store used when the caller does not name one: the registry on Windows,
/// a JSON file under the user's config directory elsewhere.
pub fn default_store(schema: &RegistrationSchema) -> Result<Box<dyn ConfigStore>> {
    #[cfg(windows)]
    {
        Ok(Box::new(RegistryStore::new(&schema.root)))
    }

    #[cfg(not(windows))]
    {
        Ok(Box::new(FileStore::new(
            crate::config::default_store_file()?,
            &schema.root,
        )))
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<BankId, ConfigEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers with at least one committed entry.
    pub fn identifiers(&self) -> Vec<BankId> {
        self.entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ConfigStore for MemoryStore {
    fn commit(&self, entry: &ConfigEntry) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| Error::StoreWrite {
            namespace: entry.identifier.to_string(),
            reason: e.to_string(),
        })?;
        entries
            .entry(entry.identifier.clone())
            .and_modify(|existing| existing.merge(entry))
            .or_insert_with(|| entry.clone());
        Ok(())
    }

    fn load(&self, id: &BankId) -> Result<Option<ConfigEntry>> {
        let entries = self.entries.lock().map_err(|e| Error::StoreRead {
            namespace: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(entries.get(id).cloned())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    root: String,
    components: BTreeMap<BankId, ConfigEntry>,
}

/// JSON file store. Each commit rewrites the whole document through a
/// temp file in the same directory and an atomic rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    root: String,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, root: &str) -> Self {
        Self {
            path: path.into(),
            root: root.to_string(),
        }
    }

    fn read_document(&self) -> std::result::Result<StoreDocument, String> {
        if !self.path.exists() {
            return Ok(StoreDocument {
                root: self.root.clone(),
                components: BTreeMap::new(),
            });
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| format!("cannot read {:?}: {}", self.path, e))?;
        serde_json::from_str(&content).map_err(|e| format!("cannot parse {:?}: {}", self.path, e))
    }
}

impl ConfigStore for FileStore {
    fn commit(&self, entry: &ConfigEntry) -> Result<()> {
        let ns = namespace(&self.root, &entry.identifier);
        let to_error = |reason: String| Error::StoreWrite {
            namespace: ns.clone(),
            reason,
        };

        let mut doc = self.read_document().map_err(to_error)?;
        doc.root = self.root.clone();
        doc.components
            .entry(entry.identifier.clone())
            .and_modify(|existing| existing.merge(entry))
            .or_insert_with(|| entry.clone());

        let data = serde_json::to_vec_pretty(&doc).map_err(|e| to_error(e.to_string()))?;
        write_atomic(&self.path, &data).map_err(|e| to_error(e.to_string()))?;
        debug!(store = %self.path.display(), namespace = %ns, "committed entry");
        Ok(())
    }

    fn load(&self, id: &BankId) -> Result<Option<ConfigEntry>> {
        let doc = self.read_document().map_err(|reason| Error::StoreRead {
            namespace: namespace(&self.root, id),
            reason,
        })?;
        Ok(doc.components.get(id).cloned())
    }
}

/// Write to a temp file in the target's directory, then rename over it.
fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}
