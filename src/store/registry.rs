//! Windows registry store under `HKEY_LOCAL_MACHINE`, 64-bit view.
//!
//! Each entry is written inside one KTM transaction. Dropping the
//! transaction without committing rolls every value back.

use super::{namespace, ConfigEntry, ConfigStore, ConfigValue, VERSION_NAMESPACE};
use crate::bank::BankId;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io;
use tracing::debug;
use winreg::enums::{RegType, HKEY_LOCAL_MACHINE, KEY_ALL_ACCESS, KEY_READ, KEY_WOW64_64KEY};
use winreg::transaction::Transaction;
use winreg::types::FromRegValue;
use winreg::RegKey;

/// Registry-backed store. Writing requires an elevated process.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    root: String,
}

impl RegistryStore {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
        }
    }

    fn write(&self, path: &str, entry: &ConfigEntry) -> io::Result<()> {
        let flags = KEY_ALL_ACCESS | KEY_WOW64_64KEY;
        let transaction = Transaction::new()?;
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);

        let (key, _) = hklm.create_subkey_transacted_with_flags(path, &transaction, flags)?;
        for (name, value) in &entry.values {
            debug!(key = %path, name = %name, "set value");
            set_value(&key, name, value)?;
        }

        let (version_key, _) =
            key.create_subkey_transacted_with_flags(VERSION_NAMESPACE, &transaction, flags)?;
        for (name, value) in &entry.version {
            debug!(key = %path, name = %name, "set version value");
            set_value(&version_key, name, value)?;
        }

        transaction.commit()
    }
}

impl ConfigStore for RegistryStore {
    fn commit(&self, entry: &ConfigEntry) -> Result<()> {
        let path = namespace(&self.root, &entry.identifier);
        self.write(&path, entry).map_err(|e| Error::StoreWrite {
            namespace: path.clone(),
            reason: e.to_string(),
        })
    }

    fn load(&self, id: &BankId) -> Result<Option<ConfigEntry>> {
        let path = namespace(&self.root, id);
        let to_error = |e: io::Error| Error::StoreRead {
            namespace: path.clone(),
            reason: e.to_string(),
        };
        let flags = KEY_READ | KEY_WOW64_64KEY;
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);

        let key = match hklm.open_subkey_with_flags(&path, flags) {
            Ok(key) => key,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(to_error(e)),
        };

        let mut entry = ConfigEntry::new(id.clone());
        entry.values = read_values(&key).map_err(to_error)?;
        match key.open_subkey_with_flags(VERSION_NAMESPACE, flags) {
            Ok(version_key) => entry.version = read_values(&version_key).map_err(to_error)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(to_error(e)),
        }
        Ok(Some(entry))
    }
}

fn set_value(key: &RegKey, name: &str, value: &ConfigValue) -> io::Result<()> {
    match value {
        ConfigValue::Text(text) => key.set_value(name, text),
        ConfigValue::Dword(number) => key.set_value(name, number),
    }
}

fn read_values(key: &RegKey) -> io::Result<BTreeMap<String, ConfigValue>> {
    let mut values = BTreeMap::new();
    for item in key.enum_values() {
        let (name, raw) = item?;
        let value = match raw.vtype {
            RegType::REG_DWORD => ConfigValue::Dword(u32::from_reg_value(&raw)?),
            _ => match String::from_reg_value(&raw) {
                Ok(text) => ConfigValue::Text(text),
                // Binary and multi-string values are not part of the schema.
                Err(_) => continue,
            },
        };
        values.insert(name, value);
    }
    Ok(values)
}
