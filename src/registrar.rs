use crate::bank::{parent_of, BankId};
use crate::config::RegistrationSchema;
use crate::error::Result;
use crate::store::{namespace, ConfigEntry, ConfigStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Writes the consumer application's registration entries for a bank.
pub struct ConfigRegistrar {
    store: Arc<dyn ConfigStore>,
    schema: RegistrationSchema,
}

impl ConfigRegistrar {
    pub fn new(store: Arc<dyn ConfigStore>, schema: RegistrationSchema) -> Self {
        Self { store, schema }
    }

    /// Stage the full schema for one bank without writing anything.
    pub fn entry(&self, id: &BankId, display_name: &str, installed_path: &Path) -> ConfigEntry {
        let parent = parent_of(installed_path);
        let schema = &self.schema;

        let mut entry = ConfigEntry::new(id.clone());
        let values = &mut entry.values;
        values.insert("BankName".to_string(), display_name.replace(' ', "_").into());
        values.insert("Name".to_string(), display_name.into());
        values.insert("Path".to_string(), parent.to_string_lossy().into_owned().into());
        values.insert("DRP".to_string(), schema.drp.as_str().into());
        values.insert("DefaultStyleID".to_string(), schema.default_style_id.as_str().into());
        values.insert("Key".to_string(), schema.access_key.as_str().into());
        values.insert("Date".to_string(), schema.date_stamp.as_str().into());

        let version = &mut entry.version;
        version.insert("Major".to_string(), schema.version_major.into());
        version.insert("Minor".to_string(), schema.version_minor.into());
        version.insert("Revision".to_string(), schema.version_revision.into());

        entry
    }

    /// Build the entry and commit it as a single unit.
    pub fn register(
        &self,
        id: &BankId,
        display_name: &str,
        installed_path: &Path,
    ) -> Result<ConfigEntry> {
        let entry = self.entry(id, display_name, installed_path);
        debug!(
            namespace = %namespace(&self.schema.root, id),
            values = entry.values.len(),
            "writing registration"
        );
        self.store.commit(&entry)?;
        info!(id = %id, name = %display_name, "registered bank");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{ConfigValue, MemoryStore};
    use std::path::PathBuf;

    fn schema() -> RegistrationSchema {
        RegistrationSchema {
            drp: "000055".to_string(),
            default_style_id: "style-1".to_string(),
            access_key: "key-1".to_string(),
            date_stamp: "stamp-1".to_string(),
            ..RegistrationSchema::default()
        }
    }

    fn text(value: &str) -> ConfigValue {
        ConfigValue::Text(value.to_string())
    }

    #[test]
    fn register_then_load_returns_the_schema() {
        let store = Arc::new(MemoryStore::new());
        let registrar = ConfigRegistrar::new(store.clone(), schema());
        let id = BankId::new("Bxyz123");
        let bank_dir = PathBuf::from("/voicelib/Fake/Bxyz123");

        registrar.register(&id, "Tone Voice", &bank_dir).unwrap();

        let loaded = store.load(&id).unwrap().unwrap();
        let names: Vec<&str> = loaded.values.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["BankName", "DRP", "Date", "DefaultStyleID", "Key", "Name", "Path"]
        );
        assert_eq!(loaded.values["BankName"], text("Tone_Voice"));
        assert_eq!(loaded.values["Name"], text("Tone Voice"));
        assert_eq!(
            loaded.values["Path"],
            text(&PathBuf::from("/voicelib/Fake").to_string_lossy())
        );
        assert_eq!(loaded.values["DRP"], text("000055"));
        assert_eq!(loaded.values["DefaultStyleID"], text("style-1"));
        assert_eq!(loaded.values["Key"], text("key-1"));
        assert_eq!(loaded.values["Date"], text("stamp-1"));

        assert_eq!(loaded.version.len(), 3);
        assert_eq!(loaded.version["Major"], ConfigValue::Dword(4));
        assert_eq!(loaded.version["Minor"], ConfigValue::Dword(0));
        assert_eq!(loaded.version["Revision"], ConfigValue::Dword(0));
    }

    struct BrokenStore;

    impl ConfigStore for BrokenStore {
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
    fn store_failure_propagates() {
        let registrar = ConfigRegistrar::new(Arc::new(BrokenStore), schema());
        let err = registrar
            .register(&BankId::new("B1"), "x", Path::new("/a/B1"))
            .unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
    }
}
