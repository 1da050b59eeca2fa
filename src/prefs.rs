//! Best-effort local preference cache: account and owner suggestions, plus the
//! older client-side copy of saved mappings.
//!
//! Reads never fail; a missing or corrupt entry yields the default list.
//! Writes replace the whole list and failures are only logged.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CashmopError, Result};
use crate::mapping::ImportMapping;

pub const SAVED_MAPPINGS_KEY: &str = "cashflow.savedMappings";
pub const ACCOUNTS_KEY: &str = "cashflow.accounts";
pub const OWNERS_KEY: &str = "cashflow.owners";

pub const DEFAULT_ACCOUNTS: &[&str] = &["RBC Checking", "TD Visa", "Wealthsimple Cash"];

/// String-valued key/value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// All keys in one JSON object file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, format!("{json}\n"))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking every write.
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut entries = self.read_all().unwrap_or_default();
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PreferenceCache
// ---------------------------------------------------------------------------

/// A mapping kept by the older client-side cache, keyed by a string id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMapping {
    pub id: String,
    pub name: String,
    pub mapping: ImportMapping,
}

pub struct PreferenceCache<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> PreferenceCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Option<Vec<T>> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read preference");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring corrupt preference");
                None
            }
        }
    }

    fn write_list<T: Serialize>(&mut self, key: &str, list: &[T]) {
        let result = serde_json::to_string(list)
            .map_err(CashmopError::from)
            .and_then(|json| self.store.set(key, &json));
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "failed to save preference");
        }
    }

    pub fn accounts(&self) -> Vec<String> {
        self.read_list(ACCOUNTS_KEY)
            .unwrap_or_else(|| DEFAULT_ACCOUNTS.iter().map(|s| s.to_string()).collect())
    }

    pub fn owners(&self) -> Vec<String> {
        self.read_list(OWNERS_KEY).unwrap_or_default()
    }

    pub fn saved_mappings(&self) -> Vec<CachedMapping> {
        self.read_list(SAVED_MAPPINGS_KEY).unwrap_or_default()
    }

    pub fn set_accounts(&mut self, accounts: &[String]) {
        self.write_list(ACCOUNTS_KEY, accounts);
    }

    pub fn set_owners(&mut self, owners: &[String]) {
        self.write_list(OWNERS_KEY, owners);
    }

    pub fn set_saved_mappings(&mut self, mappings: &[CachedMapping]) {
        self.write_list(SAVED_MAPPINGS_KEY, mappings);
    }

    /// Drop the legacy mapping list entirely.
    pub fn clear_saved_mappings(&mut self) {
        if let Err(e) = self.store.remove(SAVED_MAPPINGS_KEY) {
            tracing::warn!(key = SAVED_MAPPINGS_KEY, error = %e, "failed to clear preference");
        }
    }

    /// Add a name to the account list unless already present (trimmed, exact match).
    pub fn remember_account(&mut self, name: &str) {
        let mut list = self.accounts();
        if push_unique(&mut list, name) {
            self.set_accounts(&list);
        }
    }

    pub fn remember_owner(&mut self, name: &str) {
        let mut list = self.owners();
        if push_unique(&mut list, name) {
            self.set_owners(&list);
        }
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || list.iter().any(|n| n == name) {
        return false;
    }
    list.push(name.to_string());
    true
}

pub fn prefs_path() -> PathBuf {
    crate::settings::config_dir().join("prefs.json")
}
