//! The backend surface the import flow talks to.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::backup::{self, BackupInfo, DB_FILE_NAME};
use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::fuzzy::fuzzy_match;
use crate::mapping::{ImportMapping, SavedMapping};
use crate::presets::{PresetStore, SqlitePresetStore};

pub trait Backend {
    fn column_mappings(&self) -> Result<Vec<SavedMapping>>;
    fn column_mapping_by_id(&self, id: i64) -> Result<Option<SavedMapping>>;
    fn column_mapping_by_name(&self, name: &str) -> Result<Option<SavedMapping>>;
    fn save_column_mapping(&self, name: &str, mapping: &ImportMapping) -> Result<i64>;
    fn delete_column_mapping(&self, id: i64) -> Result<bool>;
    fn fuzzy_search(&self, query: &str, candidates: &[String]) -> Vec<String>;
    fn last_backup_info(&self) -> Result<Option<BackupInfo>>;
    fn create_manual_backup(&self) -> Result<PathBuf>;
    /// Swap in a backup; returns the path of the pre-restore safety copy.
    fn restore_backup(&mut self, path: &Path) -> Result<PathBuf>;
    fn version(&self) -> &'static str;
    fn is_test_env(&self) -> bool;
}

/// [`Backend`] over a local data directory holding `cashmop.db`.
pub struct LocalBackend {
    data_dir: PathBuf,
    conn: Connection,
}

impl LocalBackend {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = get_connection(&data_dir.join(DB_FILE_NAME))?;
        init_db(&conn)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            conn,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn presets(&self) -> SqlitePresetStore<'_> {
        SqlitePresetStore::new(&self.conn)
    }
}

impl Backend for LocalBackend {
    fn column_mappings(&self) -> Result<Vec<SavedMapping>> {
        self.presets().list()
    }

    fn column_mapping_by_id(&self, id: i64) -> Result<Option<SavedMapping>> {
        self.presets().get_by_id(id)
    }

    fn column_mapping_by_name(&self, name: &str) -> Result<Option<SavedMapping>> {
        self.presets().get_by_name(name)
    }

    fn save_column_mapping(&self, name: &str, mapping: &ImportMapping) -> Result<i64> {
        self.presets().save(name, mapping)
    }

    fn delete_column_mapping(&self, id: i64) -> Result<bool> {
        self.presets().delete(id)
    }

    fn fuzzy_search(&self, query: &str, candidates: &[String]) -> Vec<String> {
        fuzzy_match(query, candidates)
    }

    fn last_backup_info(&self) -> Result<Option<BackupInfo>> {
        backup::last_backup_info(&self.data_dir)
    }

    fn create_manual_backup(&self) -> Result<PathBuf> {
        backup::create_manual_backup(&self.data_dir, &self.conn)
    }

    fn restore_backup(&mut self, path: &Path) -> Result<PathBuf> {
        // The live connection must be closed before the file is replaced.
        let old = std::mem::replace(&mut self.conn, Connection::open_in_memory()?);
        drop(old);
        let result = backup::restore_backup(&self.data_dir, path);
        self.conn = get_connection(&self.data_dir.join(DB_FILE_NAME))?;
        result
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn is_test_env(&self) -> bool {
        crate::settings::is_test_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ColumnMapper, CsvField};

    fn mapping() -> ImportMapping {
        let mut m = ColumnMapper::default();
        m.assign_header_to_field(CsvField::Date, "Date");
        m.assign_header_to_field(CsvField::Description, "Memo");
        m.assign_header_to_field(CsvField::Amount, "Amount");
        m.set_account("Visa");
        m.into_mapping()
    }

    #[test]
    fn test_open_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let backend = LocalBackend::open(&data).unwrap();
        assert!(data.join(DB_FILE_NAME).exists());
        assert!(backend.column_mappings().unwrap().is_empty());
        assert!(!backend.version().is_empty());
    }

    #[test]
    fn test_mappings_through_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::open(dir.path()).unwrap();
        let id = backend.save_column_mapping("Visa", &mapping()).unwrap();
        assert_eq!(backend.save_column_mapping("Visa", &mapping()).unwrap(), id);
        assert_eq!(backend.column_mappings().unwrap().len(), 1);
        assert_eq!(backend.column_mapping_by_name("Visa").unwrap().unwrap().id, id);
        assert!(backend.column_mapping_by_id(id + 1).unwrap().is_none());
        assert!(backend.delete_column_mapping(id).unwrap());
    }

    #[test]
    fn test_backup_and_restore_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::open(dir.path()).unwrap();
        let account = crate::db::ensure_account(backend.conn(), "Visa").unwrap();
        backend
            .conn()
            .execute(
                "INSERT INTO transactions (account_id, date, description, amount_cents, currency) \
                 VALUES (?1, '2025-01-01', 'A', -100, 'CAD')",
                [account],
            )
            .unwrap();
        assert!(backend.last_backup_info().unwrap().is_none());
        let path = backend.create_manual_backup().unwrap();
        assert_eq!(backend.last_backup_info().unwrap().unwrap().path, path);

        backend.conn().execute("DELETE FROM transactions", []).unwrap();
        backend.restore_backup(&path).unwrap();
        let n: i64 = backend
            .conn()
            .query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_fuzzy_search_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::open(dir.path()).unwrap();
        let hits = backend.fuzzy_search("vis", &["TD Visa".to_string(), "Cash".to_string()]);
        assert_eq!(hits, vec!["TD Visa"]);
    }
}
