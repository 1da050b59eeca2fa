//! Named mapping presets.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{CashmopError, Result};
use crate::mapping::{ImportMapping, SavedMapping};

/// Storage for named column-mapping presets.
pub trait PresetStore {
    /// All presets, ordered by name.
    fn list(&self) -> Result<Vec<SavedMapping>>;
    fn get_by_id(&self, id: i64) -> Result<Option<SavedMapping>>;
    fn get_by_name(&self, name: &str) -> Result<Option<SavedMapping>>;
    /// Insert or replace the preset called `name`, returning its id.
    fn save(&self, name: &str, mapping: &ImportMapping) -> Result<i64>;
    /// Returns false when no preset had that id.
    fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlitePresetStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePresetStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn decode(id: i64, name: String, json: &str) -> Result<SavedMapping> {
        let mapping = ImportMapping::from_json(json)?;
        Ok(SavedMapping { id, name, mapping })
    }

    fn query_one(&self, sql: &str, param: &dyn rusqlite::ToSql) -> Result<Option<SavedMapping>> {
        let row: Option<(i64, String, String)> = self
            .conn
            .query_row(sql, [param], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .optional()?;
        row.map(|(id, name, json)| Self::decode(id, name, &json)).transpose()
    }
}

impl PresetStore for SqlitePresetStore<'_> {
    fn list(&self) -> Result<Vec<SavedMapping>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, mapping_json FROM column_mappings ORDER BY name ASC")?;
        let rows: Vec<(i64, String, String)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, name, json) in rows {
            match Self::decode(id, name, &json) {
                Ok(sm) => out.push(sm),
                Err(e) => tracing::warn!(id, error = %e, "skipping unreadable column mapping"),
            }
        }
        Ok(out)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<SavedMapping>> {
        self.query_one("SELECT id, name, mapping_json FROM column_mappings WHERE id = ?1", &id)
    }

    fn get_by_name(&self, name: &str) -> Result<Option<SavedMapping>> {
        self.query_one(
            "SELECT id, name, mapping_json FROM column_mappings WHERE name = ?1",
            &name.trim(),
        )
    }

    fn save(&self, name: &str, mapping: &ImportMapping) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CashmopError::InvalidMapping("a mapping name is required".into()));
        }
        let json = mapping.to_json()?;
        self.conn.execute(
            "INSERT INTO column_mappings (name, mapping_json) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET mapping_json = excluded.mapping_json, \
             updated_at = datetime('now')",
            rusqlite::params![name, json],
        )?;
        let id = self
            .conn
            .query_row("SELECT id FROM column_mappings WHERE name = ?1", [name], |r| r.get(0))?;
        tracing::debug!(id, name, "saved column mapping");
        Ok(id)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM column_mappings WHERE id = ?1", [id])?;
        Ok(n > 0)
    }
}
