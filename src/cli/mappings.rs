use comfy_table::{Cell, Table};

use crate::cli::{open_backend, read_mapping_json};
use crate::error::{CashmopError, Result};
use crate::mapping::SavedMapping;
use crate::prefs::{prefs_path, JsonFileStore, PreferenceCache};
use crate::service::{Backend, LocalBackend};

fn find(backend: &LocalBackend, id: Option<i64>, name: Option<&str>) -> Result<SavedMapping> {
    let found = match (id, name) {
        (Some(id), _) => backend.column_mapping_by_id(id)?,
        (None, Some(name)) => backend.column_mapping_by_name(name)?,
        (None, None) => None,
    };
    found.ok_or_else(|| match (id, name) {
        (Some(id), _) => CashmopError::Other(format!("No mapping with ID {id}")),
        (None, Some(name)) => CashmopError::Other(format!("No mapping named '{name}'")),
        (None, None) => CashmopError::Other("Pass --id or --name".into()),
    })
}

pub fn list() -> Result<()> {
    let backend = open_backend()?;
    let mappings = backend.column_mappings()?;
    if mappings.is_empty() {
        println!("No saved mappings.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Account", "Amount", "Columns"]);
    for m in mappings {
        let columns = m
            .mapping
            .meta
            .as_ref()
            .and_then(|meta| meta.headers.as_ref())
            .map(|h| h.len())
            .unwrap_or(0);
        table.add_row(vec![
            Cell::new(m.id),
            Cell::new(&m.name),
            Cell::new(&m.mapping.account),
            Cell::new(m.mapping.csv.amount_mapping.kind().key()),
            Cell::new(columns),
        ]);
    }
    println!("Saved mappings\n{table}");
    Ok(())
}

pub fn get(id: Option<i64>, name: Option<&str>) -> Result<()> {
    let backend = open_backend()?;
    let saved = find(&backend, id, name)?;
    println!("{}", saved.mapping.to_json()?);
    Ok(())
}

pub fn save(name: &str, mapping: &str) -> Result<()> {
    let parsed = read_mapping_json(mapping)?;
    let backend = open_backend()?;
    let id = backend.save_column_mapping(name, &parsed)?;
    println!("Saved mapping '{}' (ID {id})", name.trim());
    Ok(())
}

pub fn delete(id: Option<i64>, name: Option<&str>) -> Result<()> {
    let backend = open_backend()?;
    let saved = find(&backend, id, name)?;
    if backend.delete_column_mapping(saved.id)? {
        println!("Deleted mapping '{}' (ID {})", saved.name, saved.id);
    }
    Ok(())
}

/// Copy mappings from the preference cache into the database. Names that
/// already exist are left in the cache untouched.
pub fn import_legacy() -> Result<()> {
    let backend = open_backend()?;
    let mut cache = PreferenceCache::new(JsonFileStore::new(prefs_path()));
    let legacy = cache.saved_mappings();
    if legacy.is_empty() {
        println!("No cached mappings to import.");
        return Ok(());
    }

    let existing: Vec<String> = backend
        .column_mappings()?
        .into_iter()
        .map(|m| m.name.to_lowercase())
        .collect();
    let mut imported = 0usize;
    let mut kept = Vec::new();
    for cached in legacy {
        if existing.contains(&cached.name.trim().to_lowercase()) {
            println!("Skipped '{}': a saved mapping with that name exists", cached.name);
            kept.push(cached);
            continue;
        }
        match backend.save_column_mapping(&cached.name, &cached.mapping) {
            Ok(id) => {
                imported += 1;
                println!("Imported '{}' (ID {id})", cached.name.trim());
            }
            Err(e) => {
                tracing::warn!(name = %cached.name, error = %e, "skipping cached mapping");
                kept.push(cached);
            }
        }
    }

    if kept.is_empty() {
        cache.clear_saved_mappings();
    } else {
        cache.set_saved_mappings(&kept);
    }
    println!("{imported} imported, {} left in cache", kept.len());
    Ok(())
}
