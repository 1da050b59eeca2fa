use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Datelike, Local};
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};

use crate::db::{get_connection, SCHEMA_VERSION};
use crate::error::{CashmopError, Result};

pub const DB_FILE_NAME: &str = "cashmop.db";
const BACKUP_PREFIX: &str = "cashmop_backup_";
const KEEP_RECENT: usize = 10;
const KEEP_WEEKS: usize = 5;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
}

pub fn backups_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("backups")
}

fn stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Copy a live database to `dest` with SQLite's online backup API.
pub fn create_backup(conn: &Connection, dest: &Path) -> Result<u64> {
    if let Some(dir) = dest.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut dest_conn = Connection::open(dest)?;
    let backup = Backup::new(conn, &mut dest_conn)?;
    backup.run_to_completion(100, Duration::from_millis(10), None)?;
    drop(backup);
    // A backup must be a single file: no -wal sidecar.
    dest_conn.query_row("PRAGMA journal_mode = DELETE", [], |r| r.get::<_, String>(0))?;
    drop(dest_conn);
    Ok(std::fs::metadata(dest)?.len())
}

/// Write `backups/cashmop_backup_<stamp>.db` and prune old backups.
pub fn create_manual_backup(data_dir: &Path, conn: &Connection) -> Result<PathBuf> {
    let dest = backups_dir(data_dir).join(format!("{BACKUP_PREFIX}{}.db", stamp()));
    create_backup(conn, &dest)?;
    tracing::debug!(path = %dest.display(), "backup created");
    if let Err(e) = cleanup_old_backups(data_dir) {
        tracing::warn!(error = %e, "failed to prune old backups");
    }
    Ok(dest)
}

fn regular_backups(data_dir: &Path) -> Result<Vec<BackupInfo>> {
    let dir = backups_dir(data_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !(name.starts_with(BACKUP_PREFIX) && name.ends_with(".db")) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else { continue };
        out.push(BackupInfo {
            path: entry.path(),
            size: meta.len(),
            modified: modified.into(),
        });
    }
    // Newest first.
    out.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
    Ok(out)
}

pub fn last_backup_info(data_dir: &Path) -> Result<Option<BackupInfo>> {
    Ok(regular_backups(data_dir)?.into_iter().next())
}

/// Keep the ten newest backups plus the newest of each of the last five
/// calendar weeks that have one; delete the rest.
pub fn cleanup_old_backups(data_dir: &Path) -> Result<usize> {
    let backups = regular_backups(data_dir)?;
    let mut keep: HashSet<&PathBuf> = backups.iter().take(KEEP_RECENT).map(|b| &b.path).collect();
    let mut weeks = HashSet::new();
    for b in &backups {
        let week = b.modified.iso_week();
        if weeks.len() >= KEEP_WEEKS && !weeks.contains(&(week.year(), week.week())) {
            continue;
        }
        if weeks.insert((week.year(), week.week())) {
            keep.insert(&b.path);
        }
    }
    let mut removed = 0usize;
    for b in &backups {
        if !keep.contains(&b.path) && std::fs::remove_file(&b.path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Check a backup file and return how many transactions it holds.
pub fn validate_backup(path: &Path) -> Result<i64> {
    let meta = std::fs::metadata(path)
        .map_err(|e| CashmopError::InvalidBackup(format!("cannot access {}: {e}", path.display())))?;
    if meta.len() == 0 {
        return Err(CashmopError::InvalidBackup("the backup file is empty".into()));
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|_| CashmopError::InvalidBackup("not a database file".into()))?;

    let integrity: String = conn
        .query_row("PRAGMA integrity_check", [], |r| r.get(0))
        .map_err(|_| CashmopError::InvalidBackup("not a database file".into()))?;
    if integrity != "ok" {
        return Err(CashmopError::InvalidBackup(format!("integrity check failed: {integrity}")));
    }

    let has_table = |name: &str| -> Result<bool> {
        let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        Ok(stmt.exists([name])?)
    };
    if !has_table("transactions")? {
        return Err(CashmopError::InvalidBackup("no transactions table".into()));
    }
    let version: Option<i64> = if has_table("metadata")? {
        crate::db::schema_version(&conn)?
    } else {
        None
    };
    if version != Some(SCHEMA_VERSION) {
        return Err(CashmopError::InvalidBackup(
            "created with a different version of cashmop".into(),
        ));
    }

    Ok(conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?)
}

/// Replace the database in `data_dir` with `backup_path`.
///
/// A `cashmop_pre_restore_<stamp>.db` copy of the current database is taken
/// first; its path is returned.
pub fn restore_backup(data_dir: &Path, backup_path: &Path) -> Result<PathBuf> {
    let count = validate_backup(backup_path)?;
    if count == 0 {
        return Err(CashmopError::InvalidBackup("the backup contains no transactions".into()));
    }

    let db_path = data_dir.join(DB_FILE_NAME);
    let safety = backups_dir(data_dir).join(format!("cashmop_pre_restore_{}.db", stamp()));
    {
        let conn = get_connection(&db_path)?;
        create_backup(&conn, &safety)?;
    }

    let tmp = db_path.with_extension("db.tmp");
    std::fs::copy(backup_path, &tmp)?;
    for suffix in ["-wal", "-shm"] {
        let side = PathBuf::from(format!("{}{suffix}", db_path.display()));
        if side.exists() {
            std::fs::remove_file(&side)?;
        }
    }
    std::fs::rename(&tmp, &db_path)?;
    tracing::debug!(from = %backup_path.display(), safety = %safety.display(), "database restored");
    Ok(safety)
}
