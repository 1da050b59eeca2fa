use std::collections::HashMap;
use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::db::{ensure_account, ensure_owner};
use crate::error::Result;
use crate::range::ImportRow;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    Ok(checksum_bytes(&data))
}

pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn is_duplicate_file(conn: &Connection, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM imports WHERE checksum = ?1")?;
    Ok(stmt.exists([checksum])?)
}

fn is_duplicate_row(conn: &Connection, account_id: i64, row: &ImportRow) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM transactions \
         WHERE account_id = ?1 AND date = ?2 AND amount_cents = ?3 AND description = ?4",
    )?;
    Ok(stmt.exists(rusqlite::params![
        account_id,
        row.date.to_string(),
        row.amount_cents,
        row.description
    ])?)
}

// ---------------------------------------------------------------------------
// commit_import
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub duplicate_file: bool,
}

/// Write normalized rows in one transaction.
///
/// Accounts and owners are created on first use. A row identical to a stored
/// one (same account, date, amount, description) is skipped. A file whose
/// checksum was already imported writes nothing and reports `duplicate_file`.
pub fn commit_import(
    conn: &Connection,
    file_name: &str,
    checksum: &str,
    rows: &[ImportRow],
) -> Result<ImportResult> {
    if is_duplicate_file(conn, checksum)? {
        tracing::debug!(file = file_name, "checksum already imported");
        return Ok(ImportResult {
            duplicate_file: true,
            ..ImportResult::default()
        });
    }

    let tx = conn.unchecked_transaction()?;

    let min_date = rows.iter().map(|r| r.date).min();
    let max_date = rows.iter().map(|r| r.date).max();
    tx.execute(
        "INSERT INTO imports (filename, record_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            file_name,
            rows.len() as i64,
            min_date.map(|d| d.to_string()),
            max_date.map(|d| d.to_string()),
            checksum,
        ],
    )?;
    let import_id = tx.last_insert_rowid();

    let mut accounts: HashMap<&str, i64> = HashMap::new();
    let mut owners: HashMap<&str, i64> = HashMap::new();
    let mut imported = 0usize;
    let mut skipped = 0usize;

    for row in rows {
        let account_id = match accounts.get(row.account.as_str()) {
            Some(id) => *id,
            None => {
                let id = ensure_account(&tx, &row.account)?;
                accounts.insert(&row.account, id);
                id
            }
        };
        let owner_id = match row.owner.as_deref() {
            Some(name) => Some(match owners.get(name) {
                Some(id) => *id,
                None => {
                    let id = ensure_owner(&tx, name)?;
                    owners.insert(name, id);
                    id
                }
            }),
            None => None,
        };

        if is_duplicate_row(&tx, account_id, row)? {
            skipped += 1;
            continue;
        }
        tx.execute(
            "INSERT INTO transactions \
             (account_id, owner_id, date, description, amount_cents, currency, is_flagged, flag_reason, import_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 'No matching rule', ?7)",
            rusqlite::params![
                account_id,
                owner_id,
                row.date.to_string(),
                row.description,
                row.amount_cents,
                row.currency,
                import_id,
            ],
        )?;
        imported += 1;
    }

    tx.commit()?;
    tracing::debug!(file = file_name, imported, skipped, "import committed");
    Ok(ImportResult {
        imported,
        skipped,
        duplicate_file: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use chrono::NaiveDate;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn row(date: &str, description: &str, cents: i64, account: &str) -> ImportRow {
        ImportRow {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: description.to_string(),
            amount_cents: cents,
            currency: "CAD".to_string(),
            account: account.to_string(),
            owner: None,
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_commit_inserts_and_creates_accounts() {
        let (_dir, conn) = test_db();
        let mut owned = row("2025-01-16", "PAYROLL", 250000, "Chequing");
        owned.owner = Some("Sam".into());
        let rows = vec![row("2025-01-15", "COFFEE", -450, "Visa"), owned];
        let result = commit_import(&conn, "stmt.csv", "abc", &rows).unwrap();
        assert_eq!(result.imported, 2);
        assert_eq!(result.skipped, 0);
        assert!(!result.duplicate_file);
        assert_eq!(count(&conn, "transactions"), 2);
        assert_eq!(count(&conn, "accounts"), 2);
        assert_eq!(count(&conn, "owners"), 1);
    }

    #[test]
    fn test_commit_refuses_same_checksum() {
        let (_dir, conn) = test_db();
        let rows = vec![row("2025-01-15", "COFFEE", -450, "Visa")];
        commit_import(&conn, "stmt.csv", "same", &rows).unwrap();
        let again = commit_import(&conn, "stmt-copy.csv", "same", &rows).unwrap();
        assert!(again.duplicate_file);
        assert_eq!(again.imported, 0);
        assert_eq!(count(&conn, "imports"), 1);
    }

    #[test]
    fn test_commit_skips_duplicate_rows() {
        let (_dir, conn) = test_db();
        commit_import(
            &conn,
            "jan.csv",
            "one",
            &[row("2025-01-15", "COFFEE", -450, "Visa"), row("2025-01-16", "RENT", -120000, "Visa")],
        )
        .unwrap();
        let second = commit_import(
            &conn,
            "jan-feb.csv",
            "two",
            &[row("2025-01-16", "RENT", -120000, "Visa"), row("2025-02-01", "RENT", -120000, "Visa")],
        )
        .unwrap();
        assert_eq!(second.imported, 1);
        assert_eq!(second.skipped, 1);
    }

    #[test]
    fn test_commit_records_batch_range() {
        let (_dir, conn) = test_db();
        commit_import(
            &conn,
            "stmt.csv",
            "range",
            &[row("2025-02-03", "B", -1, "Visa"), row("2025-01-20", "A", -1, "Visa")],
        )
        .unwrap();
        let (start, end, n): (String, String, i64) = conn
            .query_row(
                "SELECT date_range_start, date_range_end, record_count FROM imports",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(start, "2025-01-20");
        assert_eq!(end, "2025-02-03");
        assert_eq!(n, 2);
    }
}
