use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension};

use crate::db::category_id;
use crate::error::{CashmopError, Result};
use crate::fmt::decimal;
use crate::fuzzy::fuzzy_match;

/// Longest span `tx list` and `export` accept, in days.
pub const MAX_RANGE_DAYS: i64 = 93;

const UNCATEGORIZED: &str = "Uncategorized";

// ---------------------------------------------------------------------------
// Date ranges
// ---------------------------------------------------------------------------

/// First and last day of the calendar month before `today`.
pub fn last_full_month(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first_this_month = today.with_day(1).unwrap_or(today);
    let end = first_this_month.pred_opt().unwrap_or(first_this_month);
    (end.with_day(1).unwrap_or(end), end)
}

fn parse_day(raw: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CashmopError::Other(format!("Invalid --{flag} date '{raw}' (use YYYY-MM-DD)")))
}

/// `--start`/`--end` go together; omitting both means last month.
pub fn validate_date_range(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let (start, end) = match (start, end) {
        (None, None) => return Ok(last_full_month(today)),
        (Some(s), Some(e)) => (parse_day(s, "start")?, parse_day(e, "end")?),
        _ => {
            return Err(CashmopError::Other(
                "--start requires --end (omit both for last month)".into(),
            ))
        }
    };
    if end < start {
        return Err(CashmopError::Other("--end must be on or after --start".into()));
    }
    if (end - start).num_days() > MAX_RANGE_DAYS {
        return Err(CashmopError::Other(format!(
            "Date range must be {MAX_RANGE_DAYS} days or less"
        )));
    }
    Ok((start, end))
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRow {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    pub category: Option<String>,
    pub account: String,
    pub owner: Option<String>,
}

impl TxRow {
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }

    fn search_label(&self) -> String {
        format!(
            "{} | {} | {} | {} | {} | {} | {} ::{}",
            self.description,
            self.account,
            self.category_label(),
            self.owner.as_deref().unwrap_or("No Owner"),
            self.date,
            decimal(self.amount_cents),
            self.currency,
            self.id
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortField {
    #[default]
    Date,
    Amount,
}

#[derive(Debug, Clone, Default)]
pub struct TxFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub category_ids: Vec<i64>,
    pub uncategorized: bool,
    pub query: Option<String>,
    pub min_cents: Option<i64>,
    pub max_cents: Option<i64>,
    pub sort: SortField,
    pub ascending: bool,
}

/// Transactions in the filter's date range and categories. A non-empty
/// query keeps only fuzzy hits on description, account, category, owner,
/// date and amount.
pub fn query_transactions(conn: &Connection, filter: &TxFilter) -> Result<Vec<TxRow>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(start) = filter.start {
        params.push(Box::new(start.to_string()));
        clauses.push(format!("t.date >= ?{}", params.len()));
    }
    if let Some(end) = filter.end {
        params.push(Box::new(end.to_string()));
        clauses.push(format!("t.date <= ?{}", params.len()));
    }
    if !filter.category_ids.is_empty() || filter.uncategorized {
        let mut any: Vec<String> = Vec::new();
        for id in &filter.category_ids {
            params.push(Box::new(*id));
            any.push(format!("t.category_id = ?{}", params.len()));
        }
        if filter.uncategorized {
            any.push("t.category_id IS NULL".into());
        }
        clauses.push(format!("({})", any.join(" OR ")));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT t.id, t.date, t.description, t.amount_cents, t.currency, c.name, a.name, o.name \
         FROM transactions t \
         JOIN accounts a ON t.account_id = a.id \
         LEFT JOIN owners o ON t.owner_id = o.id \
         LEFT JOIN categories c ON t.category_id = c.id \
         {where_clause} \
         ORDER BY t.date, t.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut rows: Vec<TxRow> = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(TxRow {
                id: row.get(0)?,
                date: row.get(1)?,
                description: row.get(2)?,
                amount_cents: row.get(3)?,
                currency: row.get(4)?,
                category: row.get(5)?,
                account: row.get(6)?,
                owner: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if let Some(query) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
        let labels: Vec<String> = rows.iter().map(TxRow::search_label).collect();
        let hits = fuzzy_match(query, &labels);
        rows = rows
            .into_iter()
            .zip(labels)
            .filter(|(_, label)| hits.contains(label))
            .map(|(row, _)| row)
            .collect();
    }

    rows.retain(|r| {
        filter.min_cents.map_or(true, |min| r.amount_cents >= min)
            && filter.max_cents.map_or(true, |max| r.amount_cents <= max)
    });

    match filter.sort {
        SortField::Date => rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id))),
        SortField::Amount => {
            rows.sort_by(|a, b| a.amount_cents.cmp(&b.amount_cents).then(a.id.cmp(&b.id)))
        }
    }
    if !filter.ascending {
        rows.reverse();
    }
    Ok(rows)
}

/// Set a transaction's category by name, creating the category if needed.
/// `None` clears it. Returns the category id that was set.
pub fn set_transaction_category(conn: &Connection, id: i64, category: Option<&str>) -> Result<Option<i64>> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM transactions WHERE id = ?1)",
        [id],
        |r| r.get(0),
    )?;
    if !exists {
        return Err(CashmopError::Other(format!("Transaction not found: id {id}")));
    }

    match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(name) => {
            let category_id = get_or_create_category(conn, name)?;
            conn.execute(
                "UPDATE transactions SET category_id = ?1, is_flagged = 0, flag_reason = NULL WHERE id = ?2",
                rusqlite::params![category_id, id],
            )?;
            Ok(Some(category_id))
        }
        None => {
            conn.execute(
                "UPDATE transactions SET category_id = NULL, is_flagged = 1, flag_reason = 'Uncategorized' WHERE id = ?1",
                [id],
            )?;
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub category_type: String,
}

pub fn list_categories(conn: &Connection) -> Result<Vec<CategoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category_type FROM categories WHERE is_active = 1 \
         ORDER BY CASE category_type WHEN 'income' THEN 0 ELSE 1 END, name ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CategoryRow {
                id: row.get(0)?,
                name: row.get(1)?,
                category_type: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Id of the named category (case-insensitive), creating an expense
/// category when there is none.
pub fn get_or_create_category(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CashmopError::Other("Name is required".into()));
    }
    if let Some(id) = category_id(conn, name)? {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO categories (name, category_type) VALUES (?1, 'expense')",
        [name],
    )?;
    tracing::debug!(name, "created category");
    Ok(conn.last_insert_rowid())
}

pub fn rename_category(conn: &Connection, id: i64, new_name: &str) -> Result<()> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(CashmopError::Other("Name is required".into()));
    }
    let clash: Option<i64> = conn
        .query_row(
            "SELECT id FROM categories WHERE name = ?1 COLLATE NOCASE AND id != ?2",
            rusqlite::params![new_name, id],
            |r| r.get(0),
        )
        .optional()?;
    if clash.is_some() {
        return Err(CashmopError::Other(format!("Category name already exists: {new_name}")));
    }
    let updated = conn.execute(
        "UPDATE categories SET name = ?1 WHERE id = ?2 AND is_active = 1",
        rusqlite::params![new_name, id],
    )?;
    if updated == 0 {
        return Err(CashmopError::Other(format!("Category not found: id {id}")));
    }
    Ok(())
}
