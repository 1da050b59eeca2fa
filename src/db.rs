use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS owners (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category_type TEXT NOT NULL,
    description TEXT,
    is_active INTEGER DEFAULT 1
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    owner_id INTEGER,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    currency TEXT NOT NULL,
    category_id INTEGER,
    vendor TEXT,
    is_flagged INTEGER DEFAULT 0,
    flag_reason TEXT,
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (owner_id) REFERENCES owners(id),
    FOREIGN KEY (category_id) REFERENCES categories(id),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_dedupe
    ON transactions (account_id, date, amount_cents, description);

CREATE TABLE IF NOT EXISTS column_mappings (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    mapping_json TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL,
    match_type TEXT DEFAULT 'contains',
    vendor TEXT,
    category_id INTEGER NOT NULL,
    min_amount_cents INTEGER,
    max_amount_cents INTEGER,
    priority INTEGER DEFAULT 0,
    hit_count INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

// (name, category_type, description)
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    // Income
    ("Salary", "income", "Paycheques and direct deposits"),
    ("Interest", "income", "Bank interest and dividends"),
    ("Refunds", "income", "Returns and reimbursements"),
    ("Other Income", "income", "Anything else coming in"),
    // Expenses
    ("Groceries", "expense", "Supermarkets and food shops"),
    ("Dining", "expense", "Restaurants, cafes, takeout"),
    ("Housing", "expense", "Rent, mortgage, property tax"),
    ("Utilities", "expense", "Power, water, internet, phone"),
    ("Transport", "expense", "Transit, fuel, parking, rideshare"),
    ("Health", "expense", "Pharmacy, dental, medical"),
    ("Shopping", "expense", "Clothing, household, electronics"),
    ("Entertainment", "expense", "Streaming, events, hobbies"),
    ("Travel", "expense", "Flights, hotels"),
    ("Subscriptions", "expense", "Recurring software and memberships"),
    ("Fees", "expense", "Bank charges and card fees"),
    ("Transfer", "expense", "Moves between your own accounts"),
    ("Uncategorized", "expense", "Needs review"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, category_type, description) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (name, category_type, description) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, category_type, description],
            )?;
        }
    }
    set_metadata(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
    Ok(())
}

pub fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |r| r.get(0))
        .optional()?)
}

pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<Option<i64>> {
    Ok(get_metadata(conn, "schema_version")?.and_then(|v| v.parse().ok()))
}

/// Id of the named account, creating it on first use.
pub fn ensure_account(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO accounts (name) VALUES (?1)", [name])?;
    Ok(conn.query_row("SELECT id FROM accounts WHERE name = ?1", [name], |r| r.get(0))?)
}

/// Id of the named owner, creating it on first use.
pub fn ensure_owner(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO owners (name) VALUES (?1)", [name])?;
    Ok(conn.query_row("SELECT id FROM owners WHERE name = ?1", [name], |r| r.get(0))?)
}

fn names(conn: &Connection, sql: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

pub fn account_names(conn: &Connection) -> Result<Vec<String>> {
    names(conn, "SELECT name FROM accounts ORDER BY name")
}

pub fn owner_names(conn: &Connection) -> Result<Vec<String>> {
    names(conn, "SELECT name FROM owners ORDER BY name")
}

pub fn category_names(conn: &Connection) -> Result<Vec<String>> {
    names(conn, "SELECT name FROM categories WHERE is_active = 1 ORDER BY name")
}

pub fn category_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM categories WHERE name = ?1 COLLATE NOCASE",
            [name],
            |r| r.get(0),
        )
        .optional()?)
}
