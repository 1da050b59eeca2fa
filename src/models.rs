#[derive(Debug, Clone)]
pub struct Rule {
    pub id: i64,
    pub pattern: String,
    pub match_type: String,
    pub vendor: Option<String>,
    pub category_id: i64,
    pub category: String,
    pub min_amount_cents: Option<i64>,
    pub max_amount_cents: Option<i64>,
    pub priority: i64,
    pub hit_count: i64,
}

/// Row counts shown by `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub accounts: i64,
    pub owners: i64,
    pub transactions: i64,
    pub uncategorized: i64,
    pub rules: i64,
    pub mappings: i64,
}

impl Summary {
    pub fn load(conn: &rusqlite::Connection) -> crate::error::Result<Self> {
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };
        Ok(Self {
            accounts: count("SELECT count(*) FROM accounts")?,
            owners: count("SELECT count(*) FROM owners")?,
            transactions: count("SELECT count(*) FROM transactions")?,
            uncategorized: count("SELECT count(*) FROM transactions WHERE category_id IS NULL")?,
            rules: count("SELECT count(*) FROM rules WHERE is_active = 1")?,
            mappings: count("SELECT count(*) FROM column_mappings")?,
        })
    }
}
