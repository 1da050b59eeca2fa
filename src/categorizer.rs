use regex::Regex;
use rusqlite::Connection;

use crate::db::category_id;
use crate::error::{CashmopError, Result};
use crate::models::Rule;

pub const MATCH_TYPES: &[&str] = &["contains", "starts_with", "ends_with", "exact", "regex"];

fn matches(description: &str, pattern: &str, match_type: &str) -> bool {
    let desc_upper = description.trim().to_uppercase();
    let pat_upper = pattern.trim().to_uppercase();
    match match_type {
        "contains" => desc_upper.contains(&pat_upper),
        "starts_with" => desc_upper.starts_with(&pat_upper),
        "ends_with" => desc_upper.ends_with(&pat_upper),
        "exact" => desc_upper == pat_upper,
        "regex" => Regex::new(pattern)
            .map(|re| re.is_match(description))
            .unwrap_or(false),
        _ => false,
    }
}

fn within_bounds(amount_cents: i64, min: Option<i64>, max: Option<i64>) -> bool {
    min.map_or(true, |m| amount_cents >= m) && max.map_or(true, |m| amount_cents <= m)
}

impl Rule {
    pub fn applies_to(&self, description: &str, amount_cents: i64) -> bool {
        matches(description, &self.pattern, &self.match_type)
            && within_bounds(amount_cents, self.min_amount_cents, self.max_amount_cents)
    }
}

pub struct NewRule<'a> {
    pub pattern: &'a str,
    pub category: &'a str,
    pub vendor: Option<&'a str>,
    pub match_type: &'a str,
    pub priority: i64,
    pub min_amount_cents: Option<i64>,
    pub max_amount_cents: Option<i64>,
}

pub fn add_rule(conn: &Connection, rule: &NewRule) -> Result<i64> {
    if !MATCH_TYPES.contains(&rule.match_type) {
        return Err(CashmopError::Other(format!(
            "Unknown match type '{}'. Use one of: {}",
            rule.match_type,
            MATCH_TYPES.join(", ")
        )));
    }
    if rule.match_type == "regex" {
        Regex::new(rule.pattern).map_err(|e| CashmopError::Other(format!("Invalid regex: {e}")))?;
    }
    if let (Some(min), Some(max)) = (rule.min_amount_cents, rule.max_amount_cents) {
        if min > max {
            return Err(CashmopError::Other("Minimum amount is greater than maximum".into()));
        }
    }
    let cat_id = category_id(conn, rule.category)?
        .ok_or_else(|| CashmopError::Other(format!("Unknown category: {}", rule.category)))?;
    conn.execute(
        "INSERT INTO rules (pattern, match_type, vendor, category_id, priority, min_amount_cents, max_amount_cents) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            rule.pattern,
            rule.match_type,
            rule.vendor,
            cat_id,
            rule.priority,
            rule.min_amount_cents,
            rule.max_amount_cents,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Active rules, highest priority first.
pub fn active_rules(conn: &Connection) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.pattern, r.match_type, r.vendor, r.category_id, c.name, \
         r.min_amount_cents, r.max_amount_cents, r.priority, r.hit_count \
         FROM rules r JOIN categories c ON r.category_id = c.id \
         WHERE r.is_active = 1 ORDER BY r.priority DESC, r.id ASC",
    )?;
    let rules = stmt
        .query_map([], |row| {
            Ok(Rule {
                id: row.get(0)?,
                pattern: row.get(1)?,
                match_type: row.get(2)?,
                vendor: row.get(3)?,
                category_id: row.get(4)?,
                category: row.get(5)?,
                min_amount_cents: row.get(6)?,
                max_amount_cents: row.get(7)?,
                priority: row.get(8)?,
                hit_count: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rules)
}

pub struct CategorizeResult {
    pub categorized: usize,
    pub still_uncategorized: usize,
}

pub fn categorize_transactions(conn: &Connection) -> Result<CategorizeResult> {
    let rules = active_rules(conn)?;

    let mut txn_stmt = conn
        .prepare("SELECT id, description, amount_cents FROM transactions WHERE category_id IS NULL")?;
    let pending: Vec<(i64, String, i64)> = txn_stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut categorized = 0usize;
    let mut still_uncategorized = 0usize;

    for (txn_id, description, amount_cents) in &pending {
        match rules.iter().find(|r| r.applies_to(description, *amount_cents)) {
            Some(rule) => {
                conn.execute(
                    "UPDATE transactions SET category_id = ?1, vendor = ?2, is_flagged = 0, flag_reason = NULL WHERE id = ?3",
                    rusqlite::params![rule.category_id, rule.vendor, txn_id],
                )?;
                conn.execute("UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1", [rule.id])?;
                categorized += 1;
            }
            None => still_uncategorized += 1,
        }
    }

    tracing::debug!(categorized, still_uncategorized, "applied rules");
    Ok(CategorizeResult {
        categorized,
        still_uncategorized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ensure_account, get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn setup_txns(conn: &Connection, txns: &[(&str, i64)]) {
        let account_id = ensure_account(conn, "Test").unwrap();
        for (desc, cents) in txns {
            conn.execute(
                "INSERT INTO transactions (account_id, date, description, amount_cents, currency, is_flagged, flag_reason) \
                 VALUES (?1, '2025-01-15', ?2, ?3, 'CAD', 1, 'No matching rule')",
                rusqlite::params![account_id, desc, cents],
            )
            .unwrap();
        }
    }

    fn rule<'a>(pattern: &'a str, match_type: &'a str, category: &'a str, priority: i64) -> NewRule<'a> {
        NewRule {
            pattern,
            category,
            vendor: None,
            match_type,
            priority,
            min_amount_cents: None,
            max_amount_cents: None,
        }
    }

    fn category_of(conn: &Connection, description: &str) -> Option<String> {
        conn.query_row(
            "SELECT c.name FROM transactions t LEFT JOIN categories c ON t.category_id = c.id WHERE t.description = ?1",
            [description],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_contains_rule() {
        let (_dir, conn) = test_db();
        setup_txns(&conn, &[("LOBLAWS #123", -5000)]);
        add_rule(&conn, &rule("loblaws", "contains", "Groceries", 0)).unwrap();
        let result = categorize_transactions(&conn).unwrap();
        assert_eq!(result.categorized, 1);
        assert_eq!(result.still_uncategorized, 0);
    }

    #[test]
    fn test_starts_and_ends_with() {
        let (_dir, conn) = test_db();
        setup_txns(&conn, &[("UBER TRIP", -1500), ("EATS UBER", -2500), ("NETFLIX.COM", -1699)]);
        add_rule(&conn, &rule("UBER", "starts_with", "Transport", 0)).unwrap();
        add_rule(&conn, &rule(".com", "ends_with", "Subscriptions", 0)).unwrap();
        let result = categorize_transactions(&conn).unwrap();
        assert_eq!(result.categorized, 2);
        assert_eq!(result.still_uncategorized, 1);
        assert_eq!(category_of(&conn, "EATS UBER"), None);
    }

    #[test]
    fn test_exact_rule() {
        let (_dir, conn) = test_db();
        setup_txns(&conn, &[("RENT", -150000), ("RENTAL CAR", -9000)]);
        add_rule(&conn, &rule("rent", "exact", "Housing", 0)).unwrap();
        categorize_transactions(&conn).unwrap();
        assert_eq!(category_of(&conn, "RENT").as_deref(), Some("Housing"));
        assert_eq!(category_of(&conn, "RENTAL CAR"), None);
    }

    #[test]
    fn test_regex_rule() {
        let (_dir, conn) = test_db();
        setup_txns(&conn, &[("AWS Services 12345", -1000)]);
        add_rule(&conn, &rule(r"^AWS.*\d+$", "regex", "Subscriptions", 0)).unwrap();
        let result = categorize_transactions(&conn).unwrap();
        assert_eq!(result.categorized, 1);
    }

    #[test]
    fn test_amount_bounds() {
        let (_dir, conn) = test_db();
        setup_txns(&conn, &[("COSTCO", -25000), ("COSTCO GAS", -6000)]);
        let mut big = rule("COSTCO", "contains", "Groceries", 0);
        big.max_amount_cents = Some(-10000);
        add_rule(&conn, &big).unwrap();
        categorize_transactions(&conn).unwrap();
        assert_eq!(category_of(&conn, "COSTCO").as_deref(), Some("Groceries"));
        assert_eq!(category_of(&conn, "COSTCO GAS"), None);
    }

    #[test]
    fn test_higher_priority_wins() {
        let (_dir, conn) = test_db();
        setup_txns(&conn, &[("PAYMENT RECEIVED", 10000)]);
        add_rule(&conn, &rule("PAYMENT", "contains", "Salary", 10)).unwrap();
        add_rule(&conn, &rule("PAYMENT", "contains", "Fees", 5)).unwrap();
        categorize_transactions(&conn).unwrap();
        assert_eq!(category_of(&conn, "PAYMENT RECEIVED").as_deref(), Some("Salary"));
    }

    #[test]
    fn test_hit_count_incremented() {
        let (_dir, conn) = test_db();
        setup_txns(&conn, &[("SPOTIFY P1", -999), ("SPOTIFY P2", -999)]);
        add_rule(&conn, &rule("SPOTIFY", "contains", "Subscriptions", 0)).unwrap();
        categorize_transactions(&conn).unwrap();
        assert_eq!(active_rules(&conn).unwrap()[0].hit_count, 2);
    }

    #[test]
    fn test_add_rule_validation() {
        let (_dir, conn) = test_db();
        assert!(add_rule(&conn, &rule("x", "fuzzy", "Groceries", 0)).is_err());
        assert!(add_rule(&conn, &rule("(", "regex", "Groceries", 0)).is_err());
        assert!(add_rule(&conn, &rule("x", "contains", "Yachts", 0)).is_err());
        let mut bad = rule("x", "contains", "Groceries", 0);
        bad.min_amount_cents = Some(10);
        bad.max_amount_cents = Some(5);
        assert!(add_rule(&conn, &bad).is_err());
    }
}
