//! Choosing which months of a file to import, and turning the chosen rows
//! into transactions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::amount::AmountParser;
use crate::dates::{month_key, month_label, parse_date_loose};
use crate::mapping::{ImportMapping, DEFAULT_CURRENCY};
use crate::parser::ParsedFile;

pub const UNKNOWN_ACCOUNT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthOption {
    pub key: String,
    pub label: String,
    pub count: usize,
}

/// Month buckets present in the file, oldest first.
///
/// Rows whose date cell doesn't parse are not counted. Empty when the mapping
/// has no date column or the column isn't in the file.
pub fn compute_months(mapping: &ImportMapping, file: &ParsedFile) -> Vec<MonthOption> {
    let Some(idx) = file.column_index(&mapping.csv.date) else {
        return Vec::new();
    };
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in &file.rows {
        if let Some(date) = row.get(idx).and_then(|v| parse_date_loose(v)) {
            *counts.entry(month_key(date)).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .map(|(key, count)| MonthOption {
            label: month_label(&key),
            key,
            count,
        })
        .collect()
}

/// Multi-select over month buckets. Starts with only the latest month chosen.
#[derive(Debug, Clone)]
pub struct MonthSelection {
    options: Vec<MonthOption>,
    selected: BTreeSet<String>,
}

impl MonthSelection {
    pub fn new(options: Vec<MonthOption>) -> Self {
        let selected = options.last().map(|o| o.key.clone()).into_iter().collect();
        Self { options, selected }
    }

    pub fn options(&self) -> &[MonthOption] {
        &self.options
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.contains(key)
    }

    /// Flip one month. Keys not offered by the file are ignored.
    pub fn toggle(&mut self, key: &str) {
        if !self.options.iter().any(|o| o.key == key) {
            return;
        }
        if !self.selected.remove(key) {
            self.selected.insert(key.to_string());
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.options.iter().map(|o| o.key.clone()).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Selected month keys, oldest first.
    pub fn selected(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    /// Number of rows the current selection would import.
    pub fn selected_count(&self) -> usize {
        self.options
            .iter()
            .filter(|o| self.selected.contains(&o.key))
            .map(|o| o.count)
            .sum()
    }

    pub fn can_start(&self) -> bool {
        self.selected_count() > 0
    }
}

/// One normalized transaction ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRow {
    pub date: NaiveDate,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    pub account: String,
    pub owner: Option<String>,
}

struct RowReader {
    date: Option<usize>,
    description: Vec<usize>,
    account: Option<usize>,
    owner: Option<usize>,
    currency: Option<usize>,
}

fn non_blank(row: &[String], idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row.get(i))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn opt_index(file: &ParsedFile, name: Option<&str>) -> Option<usize> {
    name.and_then(|n| file.column_index(n))
}

/// Turn the rows in the selected months into transactions.
///
/// Description columns are joined with a space, skipping blanks. Currency
/// comes from the row's currency column, then the mapping default; account
/// from the row's account column, then the constant. Rows without a parseable
/// date are dropped.
pub fn normalize_transactions(file: &ParsedFile, mapping: &ImportMapping, months: &[String]) -> Vec<ImportRow> {
    let wanted: BTreeSet<&str> = months.iter().map(String::as_str).collect();
    let reader = RowReader {
        date: file.column_index(&mapping.csv.date),
        description: mapping
            .csv
            .description
            .iter()
            .filter_map(|d| file.column_index(d))
            .collect(),
        account: opt_index(file, mapping.csv.account.as_deref()),
        owner: opt_index(file, mapping.csv.owner.as_deref()),
        currency: opt_index(file, mapping.csv.currency.as_deref()),
    };
    let Some(date_idx) = reader.date else {
        return Vec::new();
    };
    let amounts = AmountParser::new(mapping, &file.headers);

    let default_currency = match mapping.currency_default.trim() {
        "" => DEFAULT_CURRENCY.to_string(),
        c => c.to_uppercase(),
    };
    let constant_account = Some(mapping.account.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    let constant_owner = mapping
        .owner
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string);

    let mut out = Vec::new();
    for row in &file.rows {
        let Some(date) = row.get(date_idx).and_then(|v| parse_date_loose(v)) else {
            continue;
        };
        if !wanted.contains(month_key(date).as_str()) {
            continue;
        }
        let description = reader
            .description
            .iter()
            .filter_map(|i| row.get(*i))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        out.push(ImportRow {
            date,
            description,
            amount_cents: amounts.amount(row),
            currency: non_blank(row, reader.currency)
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| default_currency.clone()),
            account: non_blank(row, reader.account)
                .or_else(|| constant_account.clone())
                .unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string()),
            owner: non_blank(row, reader.owner).or_else(|| constant_owner.clone()),
        });
    }
    out
}

/// The first `limit` rows the import would write.
pub fn preview(file: &ParsedFile, mapping: &ImportMapping, months: &[String], limit: usize) -> Vec<ImportRow> {
    let mut rows = normalize_transactions(file, mapping, months);
    rows.truncate(limit);
    rows
}
