use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::categorizer::categorize_transactions;
use crate::cli::{load_file, open_backend, resolve_mapping};
use crate::dates::is_month_key;
use crate::detection::with_meta;
use crate::error::{CashmopError, Result};
use crate::importer::{commit_import, compute_checksum};
use crate::mapping::{ColumnMapper, ImportMapping};
use crate::prefs::{prefs_path, JsonFileStore, PreferenceCache};
use crate::range::{compute_months, normalize_transactions, MonthOption, MonthSelection};
use crate::service::Backend;

pub struct ImportArgs<'a> {
    pub file: &'a str,
    pub mapping: Option<&'a str>,
    pub months: &'a [String],
    pub account: Option<&'a str>,
    pub owner: Option<&'a str>,
    pub save_mapping: Option<&'a str>,
    pub dry_run: bool,
    pub apply_rules: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct ImportResponse {
    ok: bool,
    imported_count: usize,
    skipped_count: usize,
    duplicate_file: bool,
    months: Vec<String>,
    applied_rules: bool,
    applied_count: usize,
}

#[derive(Serialize)]
struct DryRunResponse {
    ok: bool,
    dry_run: bool,
    parsed_count: usize,
    months: Vec<String>,
    warnings: Vec<String>,
}

/// Check requested `--month` values against the months present in the file.
pub(crate) fn validate_months(options: &[MonthOption], requested: &[String]) -> Result<()> {
    for key in requested {
        if !is_month_key(key) {
            return Err(CashmopError::Other(format!(
                "Invalid month '{key}'. Use YYYY-MM."
            )));
        }
        if !options.iter().any(|o| &o.key == key) {
            let available: Vec<&str> = options.iter().map(|o| o.key.as_str()).collect();
            return Err(CashmopError::Other(format!(
                "Month {key} not found in file (available: {}).",
                available.join(", ")
            )));
        }
    }
    Ok(())
}

/// Months to import: the requested ones, or the only month in the file.
pub(crate) fn choose_months(options: &[MonthOption], requested: &[String]) -> Result<Vec<String>> {
    if options.is_empty() {
        return Err(CashmopError::Other(
            "No valid transaction dates found in the file.".into(),
        ));
    }
    let mut selection = MonthSelection::new(options.to_vec());
    if requested.is_empty() {
        if options.len() > 1 {
            let keys: Vec<&str> = options.iter().map(|o| o.key.as_str()).collect();
            return Err(CashmopError::Other(format!(
                "File contains multiple months ({}). Repeat --month to select which months to import.",
                keys.join(", ")
            )));
        }
        return Ok(selection.selected());
    }

    validate_months(options, requested)?;
    selection.clear();
    for key in requested {
        if !selection.is_selected(key) {
            selection.toggle(key);
        }
    }
    if !selection.can_start() {
        return Err(CashmopError::Other("The selected months have no rows.".into()));
    }
    Ok(selection.selected())
}

fn apply_overrides(mapping: ImportMapping, account: Option<&str>, owner: Option<&str>) -> ImportMapping {
    let mut mapper = ColumnMapper::new(mapping);
    if let Some(account) = account {
        if let Some(column) = mapper.mapping().csv.account.clone() {
            mapper.remove_header_everywhere(&column);
        }
        mapper.set_account(account);
    }
    if let Some(owner) = owner {
        if let Some(column) = mapper.mapping().csv.owner.clone() {
            mapper.remove_header_everywhere(&column);
        }
        mapper.set_owner(Some(owner));
    }
    mapper.into_mapping()
}

pub fn run(args: &ImportArgs) -> Result<()> {
    let parsed = load_file(args.file)?;
    let backend = open_backend()?;
    let (mapping, source) = resolve_mapping(&backend, &parsed, args.mapping)?;
    let mapping = apply_overrides(mapping, args.account, args.owner);
    tracing::info!(file = args.file, source = %source, "resolved mapping");

    let missing: Vec<&str> = mapping.missing_fields().iter().map(|f| f.key()).collect();
    if !missing.is_empty() {
        return Err(CashmopError::InvalidMapping(format!(
            "missing {} ({source}). Pass --mapping or --account.",
            missing.join(", ")
        )));
    }

    let options = compute_months(&mapping, &parsed);
    let months = choose_months(&options, args.months)?;
    let rows = normalize_transactions(&parsed, &mapping, &months);

    if args.dry_run {
        let dated: usize = options.iter().map(|o| o.count).sum();
        let mut warnings = Vec::new();
        if dated < parsed.rows.len() {
            warnings.push(format!(
                "{} rows without a valid date will be skipped",
                parsed.rows.len() - dated
            ));
        }
        let all: Vec<String> = options.into_iter().map(|o| o.key).collect();
        if args.json {
            let response = DryRunResponse {
                ok: true,
                dry_run: true,
                parsed_count: rows.len(),
                months: all,
                warnings,
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            println!("Dry run: {} transactions from {}", rows.len(), months.join(", "));
            println!("Months in file: {}", all.join(", "));
            for w in &warnings {
                println!("{} {w}", "warning:".yellow());
            }
        }
        return Ok(());
    }

    let checksum = compute_checksum(Path::new(args.file))?;
    let result = commit_import(backend.conn(), &parsed.file_name, &checksum, &rows)?;

    if !result.duplicate_file {
        let mut cache = PreferenceCache::new(JsonFileStore::new(prefs_path()));
        for row in &rows {
            cache.remember_account(&row.account);
            if let Some(owner) = &row.owner {
                cache.remember_owner(owner);
            }
        }
    }

    let applied_count = if args.apply_rules && !result.duplicate_file {
        categorize_transactions(backend.conn())?.categorized
    } else {
        0
    };

    if let Some(name) = args.save_mapping {
        let id = backend.save_column_mapping(name, &with_meta(mapping, &parsed))?;
        tracing::info!(id, name, "saved mapping");
        if !args.json {
            println!("Saved mapping '{}'", name.trim());
        }
    }

    if args.json {
        let response = ImportResponse {
            ok: !result.duplicate_file,
            imported_count: result.imported,
            skipped_count: result.skipped,
            duplicate_file: result.duplicate_file,
            months,
            applied_rules: applied_count > 0,
            applied_count,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!(
        "{} imported, {} skipped (duplicates) from {}",
        result.imported.to_string().green(),
        result.skipped,
        months.join(", ")
    );
    if args.apply_rules {
        println!("{applied_count} categorized by rules");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CsvField;

    fn option(key: &str) -> MonthOption {
        MonthOption {
            key: key.into(),
            label: key.into(),
            count: 1,
        }
    }

    #[test]
    fn test_single_month_is_chosen() {
        assert_eq!(choose_months(&[option("2025-01")], &[]).unwrap(), vec!["2025-01"]);
    }

    #[test]
    fn test_multiple_months_require_selection() {
        let err = choose_months(&[option("2025-01"), option("2025-02")], &[]).unwrap_err();
        assert!(err.to_string().contains("2025-01, 2025-02"));
    }

    #[test]
    fn test_no_months_is_error() {
        let err = choose_months(&[], &[]).unwrap_err();
        assert!(err.to_string().contains("No valid transaction dates"));
    }

    #[test]
    fn test_requested_months_validated() {
        let options = [option("2025-01"), option("2025-02")];
        assert!(choose_months(&options, &["2025-1".to_string()]).is_err());
        assert!(choose_months(&options, &["2025-03".to_string()]).is_err());
        let months = choose_months(&options, &["2025-02".to_string(), "2025-01".to_string(), "2025-02".to_string()]).unwrap();
        assert_eq!(months, vec!["2025-01", "2025-02"]);
    }

    #[test]
    fn test_account_override_replaces_column() {
        let mut mapper = ColumnMapper::default();
        mapper.assign_header_to_field(CsvField::Account, "Card");
        let mapping = apply_overrides(mapper.into_mapping(), Some("TD Visa"), Some("Alex"));
        assert_eq!(mapping.csv.account, None);
        assert_eq!(mapping.account, "TD Visa");
        assert_eq!(mapping.owner.as_deref(), Some("Alex"));
    }
}
