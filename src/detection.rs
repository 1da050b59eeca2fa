//! Recognising a file layout: matching saved presets against a file's headers
//! and guessing a first mapping when nothing matches.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;

use crate::mapping::{AmountMapping, ImportMapping, MappingMeta, SavedMapping};
use crate::parser::ParsedFile;

const MIN_HEADERS_FOR_SUBSET_MATCH: usize = 4;
const MIN_SCORE: usize = 3;
const MIN_RATIO: f64 = 0.75;

pub fn normalize_header(h: &str) -> String {
    h.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalized_set(headers: &[String]) -> BTreeSet<String> {
    headers
        .iter()
        .map(|h| normalize_header(h))
        .filter(|h| !h.is_empty())
        .collect()
}

/// Order- and spelling-insensitive fingerprint of a header row.
pub fn headers_signature(headers: &[String]) -> String {
    normalized_set(headers)
        .into_iter()
        .collect::<Vec<_>>()
        .join("\u{0}")
}

/// True when two headers collapse to the same normalized name.
pub fn has_ambiguous_headers(headers: &[String]) -> bool {
    let mut seen = BTreeSet::new();
    headers
        .iter()
        .map(|h| normalize_header(h))
        .filter(|h| !h.is_empty())
        .any(|h| !seen.insert(h))
}

/// Re-resolve a mapping's column names to the file's own spelling.
pub fn rebind_to_headers(mapping: &ImportMapping, headers: &[String]) -> ImportMapping {
    let mut by_key: HashMap<String, &String> = HashMap::new();
    for h in headers {
        let key = normalize_header(h);
        if !key.is_empty() {
            by_key.entry(key).or_insert(h);
        }
    }
    let resolve = |name: &str| -> String {
        by_key
            .get(&normalize_header(name))
            .map(|h| (*h).clone())
            .unwrap_or_else(|| name.to_string())
    };
    let resolve_opt = |name: &Option<String>| name.as_deref().map(resolve);

    let mut out = mapping.clone();
    let csv = &mut out.csv;
    csv.date = resolve(&csv.date);
    csv.description = csv.description.iter().map(|d| resolve(d)).collect();
    csv.owner = resolve_opt(&csv.owner);
    csv.account = resolve_opt(&csv.account);
    csv.currency = resolve_opt(&csv.currency);
    csv.amount_mapping = match &csv.amount_mapping {
        AmountMapping::Single {
            column,
            invert_sign,
        } => AmountMapping::Single {
            column: resolve(column),
            invert_sign: *invert_sign,
        },
        AmountMapping::DebitCredit {
            debit_column,
            credit_column,
            invert_sign,
        } => AmountMapping::DebitCredit {
            debit_column: resolve_opt(debit_column),
            credit_column: resolve_opt(credit_column),
            invert_sign: *invert_sign,
        },
        AmountMapping::AmountWithType {
            amount_column,
            type_column,
            negative_value,
            positive_value,
            invert_sign,
        } => AmountMapping::AmountWithType {
            amount_column: resolve(amount_column),
            type_column: resolve(type_column),
            negative_value: negative_value.clone(),
            positive_value: positive_value.clone(),
            invert_sign: *invert_sign,
        },
    };
    if let AmountMapping::Single { column, .. } = &csv.amount_mapping {
        csv.amount = column.clone();
    }
    out
}

/// Rebind a preset to a file, then drop bindings to columns the file lacks.
pub fn apply_preset_to_headers(mapping: &ImportMapping, headers: &[String]) -> ImportMapping {
    let mut out = rebind_to_headers(mapping, headers);
    let present: BTreeSet<&str> = headers.iter().map(String::as_str).collect();
    let keep = |name: &str| present.contains(name);
    let keep_opt = |name: Option<String>| name.filter(|n| keep(n));

    let csv = &mut out.csv;
    if !keep(&csv.date) {
        csv.date.clear();
    }
    csv.description.retain(|d| keep(d));
    csv.owner = keep_opt(csv.owner.take());
    csv.account = keep_opt(csv.account.take());
    csv.currency = keep_opt(csv.currency.take());
    match &mut csv.amount_mapping {
        AmountMapping::Single { column, .. } => {
            if !keep(column) {
                column.clear();
            }
            csv.amount = column.clone();
        }
        AmountMapping::DebitCredit {
            debit_column,
            credit_column,
            ..
        } => {
            *debit_column = keep_opt(debit_column.take());
            *credit_column = keep_opt(credit_column.take());
        }
        AmountMapping::AmountWithType {
            amount_column,
            type_column,
            ..
        } => {
            if !keep(amount_column) {
                amount_column.clear();
            }
            if !keep(type_column) {
                type_column.clear();
            }
        }
    }
    out
}

struct HeaderEntry<'a> {
    header: &'a str,
    index: usize,
    normalized: String,
    plain: String,
}

fn plain_form(header: &str) -> String {
    normalize_header(header)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn keyword_matches(entry: &HeaderEntry, keyword: &str) -> bool {
    let needle = keyword.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    // Short alphanumeric keywords ("in", "out", "amt") must be whole words.
    if needle.len() <= 3 && needle.chars().all(|c| c.is_ascii_alphanumeric()) {
        let pattern = format!(r"\b{}\b", regex::escape(&needle));
        return Regex::new(&pattern)
            .map(|re| re.is_match(&entry.plain))
            .unwrap_or(false);
    }
    entry.normalized.contains(&needle) || entry.plain.contains(&needle)
}

fn find_by_keywords<'a>(entries: &'a [HeaderEntry<'a>], keywords: &[&str]) -> Vec<&'a HeaderEntry<'a>> {
    entries
        .iter()
        .filter(|e| keywords.iter().any(|kw| keyword_matches(e, kw)))
        .collect()
}

/// The single unused candidate, or nothing when the choice is ambiguous.
fn take_unique(candidates: &[&HeaderEntry], used: &mut BTreeSet<String>) -> Option<String> {
    let unique: Vec<&str> = candidates
        .iter()
        .map(|c| c.header)
        .filter(|h| !used.contains(*h))
        .collect();
    if unique.len() != 1 {
        return None;
    }
    let header = unique[0].to_string();
    used.insert(header.clone());
    Some(header)
}

/// Keyword-based first guess used when no saved preset fits the file.
pub fn heuristic_prefill(headers: &[String], base: &ImportMapping) -> ImportMapping {
    let entries: Vec<HeaderEntry> = headers
        .iter()
        .enumerate()
        .map(|(index, h)| HeaderEntry {
            header: h,
            index,
            normalized: normalize_header(h),
            plain: plain_form(h),
        })
        .collect();

    let mut next = base.clone();
    let invert_sign = base.csv.amount_mapping.invert_sign();
    next.csv.date.clear();
    next.csv.description.clear();
    next.csv.account = None;
    next.csv.currency = None;
    next.csv.amount_mapping = AmountMapping::Single {
        column: String::new(),
        invert_sign,
    };

    let mut used = BTreeSet::new();

    if let Some(date) = take_unique(
        &find_by_keywords(&entries, &["date", "posted", "transaction date"]),
        &mut used,
    ) {
        next.csv.date = date;
    }

    let mut description: Vec<&HeaderEntry> = find_by_keywords(
        &entries,
        &["description", "desc", "memo", "payee", "merchant", "name"],
    )
    .into_iter()
    .filter(|e| !used.contains(e.header))
    .collect();
    description.sort_by_key(|e| e.index);
    for e in &description {
        used.insert(e.header.to_string());
        next.csv.description.push(e.header.to_string());
    }

    let debit = take_unique(&find_by_keywords(&entries, &["debit", "withdrawal", "out"]), &mut used);
    let credit = take_unique(&find_by_keywords(&entries, &["credit", "deposit", "in"]), &mut used);

    if debit.is_some() || credit.is_some() {
        next.csv.amount_mapping = AmountMapping::DebitCredit {
            debit_column: debit,
            credit_column: credit,
            invert_sign,
        };
    } else {
        let kind = take_unique(
            &find_by_keywords(&entries, &["type", "dr/cr", "debit/credit", "direction"]),
            &mut used,
        );
        let amount = take_unique(&find_by_keywords(&entries, &["amount", "amt", "value"]), &mut used);
        next.csv.amount_mapping = match (amount, kind) {
            (amount, Some(kind)) => AmountMapping::AmountWithType {
                amount_column: amount.unwrap_or_default(),
                type_column: kind,
                negative_value: crate::mapping::DEFAULT_NEGATIVE_VALUE.to_string(),
                positive_value: crate::mapping::DEFAULT_POSITIVE_VALUE.to_string(),
                invert_sign,
            },
            (Some(amount), None) => AmountMapping::Single {
                column: amount,
                invert_sign,
            },
            (None, None) => next.csv.amount_mapping.clone(),
        };
    }
    next.normalize_amount_mapping();

    if let Some(account) = take_unique(&find_by_keywords(&entries, &["account"]), &mut used) {
        next.csv.account = Some(account);
        next.account.clear();
    }
    if let Some(currency) = take_unique(&find_by_keywords(&entries, &["currency", "ccy"]), &mut used) {
        next.csv.currency = Some(currency);
    }

    next
}

/// A preset chosen for a file.
#[derive(Debug, Clone, PartialEq)]
pub struct PickedMapping {
    pub id: i64,
    pub name: String,
    pub mapping: ImportMapping,
}

fn meta_headers(mapping: &ImportMapping) -> Option<&Vec<String>> {
    mapping.meta.as_ref().and_then(|m| m.headers.as_ref())
}

fn meta_has_header(mapping: &ImportMapping) -> Option<bool> {
    mapping.meta.as_ref().and_then(|m| m.has_header)
}

/// Pick the saved preset that best fits a file's headers.
///
/// An identical header signature wins outright. Otherwise presets are scored
/// by how many of their bound columns the file has; a candidate must match
/// its date, amount and at least one description column.
pub fn pick_best_mapping(file: &ParsedFile, presets: &[SavedMapping]) -> Option<PickedMapping> {
    if !file.has_header || has_ambiguous_headers(&file.headers) {
        return None;
    }
    let picked = |sm: &SavedMapping| PickedMapping {
        id: sm.id,
        name: sm.name.clone(),
        mapping: rebind_to_headers(&sm.mapping, &file.headers),
    };

    let file_sig = headers_signature(&file.headers);
    for sm in presets {
        let Some(headers) = meta_headers(&sm.mapping) else {
            continue;
        };
        let header_ok = meta_has_header(&sm.mapping).map_or(true, |h| h == file.has_header);
        if header_ok && headers_signature(headers) == file_sig {
            return Some(picked(sm));
        }
    }

    let header_set = normalized_set(&file.headers);
    let has = |name: &str| {
        let key = normalize_header(name);
        !key.is_empty() && header_set.contains(&key)
    };

    let mut best: Option<(&SavedMapping, f64, usize, usize)> = None;
    for sm in presets {
        let m = &sm.mapping;
        if meta_has_header(m).is_some_and(|h| h != file.has_header) {
            continue;
        }
        let meta_size = match meta_headers(m) {
            Some(headers) => {
                let meta_set = normalized_set(headers);
                if meta_set.len() < MIN_HEADERS_FOR_SUBSET_MATCH || !meta_set.is_subset(&header_set) {
                    continue;
                }
                meta_set.len()
            }
            None => 0,
        };

        let mut possible = 1usize;
        let mut score = 0usize;
        let date_match = has(&m.csv.date);
        score += usize::from(date_match);

        let descriptions: Vec<&String> = m.csv.description.iter().filter(|d| !d.trim().is_empty()).collect();
        possible += descriptions.len();
        let desc_matches = descriptions.iter().filter(|d| has(d)).count();
        score += desc_matches;

        let amount_match = match &m.csv.amount_mapping {
            AmountMapping::Single { column, .. } => {
                possible += 1;
                let ok = has(column);
                score += usize::from(ok);
                ok
            }
            AmountMapping::DebitCredit {
                debit_column,
                credit_column,
                ..
            } => {
                let mut any = false;
                for col in [debit_column, credit_column].into_iter().flatten() {
                    if normalize_header(col).is_empty() {
                        continue;
                    }
                    possible += 1;
                    if has(col) {
                        score += 1;
                        any = true;
                    }
                }
                any
            }
            AmountMapping::AmountWithType {
                amount_column,
                type_column,
                ..
            } => {
                possible += 2;
                let amount_ok = has(amount_column);
                let type_ok = has(type_column);
                score += usize::from(amount_ok) + usize::from(type_ok);
                amount_ok && type_ok
            }
        };

        for extra in [&m.csv.account, &m.csv.currency].into_iter().flatten() {
            if normalize_header(extra).is_empty() {
                continue;
            }
            possible += 1;
            score += usize::from(has(extra));
        }

        if !(date_match && amount_match && desc_matches >= 1) {
            continue;
        }

        let ratio = score as f64 / possible as f64;
        let better = match best {
            None => true,
            Some((_, best_ratio, best_score, best_meta)) => {
                ratio > best_ratio
                    || (ratio == best_ratio && score > best_score)
                    || (ratio == best_ratio && score == best_score && meta_size > best_meta)
            }
        };
        if better {
            best = Some((sm, ratio, score, meta_size));
        }
    }

    let (sm, ratio, score, _) = best?;
    if score >= MIN_SCORE || ratio >= MIN_RATIO {
        tracing::debug!(preset = %sm.name, score, ratio, "matched saved mapping");
        Some(picked(sm))
    } else {
        None
    }
}

/// Attach the header snapshot used for future detection.
pub fn with_meta(mut mapping: ImportMapping, file: &ParsedFile) -> ImportMapping {
    mapping.meta = Some(MappingMeta {
        headers: Some(file.headers.clone()),
        has_header: Some(file.has_header),
    });
    mapping
}

/// Initial mapping for a freshly parsed file: a matching preset if one fits,
/// otherwise the keyword heuristic.
pub fn initial_mapping(
    file: &ParsedFile,
    presets: &[SavedMapping],
    currency_default: &str,
) -> (ImportMapping, Option<PickedMapping>) {
    let base = ImportMapping::new(currency_default);
    if !file.has_header {
        return (base, None);
    }
    match pick_best_mapping(file, presets) {
        Some(p) => (p.mapping.clone(), Some(p)),
        None => (heuristic_prefill(&file.headers, &base), None),
    }
}

fn date_fragment_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b\d{4}[-_ ]\d{2}([-_ ]\d{2})?\b|\b\d{1,2}[-_ ]\d{1,2}[-_ ]\d{2,4}\b|\b\d{4}\b")
            .expect("valid regex")
    })
}

/// Preset name suggested from a file name: extension, dates and years stripped.
pub fn suggest_mapping_name(file_name: &str) -> String {
    let base = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let spaced: String = base
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let dashed = base.replace('_', "-");
    let stripped = date_fragment_re().replace_all(&dashed, " ");
    let cleaned = stripped
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if !cleaned.is_empty() {
        cleaned
    } else if !spaced.trim().is_empty() {
        spaced.trim().to_string()
    } else {
        "Import mapping".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{AmountKind, AmountRole, ColumnMapper, CsvField};

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn file(headers: &[&str]) -> ParsedFile {
        ParsedFile {
            file_name: "bank.csv".into(),
            headers: strings(headers),
            rows: Vec::new(),
            has_header: true,
        }
    }

    fn preset(id: i64, name: &str, meta: Option<&[&str]>) -> SavedMapping {
        let mut m = ColumnMapper::default();
        m.assign_header_to_field(CsvField::Date, "Date");
        m.assign_header_to_field(CsvField::Description, "Description");
        m.assign_header_to_field(CsvField::Amount, "Amount");
        m.set_account("Checking");
        let mut mapping = m.into_mapping();
        if let Some(h) = meta {
            mapping.meta = Some(MappingMeta {
                headers: Some(strings(h)),
                has_header: Some(true),
            });
        }
        SavedMapping {
            id,
            name: name.into(),
            mapping,
        }
    }

    #[test]
    fn test_normalize_and_signature() {
        assert_eq!(normalize_header("  Posted   Date "), "posted date");
        assert_eq!(
            headers_signature(&strings(&["Amount", "date"])),
            headers_signature(&strings(&["DATE", " amount"]))
        );
        assert!(has_ambiguous_headers(&strings(&["Date", "date "])));
        assert!(!has_ambiguous_headers(&strings(&["Date", "Amount", ""])));
    }

    #[test]
    fn test_rebind_uses_file_spelling() {
        let sm = preset(1, "Bank", None);
        let rebound = rebind_to_headers(&sm.mapping, &strings(&["DATE", "description", "AMOUNT"]));
        assert_eq!(rebound.csv.date, "DATE");
        assert_eq!(rebound.csv.description, vec!["description"]);
        assert_eq!(rebound.csv.amount, "AMOUNT");
    }

    #[test]
    fn test_apply_preset_drops_missing_columns() {
        let sm = preset(1, "Bank", None);
        let applied = apply_preset_to_headers(&sm.mapping, &strings(&["date", "Amount"]));
        assert_eq!(applied.csv.date, "date");
        assert!(applied.csv.description.is_empty());
        assert!(!applied.can_proceed());
    }

    #[test]
    fn test_heuristic_debit_credit_layout() {
        let headers = strings(&["Transaction Date", "Description", "Memo", "Withdrawals", "Deposits", "Balance"]);
        let m = heuristic_prefill(&headers, &ImportMapping::default());
        assert_eq!(m.csv.date, "Transaction Date");
        assert_eq!(m.csv.description, vec!["Description", "Memo"]);
        assert_eq!(
            m.csv.amount_mapping,
            AmountMapping::DebitCredit {
                debit_column: Some("Withdrawals".into()),
                credit_column: Some("Deposits".into()),
                invert_sign: false,
            }
        );
    }

    #[test]
    fn test_heuristic_single_amount_and_currency() {
        let headers = strings(&["Date", "Payee", "Amount", "Currency"]);
        let m = heuristic_prefill(&headers, &ImportMapping::default());
        assert_eq!(m.csv.amount, "Amount");
        assert_eq!(m.csv.amount_mapping.kind(), AmountKind::Single);
        assert_eq!(m.csv.currency.as_deref(), Some("Currency"));
    }

    #[test]
    fn test_heuristic_amount_with_type() {
        let headers = strings(&["Date", "Merchant", "Amount", "Type"]);
        let m = heuristic_prefill(&headers, &ImportMapping::default());
        assert_eq!(m.csv.amount_mapping.kind(), AmountKind::AmountWithType);
        assert!(m.is_amount_mapping_valid());
    }

    #[test]
    fn test_heuristic_ambiguous_dates_left_unset() {
        let headers = strings(&["Posted Date", "Transaction Date", "Description", "Amount"]);
        let m = heuristic_prefill(&headers, &ImportMapping::default());
        assert_eq!(m.csv.date, "");
    }

    #[test]
    fn test_short_keywords_match_whole_words_only() {
        // "Interest" must not count as a money-in column.
        let headers = strings(&["Date", "Description", "Interest", "Amount"]);
        let m = heuristic_prefill(&headers, &ImportMapping::default());
        assert_eq!(m.csv.amount_mapping.kind(), AmountKind::Single);
        assert_eq!(m.csv.amount, "Amount");
    }

    #[test]
    fn test_pick_exact_signature() {
        let presets = vec![
            preset(1, "Other", Some(&["Posted", "Payee", "Amount", "Balance"])),
            preset(2, "Exact", Some(&["Date", "Description", "Amount"])),
        ];
        let picked = pick_best_mapping(&file(&["amount", "DATE", "Description"]), &presets).unwrap();
        assert_eq!(picked.id, 2);
        assert_eq!(picked.mapping.csv.date, "DATE");
    }

    #[test]
    fn test_pick_scored_subset_match() {
        let presets = vec![preset(7, "Bank", Some(&["Date", "Description", "Amount", "Balance"]))];
        let picked = pick_best_mapping(&file(&["Date", "Description", "Amount", "Balance", "Extra"]), &presets);
        assert_eq!(picked.map(|p| p.id), Some(7));
    }

    #[test]
    fn test_pick_rejects_small_meta_subsets_and_missing_columns() {
        let presets = vec![preset(1, "Tiny", Some(&["Date", "Description", "Amount"]))];
        assert!(pick_best_mapping(&file(&["Date", "Description", "Amount", "Extra"]), &presets).is_none());
        let presets = vec![preset(2, "NoMeta", None)];
        assert!(pick_best_mapping(&file(&["Date", "Memo", "Amount"]), &presets).is_none());
        assert!(pick_best_mapping(&file(&["Date", "Description", "Amount"]), &presets).is_some());
    }

    #[test]
    fn test_pick_skips_headerless_and_ambiguous_files() {
        let presets = vec![preset(1, "Bank", None)];
        let mut f = file(&["Date", "Description", "Amount"]);
        f.has_header = false;
        assert!(pick_best_mapping(&f, &presets).is_none());
        assert!(pick_best_mapping(&file(&["Date", "date", "Description", "Amount"]), &presets).is_none());
    }

    #[test]
    fn test_initial_mapping_falls_back_to_heuristic() {
        let (m, picked) = initial_mapping(&file(&["Date", "Payee", "Amt"]), &[], "USD");
        assert!(picked.is_none());
        assert_eq!(m.currency_default, "USD");
        assert_eq!(m.csv.date, "Date");
        assert_eq!(m.csv.amount, "Amt");
    }

    #[test]
    fn test_with_meta_records_headers() {
        let f = file(&["Date", "Amount"]);
        let m = with_meta(ImportMapping::default(), &f);
        let meta = m.meta.unwrap();
        assert_eq!(meta.headers.unwrap(), vec!["Date", "Amount"]);
        assert_eq!(meta.has_header, Some(true));
    }

    #[test]
    fn test_heuristic_keeps_debit_role_from_mapper_shape() {
        let mut m = ColumnMapper::default();
        m.set_amount_kind(AmountKind::DebitCredit);
        m.assign_amount_column(AmountRole::DebitColumn, "Old");
        let guessed = heuristic_prefill(&strings(&["Date", "Name", "Value"]), m.mapping());
        assert_eq!(guessed.csv.amount, "Value");
    }

    #[test]
    fn test_suggest_mapping_name() {
        assert_eq!(suggest_mapping_name("rbc_chequing_2025-01.csv"), "rbc chequing");
        assert_eq!(suggest_mapping_name("Visa-statement 01-31-2025.xlsx"), "Visa statement");
        assert_eq!(suggest_mapping_name("2025.csv"), "2025");
    }
}
