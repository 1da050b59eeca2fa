use crate::mapping::{AmountMapping, ImportMapping, DEFAULT_NEGATIVE_VALUE, DEFAULT_POSITIVE_VALUE};

/// Parse a money cell into cents.
///
/// Currency symbols and spaces are dropped and `(12.50)` is negative. A comma
/// is the decimal separator when it comes last with one or two digits after
/// it. Values too large for i64 cents are rejected.
pub fn parse_cents(raw: &str) -> Option<i64> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }
    let (s, negated) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (inner, true),
        None => (s, false),
    };

    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | ','))
        .collect();

    let decimals_after = |pos: usize| kept.len() - pos - 1;
    let normalized = match (kept.rfind('.'), kept.rfind(',')) {
        // "1.234,56": the trailing comma is the decimal point.
        (Some(dot), Some(comma)) if comma > dot && (1..=2).contains(&decimals_after(comma)) => {
            kept.replace('.', "").replace(',', ".")
        }
        (Some(_), _) => kept.replace(',', ""),
        (None, Some(pos)) => {
            if kept.matches(',').count() == 1 && (1..=2).contains(&decimals_after(pos)) {
                kept.replace(',', ".")
            } else {
                kept.replace(',', "")
            }
        }
        (None, None) => kept,
    };

    if matches!(normalized.as_str(), "" | "-" | "." | "-.") {
        return None;
    }
    let value: f64 = normalized.parse().ok()?;
    let scaled = (value * 100.0).round();
    if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
        return None;
    }
    let cents = scaled as i64;
    Some(if negated { -cents.abs() } else { cents })
}

fn column_index(headers: &[String], name: Option<&str>) -> Option<usize> {
    let name = name.filter(|n| !n.is_empty())?;
    headers.iter().position(|h| h == name)
}

fn cell(row: &[String], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i)).map(String::as_str)
}

#[derive(Debug, Clone)]
enum Strategy {
    Single(Option<usize>),
    DebitCredit {
        debit: Option<usize>,
        credit: Option<usize>,
    },
    WithType {
        amount: Option<usize>,
        kind: Option<usize>,
        negative: String,
        positive: String,
    },
}

/// Derives signed cents from a row according to a mapping's amount variant.
/// Column positions are resolved once against the file's headers.
#[derive(Debug, Clone)]
pub struct AmountParser {
    strategy: Strategy,
    invert: bool,
}

impl AmountParser {
    pub fn new(mapping: &ImportMapping, headers: &[String]) -> Self {
        let am = &mapping.csv.amount_mapping;
        let strategy = match am {
            AmountMapping::Single { column, .. } => {
                let column = if column.is_empty() { &mapping.csv.amount } else { column };
                Strategy::Single(column_index(headers, Some(column.as_str())))
            }
            AmountMapping::DebitCredit {
                debit_column,
                credit_column,
                ..
            } => Strategy::DebitCredit {
                debit: column_index(headers, debit_column.as_deref()),
                credit: column_index(headers, credit_column.as_deref()),
            },
            AmountMapping::AmountWithType {
                amount_column,
                type_column,
                negative_value,
                positive_value,
                ..
            } => Strategy::WithType {
                amount: column_index(headers, Some(amount_column.as_str())),
                kind: column_index(headers, Some(type_column.as_str())),
                negative: discriminator(negative_value, DEFAULT_NEGATIVE_VALUE),
                positive: discriminator(positive_value, DEFAULT_POSITIVE_VALUE),
            },
        };
        Self {
            strategy,
            invert: am.invert_sign(),
        }
    }

    /// Signed cents for `row`; unparseable or missing cells count as zero.
    pub fn amount(&self, row: &[String]) -> i64 {
        let value = |idx| cell(row, idx).and_then(parse_cents).unwrap_or(0);
        let cents = match &self.strategy {
            Strategy::Single(idx) => value(*idx),
            Strategy::DebitCredit { debit, credit } => {
                value(*credit).saturating_abs().saturating_sub(value(*debit).saturating_abs())
            }
            Strategy::WithType {
                amount,
                kind,
                negative,
                positive,
            } => {
                let raw = value(*amount);
                let kind_value = cell(row, *kind)
                    .map(|k| k.trim().to_lowercase())
                    .unwrap_or_default();
                if kind_value.is_empty() {
                    raw
                } else if kind_value == *negative {
                    raw.saturating_abs().saturating_neg()
                } else if kind_value == *positive {
                    raw.saturating_abs()
                } else {
                    raw
                }
            }
        };
        if self.invert {
            cents.saturating_neg()
        } else {
            cents
        }
    }
}

fn discriminator(value: &str, fallback: &str) -> String {
    let v = value.trim().to_lowercase();
    if v.is_empty() {
        fallback.to_string()
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{AmountKind, AmountRole, ColumnMapper, ValueSide};

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        headers(cells)
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("1,234.56"), Some(123456));
        assert_eq!(parse_cents("$42.10"), Some(4210));
        assert_eq!(parse_cents("  -42.50  "), Some(-4250));
        assert_eq!(parse_cents("\"500.00\""), Some(50000));
        assert_eq!(parse_cents("0"), Some(0));
        assert_eq!(parse_cents("not_a_number"), None);
        assert_eq!(parse_cents(""), None);
        assert_eq!(parse_cents("-"), None);
    }

    #[test]
    fn test_parse_cents_parenthesized_and_comma_decimal() {
        assert_eq!(parse_cents("(1,234.56)"), Some(-123456));
        assert_eq!(parse_cents("12,5"), Some(1250));
        assert_eq!(parse_cents("1,250"), Some(125000));
        assert_eq!(parse_cents("1 234,99 €"), Some(123499));
        assert_eq!(parse_cents("1.234,56"), Some(123456));
        assert_eq!(parse_cents("-1.234.567,8"), Some(-123456780));
        assert_eq!(parse_cents("1,234.5"), Some(123450));
    }

    #[test]
    fn test_parse_cents_rejects_huge_values() {
        assert_eq!(parse_cents("(-99999999999999999999999)"), None);
        assert_eq!(parse_cents("99999999999999999999999"), None);
        assert_eq!(parse_cents("92233720368547758.08"), None);
        assert_eq!(parse_cents("(90000000000000000.00)"), Some(-9_000_000_000_000_000_000));
    }

    #[test]
    fn test_huge_cells_do_not_overflow() {
        let mut m = ColumnMapper::default();
        m.set_amount_kind(AmountKind::DebitCredit);
        m.assign_amount_column(AmountRole::DebitColumn, "Out");
        m.set_invert_sign(true);
        let parser = AmountParser::new(m.mapping(), &headers(&["Out"]));
        assert_eq!(parser.amount(&row(&["-99999999999999999999999"])), 0);
        assert_eq!(parser.amount(&row(&["-90000000000000000.00"])), 9_000_000_000_000_000_000);
    }

    #[test]
    fn test_single_column_with_invert() {
        let mut m = ColumnMapper::default();
        m.assign_amount_column(AmountRole::Column, "Amount");
        let h = headers(&["Date", "Amount"]);
        let parser = AmountParser::new(m.mapping(), &h);
        assert_eq!(parser.amount(&row(&["2025-01-01", "-12.34"])), -1234);

        m.set_invert_sign(true);
        let parser = AmountParser::new(m.mapping(), &h);
        assert_eq!(parser.amount(&row(&["2025-01-01", "-12.34"])), 1234);
    }

    #[test]
    fn test_debit_credit_ignores_file_signs() {
        let mut m = ColumnMapper::default();
        m.set_amount_kind(AmountKind::DebitCredit);
        m.assign_amount_column(AmountRole::DebitColumn, "Debit");
        m.assign_amount_column(AmountRole::CreditColumn, "Credit");
        let parser = AmountParser::new(m.mapping(), &headers(&["Debit", "Credit"]));
        assert_eq!(parser.amount(&row(&["-25.00", ""])), -2500);
        assert_eq!(parser.amount(&row(&["", "100.00"])), 10000);
        assert_eq!(parser.amount(&row(&["5.00", "7.50"])), 250);
    }

    #[test]
    fn test_debit_only_mapping() {
        let mut m = ColumnMapper::default();
        m.set_amount_kind(AmountKind::DebitCredit);
        m.assign_amount_column(AmountRole::DebitColumn, "Out");
        let parser = AmountParser::new(m.mapping(), &headers(&["Out"]));
        assert_eq!(parser.amount(&row(&["9.99"])), -999);
    }

    #[test]
    fn test_amount_with_type_matches_case_insensitively() {
        let mut m = ColumnMapper::default();
        m.set_amount_kind(AmountKind::AmountWithType);
        m.assign_amount_column(AmountRole::AmountColumn, "Amount");
        m.assign_amount_column(AmountRole::TypeColumn, "Type");
        m.set_type_value(ValueSide::Negative, "DR");
        m.set_type_value(ValueSide::Positive, "CR");
        let parser = AmountParser::new(m.mapping(), &headers(&["Amount", "Type"]));
        assert_eq!(parser.amount(&row(&["10.00", "dr"])), -1000);
        assert_eq!(parser.amount(&row(&["-10.00", " Cr "])), 1000);
        assert_eq!(parser.amount(&row(&["-3.00", "other"])), -300);
        assert_eq!(parser.amount(&row(&["4.00", ""])), 400);
    }

    #[test]
    fn test_missing_columns_yield_zero() {
        let mut m = ColumnMapper::default();
        m.assign_amount_column(AmountRole::Column, "Nope");
        let parser = AmountParser::new(m.mapping(), &headers(&["Amount"]));
        assert_eq!(parser.amount(&row(&["5.00"])), 0);
        let short = AmountParser::new(m.mapping(), &headers(&["X", "Nope"]));
        assert_eq!(short.amount(&row(&["only one cell"])), 0);
    }
}
