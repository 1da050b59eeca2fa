use chrono::{DateTime, Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

fn epoch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Date\((\d+)\)").expect("valid regex"))
}

fn slash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})$").expect("valid regex"))
}

const NAMED_MONTH_FORMATS: &[&str] = &["%b %d, %Y", "%d %b %Y", "%B %d, %Y", "%d %B %Y"];

/// Best-effort date parsing for bank exports.
///
/// Accepts ISO dates (time suffix ignored), `Date(<epoch ms>)` wrappers,
/// `M/D/Y` and `D/M/Y` (the day comes first only when the first part can't be
/// a month), and named-month forms like `Jan 02, 2025` or `02 January 2025`.
pub fn parse_date_loose(raw: &str) -> Option<NaiveDate> {
    let v = raw.trim();
    if v.is_empty() {
        return None;
    }

    if let Some(caps) = epoch_re().captures(v) {
        let ms: i64 = caps[1].parse().ok()?;
        return DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive());
    }

    if v.len() >= 10 && v.is_char_boundary(10) {
        if let Ok(d) = NaiveDate::parse_from_str(&v[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }

    if let Some(caps) = slash_re().captures(v) {
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += 2000;
        }
        let (month, day) = if a > 12 && b <= 12 { (b, a) } else { (a, b) };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    NAMED_MONTH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(v, fmt).ok())
}

/// `YYYY-MM` bucket key.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Human label for a `YYYY-MM` key, e.g. `Jan 2025`.
pub fn month_label(key: &str) -> String {
    NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d")
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|_| key.to_string())
}

pub fn is_month_key(key: &str) -> bool {
    NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d").is_ok() && key.len() == 7
}
