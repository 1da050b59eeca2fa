use std::path::Path;

use crate::amount::parse_cents;
use crate::dates::parse_date_loose;
use crate::error::{CashmopError, Result};

/// A bank export reduced to a header row plus rectangular string rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub has_header: bool,
}

impl ParsedFile {
    pub fn column_index(&self, header: &str) -> Option<usize> {
        if header.is_empty() {
            return None;
        }
        self.headers.iter().position(|h| h == header)
    }

    /// Columns worth showing: those with at least one value, plus mapped ones.
    pub fn visible_columns(&self, mapped: &std::collections::BTreeSet<String>) -> Vec<usize> {
        let all: Vec<usize> = (0..self.headers.len()).collect();
        if self.rows.is_empty() {
            return all;
        }
        let visible: Vec<usize> = all
            .iter()
            .copied()
            .filter(|&i| {
                mapped.contains(&self.headers[i])
                    || self
                        .rows
                        .iter()
                        .any(|r| r.get(i).is_some_and(|c| !c.trim().is_empty()))
            })
            .collect();
        if visible.is_empty() {
            all
        } else {
            visible
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileKind {
    Csv,
    #[cfg(feature = "excel")]
    Spreadsheet,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Some(FileKind::Csv),
        #[cfg(feature = "excel")]
        "xlsx" | "xls" => Some(FileKind::Spreadsheet),
        _ => None,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

pub fn parse_file(path: &Path) -> Result<ParsedFile> {
    let kind = file_kind(path).ok_or_else(|| CashmopError::UnsupportedFile(display_name(path)))?;
    tracing::debug!(file = %path.display(), "parsing source file");
    match kind {
        FileKind::Csv => parse_csv_bytes(&display_name(path), &std::fs::read(path)?),
        #[cfg(feature = "excel")]
        FileKind::Spreadsheet => {
            let raw_rows = read_sheet_rows(path)?;
            if raw_rows.is_empty() {
                return Err(CashmopError::EmptyFile(display_name(path)));
            }
            Ok(build_parsed_file(display_name(path), raw_rows))
        }
    }
}

pub fn parse_csv_bytes(file_name: &str, data: &[u8]) -> Result<ParsedFile> {
    let raw_rows = read_csv_rows(data)?;
    if raw_rows.is_empty() {
        return Err(CashmopError::EmptyFile(file_name.to_string()));
    }
    tracing::debug!(file = file_name, rows = raw_rows.len(), "parsed csv");
    Ok(build_parsed_file(file_name.to_string(), raw_rows))
}

fn build_parsed_file(file_name: String, raw_rows: Vec<Vec<String>>) -> ParsedFile {
    let has_header = detect_header_row(&raw_rows);
    let (headers, rows) = build_rows(raw_rows, has_header);
    ParsedFile {
        file_name,
        headers,
        rows,
        has_header,
    }
}

fn read_csv_rows(data: &[u8]) -> Result<Vec<Vec<String>>> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let cells: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(cells);
    }
    Ok(rows)
}

#[cfg(feature = "excel")]
pub fn excel_serial_to_date(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    let date = base + chrono::Duration::days(serial as i64);
    date.format("%Y-%m-%d").to_string()
}

#[cfg(feature = "excel")]
fn read_sheet_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    use calamine::{Data, Reader};

    let mut workbook =
        calamine::open_workbook_auto(path).map_err(|e| CashmopError::Excel(e.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| CashmopError::Excel("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| CashmopError::Excel(e.to_string()))?;

    let mut rows = Vec::new();
    for row in range.rows() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Data::String(s) => s.trim().to_string(),
                Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
                Data::Float(f) => f.to_string(),
                Data::Int(i) => i.to_string(),
                Data::Bool(b) => b.to_string(),
                Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
                Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
                _ => String::new(),
            })
            .collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(cells);
    }
    Ok(rows)
}

const HEADER_KEYWORDS: &[&str] = &[
    "date", "amount", "description", "memo", "payee", "merchant", "account", "category", "debit",
    "credit", "type", "currency", "balance", "value",
];

/// (numeric, date, text) cell counts for one row.
fn row_shape(row: &[String]) -> (usize, usize, usize) {
    let (mut num, mut date, mut text) = (0, 0, 0);
    for cell in row.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if parse_date_loose(cell).is_some() {
            date += 1;
        } else if parse_cents(cell).is_some() {
            num += 1;
        } else {
            text += 1;
        }
    }
    (num, date, text)
}

/// Decide whether the first row names the columns.
pub fn detect_header_row(rows: &[Vec<String>]) -> bool {
    let Some(first) = rows.first() else {
        return false;
    };
    let keyword_hit = first.iter().any(|cell| {
        let lower = cell.trim().to_lowercase();
        HEADER_KEYWORDS.iter().any(|kw| lower.contains(kw))
    });
    if keyword_hit {
        return true;
    }
    let Some(second) = rows.get(1) else {
        return false;
    };

    let (n1, d1, t1) = row_shape(first);
    let (n2, d2, _) = row_shape(second);
    let score1 = n1 + d1;
    let score2 = n2 + d2;

    if score1 >= 2 && score2 >= 1 {
        return false;
    }
    if score1 >= 2 && t1 == 0 {
        return false;
    }
    true
}

/// Spreadsheet-style column name: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letter(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

fn build_rows(raw_rows: Vec<Vec<String>>, has_header: bool) -> (Vec<String>, Vec<Vec<String>>) {
    let width = raw_rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return (Vec::new(), Vec::new());
    }
    let mut iter = raw_rows.into_iter();
    let header_row = if has_header { iter.next() } else { None };

    let headers = (0..width)
        .map(|i| {
            header_row
                .as_ref()
                .and_then(|r| r.get(i))
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| format!("Column {}", column_letter(i)))
        })
        .collect();

    let rows = iter
        .map(|mut r| {
            r.resize(width, String::new());
            r
        })
        .collect();
    (headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_detects_keyword_header() {
        assert!(detect_header_row(&rows(&[
            &["Posted Date", "Payee", "Amount"],
            &["01/02/2025", "Coffee", "-4.50"],
        ])));
    }

    #[test]
    fn test_detects_headerless_data() {
        assert!(!detect_header_row(&rows(&[
            &["01/02/2025", "Coffee", "-4.50"],
            &["01/03/2025", "Tea", "-3.00"],
        ])));
    }

    #[test]
    fn test_single_row_without_keywords_is_data() {
        assert!(!detect_header_row(&rows(&[&["01/02/2025", "Coffee", "-4.50"]])));
    }

    #[test]
    fn test_parse_csv_with_bom_and_blank_lines() {
        let data = "\u{FEFF}Date,Description,Amount\n\n2025-01-02,\"Coffee, large\",-4.50\n2025-01-03,Tea,-3\n";
        let pf = parse_csv_bytes("bank.csv", data.as_bytes()).unwrap();
        assert!(pf.has_header);
        assert_eq!(pf.headers, vec!["Date", "Description", "Amount"]);
        assert_eq!(pf.rows.len(), 2);
        assert_eq!(pf.rows[0][1], "Coffee, large");
    }

    #[test]
    fn test_headerless_csv_gets_letter_names_and_padding() {
        let data = "2025-01-02,Coffee,-4.50\n2025-01-03,Tea\n";
        let pf = parse_csv_bytes("bank.csv", data.as_bytes()).unwrap();
        assert!(!pf.has_header);
        assert_eq!(pf.headers, vec!["Column A", "Column B", "Column C"]);
        assert_eq!(pf.rows[1], vec!["2025-01-03", "Tea", ""]);
    }

    #[test]
    fn test_blank_header_cells_are_named() {
        let data = "Date,,Amount\n2025-01-02,x,1\n";
        let pf = parse_csv_bytes("bank.csv", data.as_bytes()).unwrap();
        assert_eq!(pf.headers, vec!["Date", "Column B", "Amount"]);
    }

    #[test]
    fn test_empty_csv_is_an_error() {
        let err = parse_csv_bytes("empty.csv", b"\n\n").unwrap_err();
        assert!(matches!(err, CashmopError::EmptyFile(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.pdf");
        std::fs::write(&path, "x").unwrap();
        let err = parse_file(&path).unwrap_err();
        assert!(matches!(err, CashmopError::UnsupportedFile(_)));
    }

    #[test]
    fn test_parse_file_reads_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Chequing.CSV");
        std::fs::write(&path, "Date,Memo,Amount\n2025-02-01,Rent,-1200\n").unwrap();
        let pf = parse_file(&path).unwrap();
        assert_eq!(pf.file_name, "Chequing.CSV");
        assert_eq!(pf.column_index("Memo"), Some(1));
        assert_eq!(pf.column_index(""), None);
    }

    #[test]
    fn test_visible_columns_hide_empty_unmapped() {
        let data = "Date,Notes,Amount\n2025-01-02,,1\n2025-01-03,,2\n";
        let pf = parse_csv_bytes("bank.csv", data.as_bytes()).unwrap();
        let mut mapped = std::collections::BTreeSet::new();
        assert_eq!(pf.visible_columns(&mapped), vec![0, 2]);
        mapped.insert("Notes".to_string());
        assert_eq!(pf.visible_columns(&mapped), vec![0, 1, 2]);
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(excel_serial_to_date(45667.0), "2025-01-10");
    }
}
