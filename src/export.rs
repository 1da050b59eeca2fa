use std::io::Write;
use std::path::Path;

use crate::error::{CashmopError, Result};
use crate::fmt::decimal;
use crate::ledger::TxRow;

pub const HEADERS: [&str; 7] = ["Date", "Description", "Amount", "Currency", "Category", "Account", "Owner"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// Default file name: the month when the range sits in one month, else both dates.
pub fn default_file_name(start: &str, end: &str, format: ExportFormat) -> String {
    let part = match (start.get(..7), end.get(..7)) {
        (Some(a), Some(b)) if a == b => a.to_string(),
        _ => format!("{start}_to_{end}"),
    };
    format!("cashmop_{part}.{}", format.extension())
}

/// Prefix cells a spreadsheet would evaluate as formulas.
fn sanitize(field: &str) -> String {
    match field.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("\t{field}"),
        _ => field.to_string(),
    }
}

fn cells(row: &TxRow) -> [String; 7] {
    [
        row.date.clone(),
        row.description.clone(),
        decimal(row.amount_cents),
        row.currency.clone(),
        row.category.clone().unwrap_or_default(),
        row.account.clone(),
        row.owner.clone().unwrap_or_default(),
    ]
}

pub fn export(rows: &[TxRow], path: &Path, format: ExportFormat) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match format {
        ExportFormat::Csv => export_csv(rows, path),
        ExportFormat::Xlsx => export_xlsx(rows, path),
    }
}

/// UTF-8 with BOM and CRLF line ends, so spreadsheet apps open it cleanly.
pub fn export_csv(rows: &[TxRow], path: &Path) -> Result<usize> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(b"\xEF\xBB\xBF")?;
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(file);
    writer.write_record(HEADERS)?;
    for row in rows {
        let [date, description, amount, currency, category, account, owner] = cells(row);
        writer.write_record([
            date,
            sanitize(&description),
            amount,
            sanitize(&currency),
            sanitize(&category),
            sanitize(&account),
            sanitize(&owner),
        ])?;
    }
    writer.flush()?;
    Ok(rows.len())
}

#[cfg(feature = "excel")]
pub fn export_xlsx(rows: &[TxRow], path: &Path) -> Result<usize> {
    use rust_xlsxwriter::{Format, Workbook};

    let xlsx = |e: rust_xlsxwriter::XlsxError| CashmopError::Excel(e.to_string());
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Transactions").map_err(xlsx)?;

    let bold = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold).map_err(xlsx)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, value) in cells(row).iter().enumerate() {
            if col == 2 {
                sheet.write_number(r, 2, row.amount_cents as f64 / 100.0).map_err(xlsx)?;
            } else {
                sheet.write_string(r, col as u16, value.as_str()).map_err(xlsx)?;
            }
        }
    }
    workbook.save(path).map_err(xlsx)?;
    Ok(rows.len())
}

#[cfg(not(feature = "excel"))]
pub fn export_xlsx(_rows: &[TxRow], path: &Path) -> Result<usize> {
    Err(CashmopError::UnsupportedFile(format!(
        "{} (built without the excel feature)",
        path.display()
    )))
}
