use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::cli::open_backend;
use crate::error::{CashmopError, Result};
use crate::export::{default_file_name, export, ExportFormat};
use crate::fmt::format_bytes;
use crate::ledger::{query_transactions, validate_date_range, TxFilter};

#[derive(Debug, clap::Args)]
pub struct ExportArgs {
    /// First day: YYYY-MM-DD (with --end; default: last month)
    #[arg(long)]
    pub start: Option<String>,
    /// Last day: YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,
    #[arg(long, value_enum, default_value = "csv")]
    pub format: ExportFormat,
    /// Output path (default: <data_dir>/exports/cashmop_<range>.<ext>)
    #[arg(long)]
    pub out: Option<String>,
    /// Category ID to include (repeatable or comma-separated)
    #[arg(long = "category-id", value_delimiter = ',')]
    pub category_ids: Vec<i64>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ExportResponse {
    ok: bool,
    count: usize,
    path: String,
}

fn output_path(args: &ExportArgs, data_dir: &std::path::Path, start: NaiveDate, end: NaiveDate) -> PathBuf {
    match &args.out {
        Some(out) => PathBuf::from(out),
        None => data_dir
            .join("exports")
            .join(default_file_name(&start.to_string(), &end.to_string(), args.format)),
    }
}

pub fn run(args: &ExportArgs) -> Result<()> {
    let (start, end) = validate_date_range(
        args.start.as_deref(),
        args.end.as_deref(),
        chrono::Local::now().date_naive(),
    )?;
    let backend = open_backend()?;
    let filter = TxFilter {
        start: Some(start),
        end: Some(end),
        category_ids: args.category_ids.clone(),
        ascending: true,
        ..Default::default()
    };
    let rows = query_transactions(backend.conn(), &filter)?;
    if rows.is_empty() {
        return Err(CashmopError::Other(format!(
            "No transactions found from {start} to {end}."
        )));
    }

    let path = output_path(args, backend.data_dir(), start, end);
    let count = export(&rows, &path, args.format)?;
    tracing::info!(count, path = %path.display(), "exported transactions");

    if args.json {
        let response = ExportResponse {
            ok: true,
            count,
            path: path.display().to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        println!("Exported {count} transactions to {} ({})", path.display(), format_bytes(size));
    }
    Ok(())
}
