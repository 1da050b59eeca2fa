use comfy_table::{Cell, Table};

use crate::cli::{load_file, open_backend, resolve_mapping};
use crate::detection::{suggest_mapping_name, with_meta};
use crate::error::Result;
use crate::fmt::money;
use crate::parser::column_letter;
use crate::range::{compute_months, preview as preview_rows, MonthSelection};

use super::import::validate_months;

pub fn detect(file: &str) -> Result<()> {
    let parsed = load_file(file)?;
    let backend = open_backend()?;
    let (mapping, source) = resolve_mapping(&backend, &parsed, None)?;

    let mut table = Table::new();
    table.set_header(vec!["Col", "Header", "Sample", "Used as"]);
    let visible = parsed.visible_columns(&mapping.used_headers());
    for &i in &visible {
        let header = &parsed.headers[i];
        let sample = parsed
            .rows
            .iter()
            .filter_map(|r| r.get(i))
            .find(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(column_letter(i)),
            Cell::new(header),
            Cell::new(sample),
            Cell::new(mapping.header_role(header).label()),
        ]);
    }
    println!("{} ({} rows)\n{table}", parsed.file_name, parsed.rows.len());

    let hidden = parsed.headers.len() - visible.len();
    if hidden > 0 {
        println!("{hidden} empty columns hidden");
    }
    if !parsed.has_header {
        println!("No header row found; columns are named by letter.");
    }
    println!("Mapping: {source}");
    println!("Mapped columns: {}", mapping.mapped_headers(&parsed.headers).join(", "));
    let missing: Vec<&str> = mapping.missing_fields().iter().map(|f| f.key()).collect();
    if missing.is_empty() {
        println!("Ready to import.");
    } else {
        println!("Still needed: {}", missing.join(", "));
        println!("{}", mapping.amount_hint());
    }
    println!("Suggested name: {}", suggest_mapping_name(&parsed.file_name));
    println!();
    println!("{}", with_meta(mapping, &parsed).to_json()?);
    Ok(())
}

pub fn months(file: &str, mapping: Option<&str>, json: bool) -> Result<()> {
    let parsed = load_file(file)?;
    let backend = open_backend()?;
    let (mapping, _) = resolve_mapping(&backend, &parsed, mapping)?;
    let options = compute_months(&mapping, &parsed);

    if json {
        println!("{}", serde_json::to_string_pretty(&options)?);
        return Ok(());
    }
    if options.is_empty() {
        println!("No valid transaction dates found.");
        return Ok(());
    }

    let selection = MonthSelection::new(options);
    let mut table = Table::new();
    table.set_header(vec!["Month", "Label", "Rows", "Default"]);
    for m in selection.options() {
        let mark = if selection.is_selected(&m.key) { "*" } else { "" };
        table.add_row(vec![
            Cell::new(&m.key),
            Cell::new(&m.label),
            Cell::new(m.count),
            Cell::new(mark),
        ]);
    }
    println!("Months\n{table}");
    Ok(())
}

pub fn preview(
    file: &str,
    mapping: Option<&str>,
    months: &[String],
    all_months: bool,
    limit: usize,
) -> Result<()> {
    let parsed = load_file(file)?;
    let backend = open_backend()?;
    let (mapping, source) = resolve_mapping(&backend, &parsed, mapping)?;
    let options = compute_months(&mapping, &parsed);
    validate_months(&options, months)?;

    let mut selection = MonthSelection::new(options);
    if all_months {
        selection.select_all();
    } else if !months.is_empty() {
        selection.clear();
        for key in months {
            if !selection.is_selected(key) {
                selection.toggle(key);
            }
        }
    }
    let selected = selection.selected();
    tracing::debug!(rows = selection.selected_count(), "preview selection");

    let rows = preview_rows(&parsed, &mapping, &selected, limit);
    let mut table = Table::new();
    table.set_header(vec!["Date", "Description", "Amount", "Currency", "Account", "Owner"]);
    for r in &rows {
        table.add_row(vec![
            Cell::new(r.date),
            Cell::new(&r.description),
            Cell::new(money(r.amount_cents)),
            Cell::new(&r.currency),
            Cell::new(&r.account),
            Cell::new(r.owner.as_deref().unwrap_or("")),
        ]);
    }
    println!("Preview of {} ({source}, months: {})\n{table}", parsed.file_name, selected.join(", "));
    Ok(())
}
