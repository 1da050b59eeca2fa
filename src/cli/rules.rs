use comfy_table::{Cell, Table};

use crate::amount::parse_cents;
use crate::categorizer::{active_rules, add_rule, NewRule};
use crate::cli::open_backend;
use crate::error::{CashmopError, Result};
use crate::fmt::money;

pub struct AddArgs<'a> {
    pub pattern: &'a str,
    pub category: &'a str,
    pub vendor: Option<&'a str>,
    pub match_type: &'a str,
    pub priority: i64,
    pub min: Option<&'a str>,
    pub max: Option<&'a str>,
}

fn parse_bound(raw: Option<&str>, flag: &str) -> Result<Option<i64>> {
    match raw {
        None => Ok(None),
        Some(v) => parse_cents(v)
            .map(Some)
            .ok_or_else(|| CashmopError::Other(format!("Invalid amount for --{flag}: '{v}'"))),
    }
}

pub fn add(args: AddArgs) -> Result<()> {
    let backend = open_backend()?;
    let rule = NewRule {
        pattern: args.pattern,
        category: args.category,
        vendor: args.vendor,
        match_type: args.match_type,
        priority: args.priority,
        min_amount_cents: parse_bound(args.min, "min")?,
        max_amount_cents: parse_bound(args.max, "max")?,
    };
    let id = add_rule(backend.conn(), &rule)?;
    println!("Added rule {id}: '{}' \u{2192} {}", args.pattern, args.category);
    Ok(())
}

pub fn list() -> Result<()> {
    let backend = open_backend()?;
    let rules = active_rules(backend.conn())?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Type", "Vendor", "Category", "Amount", "Priority", "Hits"]);
    for r in rules {
        let range = match (r.min_amount_cents, r.max_amount_cents) {
            (None, None) => String::new(),
            (Some(min), None) => format!(">= {}", money(min)),
            (None, Some(max)) => format!("<= {}", money(max)),
            (Some(min), Some(max)) => format!("{} .. {}", money(min), money(max)),
        };
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.pattern),
            Cell::new(r.match_type),
            Cell::new(r.vendor.unwrap_or_default()),
            Cell::new(r.category),
            Cell::new(range),
            Cell::new(r.priority),
            Cell::new(r.hit_count),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}
