use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::amount::parse_cents;
use crate::cli::open_backend;
use crate::error::{CashmopError, Result};
use crate::fmt::{decimal, money};
use crate::ledger::{query_transactions, set_transaction_category, validate_date_range, SortField, TxFilter, TxRow};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Default, clap::Args)]
pub struct ListArgs {
    /// First day: YYYY-MM-DD (with --end; default: last month)
    #[arg(long)]
    pub start: Option<String>,
    /// Last day: YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,
    /// Category ID to include (repeatable or comma-separated)
    #[arg(long = "category-id", value_delimiter = ',')]
    pub category_ids: Vec<i64>,
    /// Include uncategorized transactions in the category filter
    #[arg(long)]
    pub uncategorized: bool,
    /// Fuzzy search over description, account, category, owner, date and amount
    #[arg(long)]
    pub query: Option<String>,
    #[arg(long = "amount-min", allow_hyphen_values = true)]
    pub amount_min: Option<String>,
    #[arg(long = "amount-max", allow_hyphen_values = true)]
    pub amount_max: Option<String>,
    #[arg(long, value_enum, default_value = "date")]
    pub sort: SortField,
    #[arg(long, value_enum, default_value = "desc")]
    pub order: SortOrder,
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ListedTransaction<'a> {
    id: i64,
    date: &'a str,
    description: &'a str,
    amount: String,
    currency: &'a str,
    category: &'a str,
    account: &'a str,
    owner: &'a str,
}

#[derive(Serialize)]
struct ListResponse<'a> {
    ok: bool,
    count: usize,
    transactions: Vec<ListedTransaction<'a>>,
}

#[derive(Serialize)]
struct CategorizeResponse {
    ok: bool,
    transaction_id: i64,
    category_id: Option<i64>,
}

fn amount_bound(raw: Option<&str>, flag: &str) -> Result<Option<i64>> {
    raw.map(|v| {
        parse_cents(v).ok_or_else(|| CashmopError::Other(format!("Invalid amount for --{flag}: '{v}' (use 12.34)")))
    })
    .transpose()
}

fn build_filter(args: &ListArgs, today: chrono::NaiveDate) -> Result<TxFilter> {
    let (start, end) = validate_date_range(args.start.as_deref(), args.end.as_deref(), today)?;
    Ok(TxFilter {
        start: Some(start),
        end: Some(end),
        category_ids: args.category_ids.clone(),
        uncategorized: args.uncategorized,
        query: args.query.clone(),
        min_cents: amount_bound(args.amount_min.as_deref(), "amount-min")?,
        max_cents: amount_bound(args.amount_max.as_deref(), "amount-max")?,
        sort: args.sort,
        ascending: args.order == SortOrder::Asc,
    })
}

fn listed(row: &TxRow) -> ListedTransaction<'_> {
    ListedTransaction {
        id: row.id,
        date: &row.date,
        description: &row.description,
        amount: decimal(row.amount_cents),
        currency: &row.currency,
        category: row.category_label(),
        account: &row.account,
        owner: row.owner.as_deref().unwrap_or(""),
    }
}

pub fn list(args: &ListArgs) -> Result<()> {
    let filter = build_filter(args, chrono::Local::now().date_naive())?;
    let backend = open_backend()?;
    let rows = query_transactions(backend.conn(), &filter)?;

    if args.json {
        let response = ListResponse {
            ok: true,
            count: rows.len(),
            transactions: rows.iter().map(listed).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Amount", "Curr", "Category", "Account", "Description"]);
    for r in &rows {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(&r.date),
            Cell::new(money(r.amount_cents)),
            Cell::new(&r.currency),
            Cell::new(r.category_label()),
            Cell::new(&r.account),
            Cell::new(&r.description),
        ]);
    }
    let day = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    println!("Transactions {} to {} ({})\n{table}", day(filter.start), day(filter.end), rows.len());
    Ok(())
}

pub fn categorize(id: i64, category: Option<&str>, json: bool) -> Result<()> {
    let backend = open_backend()?;
    let category_id = set_transaction_category(backend.conn(), id, category)?;
    if json {
        let response = CategorizeResponse {
            ok: true,
            transaction_id: id,
            category_id,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if let Some(name) = category.filter(|_| category_id.is_some()) {
        println!("Transaction {id} \u{2192} {}", name.trim());
    } else {
        println!("Transaction {id} is now uncategorized");
    }
    Ok(())
}
