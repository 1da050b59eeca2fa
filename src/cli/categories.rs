use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::cli::open_backend;
use crate::error::Result;
use crate::ledger::{get_or_create_category, list_categories, rename_category, CategoryRow};

#[derive(Serialize)]
struct ListResponse {
    ok: bool,
    items: Vec<CategoryRow>,
}

#[derive(Serialize)]
struct CategoryResponse<'a> {
    ok: bool,
    id: i64,
    name: &'a str,
}

fn category_table(categories: &[CategoryRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type"]);
    for c in categories {
        table.add_row(vec![Cell::new(c.id), Cell::new(&c.name), Cell::new(&c.category_type)]);
    }
    table
}

pub fn list(json: bool) -> Result<()> {
    let backend = open_backend()?;
    let items = list_categories(backend.conn())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ListResponse { ok: true, items })?);
    } else {
        println!("Categories\n{}", category_table(&items));
    }
    Ok(())
}

pub fn create(name: &str, json: bool) -> Result<()> {
    let backend = open_backend()?;
    let id = get_or_create_category(backend.conn(), name)?;
    let name = name.trim();
    if json {
        println!("{}", serde_json::to_string_pretty(&CategoryResponse { ok: true, id, name })?);
    } else {
        println!("Category {id}: {name}");
    }
    Ok(())
}

pub fn rename(id: i64, name: &str, json: bool) -> Result<()> {
    let backend = open_backend()?;
    rename_category(backend.conn(), id, name)?;
    let name = name.trim();
    if json {
        println!("{}", serde_json::to_string_pretty(&CategoryResponse { ok: true, id, name })?);
    } else {
        println!("Renamed category {id} to: {name}");
    }
    Ok(())
}
