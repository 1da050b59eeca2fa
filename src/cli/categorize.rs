use crate::categorizer::categorize_transactions;
use crate::cli::open_backend;
use crate::error::Result;

pub fn run() -> Result<()> {
    let backend = open_backend()?;
    let result = categorize_transactions(backend.conn())?;
    println!(
        "{} categorized, {} still uncategorized",
        result.categorized, result.still_uncategorized
    );
    Ok(())
}
