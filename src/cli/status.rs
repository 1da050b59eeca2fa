use colored::Colorize;

use crate::error::Result;
use crate::fmt::format_bytes;
use crate::models::Summary;
use crate::service::{Backend, LocalBackend};
use crate::settings::{db_path, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = db_path();

    println!("Owner:      {}", if settings.owner.is_empty() { "(not set)" } else { &settings.owner });
    println!("Currency:   {}", settings.currency());
    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let backend = LocalBackend::open(&data_dir)?;
        let summary = Summary::load(backend.conn())?;

        println!();
        println!("Accounts:       {}", summary.accounts);
        println!("Owners:         {}", summary.owners);
        println!("Transactions:   {}", summary.transactions);
        println!("Uncategorized:  {}", summary.uncategorized);
        println!("Rules:          {}", summary.rules);
        println!("Mappings:       {}", summary.mappings);

        match backend.last_backup_info()? {
            Some(b) => println!("Last backup:    {}", b.modified.format("%Y-%m-%d %H:%M")),
            None => println!("Last backup:    never"),
        }
        println!();
        println!("cashmop {}", backend.version());
        if backend.is_test_env() {
            println!("{}", "Test environment".yellow());
        }
    } else {
        println!();
        println!("Database not found. Run `cashmop init` to set up.");
    }

    Ok(())
}
