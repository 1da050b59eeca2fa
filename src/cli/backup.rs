use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::backup::{create_backup, validate_backup};
use crate::cli::open_backend;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::service::Backend;

pub fn create(output: Option<String>) -> Result<()> {
    let backend = open_backend()?;

    let dest_path = match output {
        Some(p) => {
            let dest = PathBuf::from(p);
            create_backup(backend.conn(), &dest)?;
            dest
        }
        None => backend.create_manual_backup()?,
    };

    let size = std::fs::metadata(&dest_path)?.len();
    println!("Backup saved to {}", dest_path.display());
    println!("Size: {}", format_bytes(size));
    Ok(())
}

pub fn info() -> Result<()> {
    let backend = open_backend()?;
    match backend.last_backup_info()? {
        Some(b) => {
            println!("Last backup: {}", b.path.display());
            println!("Created:     {}", b.modified.format("%Y-%m-%d %H:%M:%S"));
            println!("Size:        {}", format_bytes(b.size));
        }
        None => println!("No backups yet. Run `cashmop backup create`."),
    }
    Ok(())
}

pub fn check(path: &str) -> Result<()> {
    let count = validate_backup(Path::new(path))?;
    println!("{} {path}", "Valid backup".green());
    println!("Transactions: {count}");
    Ok(())
}

pub fn restore(path: &str) -> Result<()> {
    let mut backend = open_backend()?;
    let safety = backend.restore_backup(Path::new(path))?;
    println!("Restored from {path}");
    println!("Previous database saved to {}", safety.display());
    Ok(())
}
