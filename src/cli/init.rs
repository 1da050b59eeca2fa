use std::path::PathBuf;

use colored::Colorize;

use crate::error::Result;
use crate::service::LocalBackend;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, currency: Option<String>, owner: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(code) = currency {
        settings.default_currency = code.trim().to_uppercase();
    }
    if let Some(name) = owner {
        settings.owner = name.trim().to_string();
    }
    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(resolved.join("backups"))?;
    LocalBackend::open(&resolved)?;
    save_settings(&settings)?;

    println!("{} {}", "Initialized".green().bold(), resolved.display());
    println!("Default currency: {}", settings.currency());
    Ok(())
}
