pub mod backup;
pub mod categories;
pub mod categorize;
pub mod detect;
pub mod export;
pub mod import;
pub mod init;
pub mod map;
pub mod mappings;
pub mod rules;
pub mod search;
pub mod status;
pub mod tx;

use std::io::Read;
use std::path::Path;

use clap::{CommandFactory, Parser, Subcommand};

use crate::detection::{apply_preset_to_headers, initial_mapping};
use crate::error::{CashmopError, Result};
use crate::mapping::ImportMapping;
use crate::parser::{parse_file, ParsedFile};
use crate::service::{Backend, LocalBackend};
use crate::settings::{get_data_dir, load_settings};

#[derive(Parser)]
#[command(name = "cashmop", version, about = "Import bank exports into a local ledger.")]
pub struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long = "log-level", global = true, env = "CASHMOP_LOG")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for cashmop data (default: ~/Documents/cashmop)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Currency used when a file has none (default: CAD)
        #[arg(long)]
        currency: Option<String>,
        /// Your name, shown in status
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show the database location and row counts.
    Status,
    /// Show a file's columns and the mapping cashmop would start from.
    Detect {
        /// CSV, XLSX or XLS file
        file: String,
    },
    /// Build or edit a column mapping for a file.
    Map(map::MapArgs),
    /// List the months found in a file.
    Months {
        file: String,
        /// Mapping JSON file, saved mapping name, or - for stdin
        #[arg(long)]
        mapping: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the transactions an import would write.
    Preview {
        file: String,
        #[arg(long)]
        mapping: Option<String>,
        /// Month to include: YYYY-MM (repeatable, default: latest)
        #[arg(long = "month", conflicts_with = "all_months")]
        months: Vec<String>,
        /// Include every month in the file
        #[arg(long = "all-months")]
        all_months: bool,
        /// Rows to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Import a file into the ledger.
    Import {
        file: String,
        #[arg(long)]
        mapping: Option<String>,
        /// Month to import: YYYY-MM (repeatable; required when the file spans several)
        #[arg(long = "month")]
        months: Vec<String>,
        /// Account for every row (overrides the mapping's constant)
        #[arg(long)]
        account: Option<String>,
        /// Owner for every row
        #[arg(long)]
        owner: Option<String>,
        /// Save the mapping used under this name
        #[arg(long = "save-mapping")]
        save_mapping: Option<String>,
        /// Parse and validate without writing anything
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Skip categorization rules after import
        #[arg(long = "no-apply-rules")]
        no_apply_rules: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Manage saved column mappings.
    Mappings {
        #[command(subcommand)]
        command: MappingsCommands,
    },
    /// Manage categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Run categorization rules on uncategorized transactions.
    Categorize,
    /// List transactions or categorize one by hand.
    Tx {
        #[command(subcommand)]
        command: TxCommands,
    },
    /// List, create or rename categories.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Write transactions in a date range to CSV or XLSX.
    Export(export::ExportArgs),
    /// Fuzzy-search accounts, owners or categories.
    Search {
        query: String,
        /// Candidates to rank instead of stored names
        candidates: Vec<String>,
        /// What to search when no candidates are given
        #[arg(long, value_enum, default_value = "accounts")]
        kind: search::SearchKind,
    },
    /// Back up or restore the database.
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum MappingsCommands {
    /// List saved mappings.
    List,
    /// Print a saved mapping as JSON.
    Get {
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<i64>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Save a mapping JSON file (or - for stdin) under a name.
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        mapping: String,
    },
    /// Move mappings cached by older versions into the database.
    ImportLegacy,
    /// Delete a saved mapping.
    Delete {
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<i64>,
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a categorization rule.
    Add {
        /// Pattern to match against transaction descriptions
        pattern: String,
        /// Category name to assign
        #[arg(long)]
        category: String,
        /// Normalized vendor name
        #[arg(long)]
        vendor: Option<String>,
        /// Match type: contains, starts_with, ends_with, exact, regex
        #[arg(long = "match-type", default_value = "contains")]
        match_type: String,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i64,
        /// Only match amounts at or above this (e.g. -50.00)
        #[arg(long, allow_hyphen_values = true)]
        min: Option<String>,
        /// Only match amounts at or below this
        #[arg(long, allow_hyphen_values = true)]
        max: Option<String>,
    },
    /// List categorization rules.
    List,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// List transactions (default range: last month).
    List(tx::ListArgs),
    /// Set or clear one transaction's category.
    Categorize {
        #[arg(long)]
        id: i64,
        /// Category name (created if it does not exist)
        #[arg(long, required_unless_present = "uncategorize", conflicts_with = "uncategorize")]
        category: Option<String>,
        /// Clear the category
        #[arg(long)]
        uncategorize: bool,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// List active categories.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Create a category, or show the existing one with that name.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Rename a category.
    Rename {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Write a backup (default: <data_dir>/backups/cashmop_backup_<stamp>.db).
    Create {
        #[arg(long)]
        output: Option<String>,
    },
    /// Show the most recent backup.
    Info,
    /// Validate a backup and show what it contains.
    Check { path: String },
    /// Replace the database with a backup.
    Restore { path: String },
}

pub fn completions(shell: clap_complete::Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "cashmop", &mut std::io::stdout());
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub(crate) fn open_backend() -> Result<LocalBackend> {
    LocalBackend::open(&get_data_dir())
}

pub(crate) fn load_file(file: &str) -> Result<ParsedFile> {
    parse_file(Path::new(file))
}

pub(crate) fn read_mapping_json(arg: &str) -> Result<ImportMapping> {
    let json = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(arg)?
    };
    ImportMapping::from_json(&json)
}

/// Resolve `--mapping`: `-` reads stdin, an existing path is read as JSON,
/// anything else is a saved mapping name. Without `--mapping` the mapping is
/// detected from saved presets or guessed from the headers.
pub(crate) fn resolve_mapping(
    backend: &LocalBackend,
    file: &ParsedFile,
    arg: Option<&str>,
) -> Result<(ImportMapping, String)> {
    match arg {
        Some("-") => Ok((read_mapping_json("-")?, "stdin".into())),
        Some(path) if Path::new(path).is_file() => Ok((read_mapping_json(path)?, path.to_string())),
        Some(name) => {
            let saved = backend
                .column_mapping_by_name(name)?
                .ok_or_else(|| CashmopError::UnknownMapping(name.to_string()))?;
            let mapping = apply_preset_to_headers(&saved.mapping, &file.headers);
            Ok((mapping, format!("saved mapping '{}'", saved.name)))
        }
        None => {
            let presets = backend.column_mappings()?;
            let currency = load_settings().currency();
            let (mapping, picked) = initial_mapping(file, &presets, &currency);
            let source = match picked {
                Some(p) => format!("detected saved mapping '{}'", p.name),
                None => "guessed from headers".to_string(),
            };
            Ok((mapping, source))
        }
    }
}
