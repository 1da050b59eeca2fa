mod amount;
mod backup;
mod categorizer;
mod cli;
mod dates;
mod db;
mod detection;
mod error;
mod export;
mod fmt;
mod fuzzy;
mod importer;
mod ledger;
mod mapping;
mod models;
mod parser;
mod prefs;
mod presets;
mod range;
mod service;
mod settings;

use std::io::stderr;

use anyhow::Context;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use cli::{BackupCommands, CategoriesCommands, Cli, Commands, MappingsCommands, RulesCommands, TxCommands};

fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("warn") => LevelFilter::WARN,
        Some("off") => LevelFilter::OFF,
        Some("error") => LevelFilter::ERROR,
        Some("info") => LevelFilter::INFO,
        Some("debug") => LevelFilter::DEBUG,
        Some("trace") => LevelFilter::TRACE,
        Some(other) => {
            eprintln!("Invalid log level '{other}', defaulting to 'warn'");
            LevelFilter::WARN
        }
    }
}

fn setup_logging(level: LevelFilter) {
    // stdout carries command output, so logs go to stderr.
    let terminal_log = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry().with(terminal_log).init();
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init {
            data_dir,
            currency,
            owner,
        } => cli::init::run(data_dir, currency, owner).context("init failed"),
        Commands::Status => cli::status::run().context("status failed"),
        Commands::Detect { file } => cli::detect::detect(&file).with_context(|| format!("cannot read {file}")),
        Commands::Map(args) => cli::map::run(&args).with_context(|| format!("cannot map {}", args.file)),
        Commands::Months {
            file,
            mapping,
            json,
        } => cli::detect::months(&file, mapping.as_deref(), json).with_context(|| format!("cannot read {file}")),
        Commands::Preview {
            file,
            mapping,
            months,
            all_months,
            limit,
        } => cli::detect::preview(&file, mapping.as_deref(), &months, all_months, limit)
            .with_context(|| format!("cannot preview {file}")),
        Commands::Import {
            file,
            mapping,
            months,
            account,
            owner,
            save_mapping,
            dry_run,
            no_apply_rules,
            json,
        } => cli::import::run(&cli::import::ImportArgs {
            file: &file,
            mapping: mapping.as_deref(),
            months: &months,
            account: account.as_deref(),
            owner: owner.as_deref(),
            save_mapping: save_mapping.as_deref(),
            dry_run,
            apply_rules: !no_apply_rules,
            json,
        })
        .with_context(|| format!("import of {file} failed")),
        Commands::Mappings { command } => match command {
            MappingsCommands::List => cli::mappings::list(),
            MappingsCommands::Get { id, name } => cli::mappings::get(id, name.as_deref()),
            MappingsCommands::Save { name, mapping } => cli::mappings::save(&name, &mapping),
            MappingsCommands::ImportLegacy => cli::mappings::import_legacy(),
            MappingsCommands::Delete { id, name } => cli::mappings::delete(id, name.as_deref()),
        }
        .context("mappings command failed"),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                category,
                vendor,
                match_type,
                priority,
                min,
                max,
            } => cli::rules::add(cli::rules::AddArgs {
                pattern: &pattern,
                category: &category,
                vendor: vendor.as_deref(),
                match_type: &match_type,
                priority,
                min: min.as_deref(),
                max: max.as_deref(),
            }),
            RulesCommands::List => cli::rules::list(),
        }
        .context("rules command failed"),
        Commands::Categorize => cli::categorize::run().context("categorize failed"),
        Commands::Tx { command } => match command {
            TxCommands::List(args) => cli::tx::list(&args),
            TxCommands::Categorize {
                id,
                category,
                uncategorize,
                json,
            } => {
                let category = if uncategorize { None } else { category };
                cli::tx::categorize(id, category.as_deref(), json)
            }
        }
        .context("tx command failed"),
        Commands::Categories { command } => match command {
            CategoriesCommands::List { json } => cli::categories::list(json),
            CategoriesCommands::Create { name, json } => cli::categories::create(&name, json),
            CategoriesCommands::Rename { id, name, json } => cli::categories::rename(id, &name, json),
        }
        .context("categories command failed"),
        Commands::Export(args) => cli::export::run(&args).context("export failed"),
        Commands::Search {
            query,
            candidates,
            kind,
        } => cli::search::run(&query, candidates, kind).context("search failed"),
        Commands::Backup { command } => match command {
            BackupCommands::Create { output } => cli::backup::create(output),
            BackupCommands::Info => cli::backup::info(),
            BackupCommands::Check { path } => cli::backup::check(&path),
            BackupCommands::Restore { path } => cli::backup::restore(&path),
        }
        .context("backup command failed"),
        Commands::Completions { shell } => cli::completions(shell).context("completions failed"),
    }
}

fn main() {
    let cli = Cli::parse();
    setup_logging(parse_level(cli.log_level.as_deref()));

    if let Err(e) = run(cli.command) {
        match e.downcast_ref::<error::CashmopError>() {
            Some(inner) => eprintln!("Error: {e}: {inner}"),
            None => eprintln!("Error: {e:#}"),
        }
        tracing::debug!("{e:?}");
        std::process::exit(1);
    }
}
