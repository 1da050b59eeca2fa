use crate::cli::open_backend;
use crate::db::{account_names, category_names, owner_names};
use crate::error::Result;
use crate::prefs::{prefs_path, JsonFileStore, PreferenceCache};
use crate::service::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchKind {
    Accounts,
    Owners,
    Categories,
}

/// Stored names merged with remembered ones, first occurrence kept.
fn merge(mut stored: Vec<String>, remembered: Vec<String>) -> Vec<String> {
    for name in remembered {
        if !stored.contains(&name) {
            stored.push(name);
        }
    }
    stored
}

pub fn run(query: &str, candidates: Vec<String>, kind: SearchKind) -> Result<()> {
    let backend = open_backend()?;
    let candidates = if !candidates.is_empty() {
        candidates
    } else {
        let cache = PreferenceCache::new(JsonFileStore::new(prefs_path()));
        match kind {
            SearchKind::Accounts => merge(account_names(backend.conn())?, cache.accounts()),
            SearchKind::Owners => merge(owner_names(backend.conn())?, cache.owners()),
            SearchKind::Categories => category_names(backend.conn())?,
        }
    };

    let hits = backend.fuzzy_search(query, &candidates);
    if hits.is_empty() {
        println!("No matches for '{query}'.");
    }
    for hit in hits {
        println!("{hit}");
    }
    Ok(())
}
