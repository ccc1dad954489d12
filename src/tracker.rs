//! The surface consumed by front ends: one object owning the format registry,
//! category map and note store, plus a cache of the last combined table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::categorizer::CategoryMap;
use crate::error::Result;
use crate::formats::FormatRegistry;
use crate::importer::load_combined_transactions;
use crate::models::TransactionTable;
use crate::notes::{NoteStatistics, NoteStore};
use crate::payments::PaymentFilter;
use crate::settings::Settings;

/// Where the tracker reads its configuration and keeps its notes.
#[derive(Debug, Clone)]
pub struct TrackerPaths {
    pub config_dir: PathBuf,
    pub category_mapping: PathBuf,
    pub notes_file: PathBuf,
}

impl From<&Settings> for TrackerPaths {
    fn from(settings: &Settings) -> Self {
        Self {
            config_dir: PathBuf::from(&settings.config_dir),
            category_mapping: settings.category_mapping_path(),
            notes_file: PathBuf::from(&settings.notes_file),
        }
    }
}

#[derive(Debug)]
struct CachedTable {
    data_root: PathBuf,
    filter_payments: bool,
    table: TransactionTable,
}

#[derive(Debug)]
pub struct Tracker {
    paths: TrackerPaths,
    registry: FormatRegistry,
    categories: CategoryMap,
    notes: NoteStore,
    cache: Option<CachedTable>,
}

impl Tracker {
    pub fn open(paths: TrackerPaths) -> Result<Self> {
        let registry = FormatRegistry::load(&paths.config_dir);
        let categories = CategoryMap::load(&paths.category_mapping);
        let notes = NoteStore::open(&paths.notes_file)?;
        Ok(Self {
            paths,
            registry,
            categories,
            notes,
            cache: None,
        })
    }

    /// Re-read format and category configs from disk.
    pub fn reload_configs(&mut self) {
        self.registry = FormatRegistry::load(&self.paths.config_dir);
        self.categories = CategoryMap::load(&self.paths.category_mapping);
        self.cache = None;
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    pub fn notes(&self) -> &NoteStore {
        &self.notes
    }

    pub fn load_combined_transactions(&mut self, data_root: &Path, filter_payments: bool) -> &TransactionTable {
        let stale = self
            .cache
            .as_ref()
            .is_some_and(|c| c.data_root != data_root || c.filter_payments != filter_payments);
        if stale {
            self.cache = None;
        }
        let cached = self.cache.get_or_insert_with(|| {
            let table = load_combined_transactions(
                data_root,
                &self.registry,
                PaymentFilter::new(filter_payments),
                &self.categories,
                &self.notes,
            );
            log::info!(
                "loaded {} transactions from {} ({} payments filtered)",
                table.transactions.len(),
                data_root.display(),
                table.payments_removed
            );
            CachedTable {
                data_root: data_root.to_path_buf(),
                filter_payments,
                table,
            }
        });
        &cached.table
    }

    pub fn list_unmapped_categories(&self, table: &TransactionTable) -> Vec<String> {
        self.categories
            .list_unmapped(table.transactions.iter().map(|t| t.category_raw.as_deref()))
    }

    pub fn schema_summary(&self) -> BTreeMap<String, Vec<String>> {
        self.registry.schema_summary()
    }

    pub fn get_note(&self, id: &str) -> &str {
        self.notes.get(id)
    }

    pub fn set_note(&mut self, id: &str, note: &str) -> bool {
        self.cache = None;
        self.notes.set(id, note)
    }

    pub fn set_notes<'a, I>(&mut self, edits: I) -> BTreeMap<String, bool>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.cache = None;
        self.notes.set_many(edits)
    }

    pub fn clear_notes(&mut self) -> bool {
        self.cache = None;
        self.notes.clear_all()
    }

    pub fn reload_notes(&mut self) {
        self.cache = None;
        self.notes.load();
    }

    pub fn search_notes(&self, term: &str) -> BTreeMap<String, String> {
        self.notes.search(term)
    }

    pub fn note_statistics(&self) -> NoteStatistics {
        self.notes.statistics()
    }

    pub fn backup_notes(&self, dest: &Path) -> Result<()> {
        self.notes.backup(dest)
    }
}
