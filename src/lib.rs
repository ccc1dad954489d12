//! Normalize bank and credit-card CSV exports into one transaction table,
//! with stable ids and a crash-safe note store keyed by those ids.

pub mod categorizer;
pub mod error;
pub mod fmt;
pub mod formats;
pub mod identity;
pub mod importer;
pub mod lock;
pub mod models;
pub mod normalizer;
pub mod notes;
pub mod payments;
pub mod settings;
pub mod tracker;

pub use categorizer::CategoryMap;
pub use error::{Result, TallyError};
pub use formats::FormatRegistry;
pub use identity::{compute_id, Identify};
pub use models::{Transaction, TransactionTable};
pub use notes::NoteStore;
pub use payments::PaymentFilter;
pub use tracker::{Tracker, TrackerPaths};
