pub mod init;
pub mod load;
pub mod notes;
pub mod schemas;
pub mod status;
pub mod unmapped;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tally::error::Result;
use tally::settings::{load_settings, shellexpand_path, Settings};
use tally::tracker::{Tracker, TrackerPaths};

#[derive(Parser)]
#[command(name = "tally", about = "Normalize bank and card CSV exports and keep notes on transactions.")]
pub struct Cli {
    #[command(flatten)]
    pub paths: PathArgs,
    #[command(subcommand)]
    pub command: Commands,
}

/// Per-invocation overrides for the saved settings.
#[derive(Args, Debug, Default)]
pub struct PathArgs {
    /// Folder holding one sub-folder of CSV exports per bank
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<String>,
    /// Folder holding <bank>_schema.json files and category_mapping.json
    #[arg(long = "config-dir", global = true)]
    pub config_dir: Option<String>,
    /// Notes database file
    #[arg(long = "notes-file", global = true)]
    pub notes_file: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save the given paths as defaults and create the config folder and notes file.
    Init,
    /// Load, normalize and combine every export under the data directory.
    Load {
        /// Keep credit card payment rows
        #[arg(long = "no-filter")]
        no_filter: bool,
        /// Print the combined table as JSON
        #[arg(long)]
        json: bool,
    },
    /// List raw categories that map to nothing and fall into "other".
    Unmapped {
        /// Keep credit card payment rows
        #[arg(long = "no-filter")]
        no_filter: bool,
    },
    /// Show configured banks and their export formats.
    Schemas,
    /// Read and edit transaction notes.
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
    /// Show current paths and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum NotesCommands {
    /// Print the note for a transaction id.
    Get {
        id: String,
    },
    /// Set the note for a transaction id (an empty note removes it).
    Set {
        id: String,
        note: String,
    },
    /// Find notes containing a term, ignoring case.
    Search {
        term: String,
    },
    /// Show note statistics.
    Stats,
    /// Copy the notes database.
    Backup {
        /// Output path (default: <notes dir>/backups/notes-YYYYMMDD-HHMMSS.json)
        #[arg(long)]
        output: Option<String>,
    },
    /// Remove every note.
    Clear {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
}

/// Saved settings with any command-line overrides applied.
pub(crate) fn resolve_settings(args: &PathArgs) -> Settings {
    let mut settings = load_settings();
    if let Some(dir) = &args.data_dir {
        settings.data_dir = shellexpand_path(dir);
    }
    if let Some(dir) = &args.config_dir {
        settings.config_dir = shellexpand_path(dir);
    }
    if let Some(file) = &args.notes_file {
        settings.notes_file = shellexpand_path(file);
    }
    settings
}

pub(crate) fn open_tracker(settings: &Settings) -> Result<Tracker> {
    Tracker::open(TrackerPaths::from(settings))
}

pub(crate) fn data_root(settings: &Settings) -> PathBuf {
    PathBuf::from(&settings.data_dir)
}
