use std::path::Path;

use tally::error::Result;
use tally::fmt::format_bytes;
use tally::importer::{detect_bank_folders, statement_files};
use tally::settings::{settings_path, Settings};

use super::{data_root, open_tracker};

pub fn run(settings: &Settings) -> Result<()> {
    let data_dir = data_root(settings);
    let notes_file = Path::new(&settings.notes_file);

    println!("Settings:   {}", settings_path().display());
    println!("Data dir:   {}", data_dir.display());
    println!("Config dir: {}", settings.config_dir);
    println!("Notes:      {}", notes_file.display());
    println!(
        "Payments:   {}",
        if settings.filter_payments { "filtered" } else { "kept" }
    );

    let tracker = open_tracker(settings)?;
    if let Ok(meta) = std::fs::metadata(notes_file) {
        println!("Notes size: {}", format_bytes(meta.len()));
    }

    let banks = detect_bank_folders(&data_dir);
    let files: usize = banks
        .iter()
        .map(|bank| statement_files(&data_dir.join(bank)).len())
        .sum();
    let configured = tracker.registry().banks();
    let stats = tracker.note_statistics();

    println!();
    println!("Bank folders:     {}", banks.len());
    println!("Export files:     {files}");
    println!("Configured banks: {}", configured.len());
    println!("Categories:       {}", tracker.categories().canonical_categories().len());
    println!("Notes:            {}", stats.total_notes);

    let missing: Vec<&String> = banks
        .iter()
        .filter(|b| !configured.contains(&b.as_str()))
        .collect();
    if !missing.is_empty() {
        println!();
        for bank in missing {
            println!("No format config for bank folder '{bank}'");
        }
    }
    Ok(())
}
