use colored::Colorize;
use comfy_table::{Cell, Table};

use tally::error::Result;
use tally::settings::Settings;

use super::open_tracker;

pub fn run(settings: &Settings) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let summary = tracker.schema_summary();

    if summary.is_empty() {
        println!("No format configs found in {}", settings.config_dir);
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Bank", "Formats"]);
        for (bank, formats) in &summary {
            table.add_row(vec![Cell::new(bank), Cell::new(formats.join(", "))]);
        }
        println!("Formats\n{table}");
    }

    for (path, error) in tracker.registry().load_errors() {
        println!("{} {}: {error}", "Skipped:".red().bold(), path.display());
    }
    Ok(())
}
