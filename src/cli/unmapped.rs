use comfy_table::{Cell, Table};

use tally::error::Result;
use tally::settings::Settings;

use super::{data_root, open_tracker};

pub fn run(settings: &Settings, no_filter: bool) -> Result<()> {
    let mut tracker = open_tracker(settings)?;
    let filter = settings.filter_payments && !no_filter;
    let combined = tracker.load_combined_transactions(&data_root(settings), filter).clone();
    let unmapped = tracker.list_unmapped_categories(&combined);

    if unmapped.is_empty() {
        println!("Every category maps to a canonical category.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Raw Category", "Transactions"]);
    for category in &unmapped {
        let count = combined
            .transactions
            .iter()
            .filter(|t| t.category_raw.as_deref() == Some(category.as_str()))
            .count();
        table.add_row(vec![Cell::new(category), Cell::new(count)]);
    }
    println!("Unmapped categories\n{table}");
    println!(
        "Add them to {} to classify them.",
        settings.category_mapping_path().display()
    );
    Ok(())
}
