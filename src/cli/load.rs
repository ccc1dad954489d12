use colored::Colorize;
use comfy_table::{Cell, Table};

use tally::error::Result;
use tally::fmt::money_opt;
use tally::models::TransactionTable;
use tally::settings::Settings;

use super::{data_root, open_tracker};

pub fn run(settings: &Settings, no_filter: bool, json: bool) -> Result<()> {
    let mut tracker = open_tracker(settings)?;
    let filter = settings.filter_payments && !no_filter;
    let table = tracker.load_combined_transactions(&data_root(settings), filter);

    if json {
        println!("{}", serde_json::to_string_pretty(table)?);
        return Ok(());
    }
    print_table(table);
    Ok(())
}

fn print_table(combined: &TransactionTable) {
    if combined.transactions.is_empty() {
        println!("No transactions found.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Date", "Bank", "Description", "Category", "Amount", "Note", "ID"]);
        for txn in &combined.transactions {
            let amount = money_opt(txn.amount);
            let amount = match txn.amount {
                Some(a) if a.is_sign_negative() => amount.green().to_string(),
                _ => amount,
            };
            table.add_row(vec![
                Cell::new(txn.date.map(|d| d.to_string()).unwrap_or_default()),
                Cell::new(&txn.bank),
                Cell::new(&txn.description),
                Cell::new(&txn.category_normalized),
                Cell::new(amount),
                Cell::new(&txn.note),
                Cell::new(&txn.id),
            ]);
        }
        println!("{table}");
    }

    println!(
        "{} transactions, {} payments filtered",
        combined.transactions.len(),
        combined.payments_removed
    );
    for unmatched in &combined.unmatched {
        println!(
            "{} {}/{} ({} rows): columns match no configured format",
            "Unmatched:".yellow().bold(),
            unmatched.bank,
            unmatched.source_file,
            unmatched.rows.len()
        );
    }
    if combined.files_skipped > 0 {
        println!(
            "{} {} file(s) could not be read",
            "Skipped:".red().bold(),
            combined.files_skipped
        );
    }
}
