use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, Table};

use tally::error::{Result, TallyError};
use tally::fmt::format_bytes;
use tally::settings::Settings;

use super::open_tracker;

pub fn get(settings: &Settings, id: &str) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let note = tracker.get_note(id);
    if note.is_empty() {
        println!("No note for {id}");
    } else {
        println!("{note}");
    }
    Ok(())
}

pub fn set(settings: &Settings, id: &str, note: &str) -> Result<()> {
    let mut tracker = open_tracker(settings)?;
    if !tracker.set_note(id, note) {
        return Err(TallyError::Persist(format!(
            "could not save note for {id} to {}",
            settings.notes_file
        )));
    }
    if note.trim().is_empty() {
        println!("Removed note for {id}");
    } else {
        println!("Saved note for {id}");
    }
    Ok(())
}

pub fn search(settings: &Settings, term: &str) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let hits = tracker.search_notes(term);
    if hits.is_empty() {
        println!("No notes match '{term}'.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Note"]);
    for (id, note) in &hits {
        table.add_row(vec![Cell::new(id), Cell::new(note)]);
    }
    println!("{table}");
    println!("{} match(es)", hits.len());
    Ok(())
}

pub fn stats(settings: &Settings) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let stats = tracker.note_statistics();
    println!("Notes:           {}", stats.total_notes);
    println!("Characters:      {}", stats.total_characters);
    println!("Average length:  {:.1}", stats.average_note_length);
    println!("Last updated:    {}", stats.last_updated);
    println!("Version:         {}", stats.database_version);
    Ok(())
}

fn default_backup_path(notes_file: &Path) -> PathBuf {
    let dir = notes_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    dir.join("backups").join(format!("notes-{stamp}.json"))
}

pub fn backup(settings: &Settings, output: Option<String>) -> Result<()> {
    let tracker = open_tracker(settings)?;
    let dest = match output {
        Some(p) => PathBuf::from(p),
        None => default_backup_path(Path::new(&settings.notes_file)),
    };
    tracker.backup_notes(&dest)?;

    let size = std::fs::metadata(&dest)?.len();
    println!("Backup saved to {}", dest.display());
    println!("Size: {}", format_bytes(size));
    Ok(())
}

pub fn clear(settings: &Settings, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "{} this removes every note. Re-run with --yes to confirm.",
            "Warning:".yellow().bold()
        );
        return Ok(());
    }
    let mut tracker = open_tracker(settings)?;
    let count = tracker.note_statistics().total_notes;
    if !tracker.clear_notes() {
        return Err(TallyError::Persist(format!(
            "could not clear notes in {}",
            settings.notes_file
        )));
    }
    println!("Cleared {count} note(s)");
    Ok(())
}
