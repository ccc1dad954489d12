use std::path::PathBuf;

use tally::error::Result;
use tally::settings::{save_settings, settings_path, Settings};

use super::open_tracker;

/// Persist the resolved settings and create what they point at.
pub fn run(settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(PathBuf::from(&settings.data_dir))?;
    std::fs::create_dir_all(PathBuf::from(&settings.config_dir))?;
    // Opening writes the default category mapping and an empty notes file.
    open_tracker(settings)?;
    save_settings(settings)?;

    println!("Settings saved to {}", settings_path().display());
    println!("Data dir:   {}", settings.data_dir);
    println!("Config dir: {}", settings.config_dir);
    println!("Notes:      {}", settings.notes_file);
    println!();
    println!("Put each bank's CSV exports in <data dir>/<bank>/ and a <bank>_schema.json in the config dir.");
    Ok(())
}
