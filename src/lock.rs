use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::Result;

/// Advisory lock held on a file until the guard drops.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

fn open_lock_file(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

impl FileLock {
    /// Block until a shared (reader) lock on `path` is held.
    pub fn shared(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self { file })
    }

    /// Block until an exclusive (writer) lock on `path` is held.
    pub fn exclusive(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("failed to release file lock: {e}");
        }
    }
}
