use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, TallyError};
use crate::lock::FileLock;
use crate::models::Transaction;

pub const STORE_VERSION: &str = "1.0";

fn now_iso() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    pub created: String,
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_created: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        let now = now_iso();
        Self {
            version: STORE_VERSION.to_string(),
            created: now.clone(),
            last_updated: now,
            backup_created: None,
        }
    }
}

/// The on-disk document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub transaction_notes: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteStatistics {
    pub total_notes: usize,
    pub total_characters: usize,
    pub average_note_length: f64,
    pub last_updated: String,
    pub database_version: String,
}

/// Missing or undecodable content, as opposed to a failure to read at all.
fn is_unusable_document(e: &TallyError) -> bool {
    match e {
        TallyError::Json(_) => true,
        TallyError::Io(io) => matches!(io.kind(), ErrorKind::NotFound | ErrorKind::InvalidData),
        _ => false,
    }
}

fn write_json(file: &mut File, snapshot: &Snapshot) -> Result<()> {
    serde_json::to_writer_pretty(&mut *file, snapshot)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Notes keyed by transaction id, persisted as one JSON document.
///
/// Writers take an exclusive lock on `<file>.lock` around the temp-write and
/// rename; readers take a shared lock on it while loading. The document is only
/// ever replaced by rename, so it is never seen half-written.
#[derive(Debug)]
pub struct NoteStore {
    path: PathBuf,
    lock_path: PathBuf,
    snapshot: Snapshot,
}

impl NoteStore {
    /// Create the parent directory and an empty document if needed, then load.
    pub fn open(path: &Path) -> Result<Self> {
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        let mut store = Self {
            path: path.to_path_buf(),
            lock_path: PathBuf::from(lock_name),
            snapshot: Snapshot::default(),
        };
        if let Some(dir) = store.parent_dir() {
            std::fs::create_dir_all(dir)?;
        }
        if !path.exists() {
            store.persist_snapshot(&store.snapshot)?;
        }
        store.load();
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    fn read_snapshot(&self) -> Result<Snapshot> {
        let _lock = FileLock::shared(&self.lock_path)?;
        let content = std::fs::read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    /// Re-read the document. A missing or corrupt document is replaced by an
    /// empty one, which is written back immediately. Any other failure (lock,
    /// permissions, I/O) keeps the notes already in memory and writes nothing.
    pub fn load(&mut self) -> &Snapshot {
        match self.read_snapshot() {
            Ok(snapshot) => self.snapshot = snapshot,
            Err(e) if is_unusable_document(&e) => {
                log::error!("error loading notes file {}: {e}, using empty store", self.path.display());
                let fresh = Snapshot::default();
                if let Err(e) = self.persist_snapshot(&fresh) {
                    log::error!("could not rewrite notes file: {e}");
                }
                self.snapshot = fresh;
            }
            Err(e) => {
                log::error!("could not read notes file {}: {e}, keeping current notes", self.path.display());
            }
        }
        &self.snapshot
    }

    /// Write the current state to disk.
    pub fn persist(&mut self) -> Result<()> {
        let snapshot = self.snapshot.clone();
        self.snapshot = self.commit(snapshot)?;
        Ok(())
    }

    /// Stamp `last_updated`, write, and hand back what was written.
    fn commit(&self, mut snapshot: Snapshot) -> Result<Snapshot> {
        snapshot.metadata.last_updated = now_iso();
        self.persist_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    fn persist_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.write_atomically(snapshot, write_json)
    }

    /// Temp file in the same directory, fsync, then rename over the target.
    /// On any failure the temp file is removed and the target is untouched.
    fn write_atomically<F>(&self, snapshot: &Snapshot, write: F) -> Result<()>
    where
        F: FnOnce(&mut File, &Snapshot) -> Result<()>,
    {
        let dir = self.parent_dir().unwrap_or_else(|| Path::new("."));
        let _lock = FileLock::exclusive(&self.lock_path)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        write(tmp.as_file_mut(), snapshot)?;
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| TallyError::Persist(e.error.to_string()))?;
        if let Ok(dir) = File::open(dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> &str {
        self.snapshot
            .transaction_notes
            .get(id)
            .map(String::as_str)
            .unwrap_or("")
    }

    fn try_set(&mut self, id: &str, note: &str) -> Result<()> {
        let mut next = self.snapshot.clone();
        let trimmed = note.trim();
        if trimmed.is_empty() {
            next.transaction_notes.remove(id);
        } else {
            next.transaction_notes.insert(id.to_string(), trimmed.to_string());
        }
        self.snapshot = self.commit(next)?;
        Ok(())
    }

    /// Store `note` for `id`; a blank note removes it. Returns false, with
    /// nothing changed in memory, when the write fails.
    pub fn set(&mut self, id: &str, note: &str) -> bool {
        match self.try_set(id, note) {
            Ok(()) => true,
            Err(e) => {
                log::error!("error setting note for transaction {id}: {e}");
                false
            }
        }
    }

    /// Apply several edits; each one is persisted on its own.
    pub fn set_many<'a, I>(&mut self, edits: I) -> BTreeMap<String, bool>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        edits
            .into_iter()
            .map(|(id, note)| (id.to_string(), self.set(id, note)))
            .collect()
    }

    pub fn clear_all(&mut self) -> bool {
        let mut next = self.snapshot.clone();
        next.transaction_notes.clear();
        match self.commit(next) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                true
            }
            Err(e) => {
                log::error!("error clearing notes: {e}");
                false
            }
        }
    }

    pub fn notes(&self) -> &BTreeMap<String, String> {
        &self.snapshot.transaction_notes
    }

    pub fn metadata(&self) -> &Metadata {
        &self.snapshot.metadata
    }

    /// Notes whose text contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> BTreeMap<String, String> {
        if term.trim().is_empty() {
            return BTreeMap::new();
        }
        let needle = term.to_lowercase();
        self.snapshot
            .transaction_notes
            .iter()
            .filter(|(_, note)| note.to_lowercase().contains(&needle))
            .map(|(id, note)| (id.clone(), note.clone()))
            .collect()
    }

    pub fn statistics(&self) -> NoteStatistics {
        let notes = &self.snapshot.transaction_notes;
        let total_characters: usize = notes.values().map(|n| n.chars().count()).sum();
        let average_note_length = if notes.is_empty() {
            0.0
        } else {
            total_characters as f64 / notes.len() as f64
        };
        NoteStatistics {
            total_notes: notes.len(),
            total_characters,
            average_note_length,
            last_updated: self.snapshot.metadata.last_updated.clone(),
            database_version: self.snapshot.metadata.version.clone(),
        }
    }

    /// Write a stamped copy of the current document to `dest`.
    pub fn backup(&self, dest: &Path) -> Result<()> {
        let mut copy = self.snapshot.clone();
        copy.metadata.backup_created = Some(now_iso());
        if let Some(dir) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&copy)?;
        std::fs::write(dest, format!("{json}\n"))?;
        Ok(())
    }

    /// Attach each transaction's note (empty when none).
    pub fn merge(&self, transactions: &mut [Transaction]) {
        for txn in transactions.iter_mut() {
            txn.note = self.get(&txn.id).to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, NoteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::open(&dir.path().join("data").join("notes_database.json")).unwrap();
        (dir, store)
    }

    fn on_disk(store: &NoteStore) -> Snapshot {
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_open_creates_empty_document() {
        let (_dir, store) = store();
        assert!(store.path().exists());
        let snap = on_disk(&store);
        assert!(snap.transaction_notes.is_empty());
        assert_eq!(snap.metadata.version, "1.0");
    }

    #[test]
    fn test_set_get_roundtrip_and_clear() {
        let (_dir, mut store) = store();
        assert!(store.set("abc123", "hello"));
        assert_eq!(store.get("abc123"), "hello");
        assert_eq!(on_disk(&store).transaction_notes["abc123"], "hello");

        assert!(store.set("abc123", ""));
        assert_eq!(store.get("abc123"), "");
        assert!(!store.notes().contains_key("abc123"));
        assert!(!on_disk(&store).transaction_notes.contains_key("abc123"));
    }

    #[test]
    fn test_whitespace_note_removes_and_text_is_trimmed() {
        let (_dir, mut store) = store();
        store.set("id1", "  spaced out  ");
        assert_eq!(store.get("id1"), "spaced out");
        store.set("id1", "   \n ");
        assert!(store.notes().is_empty());
    }

    #[test]
    fn test_notes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        {
            let mut store = NoteStore::open(&path).unwrap();
            store.set("id1", "dinner with Sam");
        }
        let store = NoteStore::open(&path).unwrap();
        assert_eq!(store.get("id1"), "dinner with Sam");
    }

    #[test]
    fn test_corrupt_document_is_reset_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, "{\"transaction_notes\": {\"a\": ").unwrap();
        let store = NoteStore::open(&path).unwrap();
        assert!(store.notes().is_empty());
        let content = std::fs::read_to_string(&path).unwrap();
        let snap: Snapshot = serde_json::from_str(&content).unwrap();
        assert!(snap.transaction_notes.is_empty());
    }

    #[test]
    fn test_unreadable_lock_keeps_notes_in_memory_and_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let mut store = NoteStore::open(&path).unwrap();
        assert!(store.set("id1", "dinner with Sam"));
        let before = std::fs::read_to_string(&path).unwrap();

        // A directory where the lock file should be makes every lock attempt fail.
        let lock_path = dir.path().join("notes.json.lock");
        std::fs::remove_file(&lock_path).unwrap();
        std::fs::create_dir(&lock_path).unwrap();

        store.load();
        assert_eq!(store.get("id1"), "dinner with Sam");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_only_missing_or_corrupt_content_triggers_reset() {
        let io = |kind: ErrorKind| TallyError::Io(std::io::Error::from(kind));
        assert!(is_unusable_document(&io(ErrorKind::NotFound)));
        assert!(is_unusable_document(&io(ErrorKind::InvalidData)));
        assert!(!is_unusable_document(&io(ErrorKind::PermissionDenied)));
        assert!(!is_unusable_document(&io(ErrorKind::Other)));
        let bad_json = serde_json::from_str::<Snapshot>("{").unwrap_err();
        assert!(is_unusable_document(&TallyError::Json(bad_json)));
    }

    #[test]
    fn test_missing_document_is_recreated_empty() {
        let (_dir, mut store) = store();
        store.set("id1", "gone soon");
        std::fs::remove_file(store.path()).unwrap();
        store.load();
        assert!(store.notes().is_empty());
        assert!(on_disk(&store).transaction_notes.is_empty());
    }

    #[test]
    fn test_load_picks_up_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let mut reader = NoteStore::open(&path).unwrap();
        let mut writer = NoteStore::open(&path).unwrap();
        writer.set("id9", "from another process");
        assert_eq!(reader.get("id9"), "");
        reader.load();
        assert_eq!(reader.get("id9"), "from another process");
    }

    #[test]
    fn test_interrupted_write_leaves_previous_document_intact() {
        let (dir, mut store) = store();
        store.set("id1", "keep me");
        let before = std::fs::read_to_string(store.path()).unwrap();

        let mut next = store.snapshot.clone();
        next.transaction_notes.insert("id2".to_string(), "lost".to_string());
        let result = store.write_atomically(&next, |file, snap| {
            let bytes = serde_json::to_vec_pretty(snap)?;
            file.write_all(&bytes[..bytes.len() / 2])?;
            Err(TallyError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "simulated crash",
            )))
        });
        assert!(result.is_err());

        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
        assert_eq!(on_disk(&store).transaction_notes["id1"], "keep me");
        let data_dir = dir.path().join("data");
        assert_eq!(
            dir_entries(&data_dir),
            vec!["notes_database.json", "notes_database.json.lock"]
        );
    }

    #[test]
    fn test_failed_set_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let mut store = NoteStore::open(&data_dir.join("notes.json")).unwrap();
        assert!(store.set("id1", "original"));

        // Swap the directory for a plain file so no temp file can be created.
        std::fs::remove_dir_all(&data_dir).unwrap();
        std::fs::write(&data_dir, "not a directory").unwrap();

        assert!(!store.set("id1", "changed"));
        assert!(!store.set("id2", "new"));
        assert_eq!(store.get("id1"), "original");
        assert_eq!(store.get("id2"), "");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let (_dir, mut store) = store();
        store.set("a", "Lunch with Alice");
        store.set("b", "gas for road trip");
        store.set("c", "ALICE birthday gift");
        let hits = store.search("alice");
        assert_eq!(hits.len(), 2);
        assert!(hits.contains_key("a") && hits.contains_key("c"));
        assert!(store.search("   ").is_empty());
    }

    #[test]
    fn test_statistics() {
        let (_dir, mut store) = store();
        let empty = store.statistics();
        assert_eq!(empty.total_notes, 0);
        assert_eq!(empty.average_note_length, 0.0);

        store.set("id1", "abc");
        store.set("id2", "de");
        let stats = store.statistics();
        assert_eq!(stats.total_notes, 2);
        assert_eq!(stats.total_characters, 5);
        assert_eq!(stats.average_note_length, 2.5);
        assert_eq!(stats.database_version, "1.0");
        assert_eq!(stats.last_updated, store.metadata().last_updated);
    }

    #[test]
    fn test_backup_is_independent_copy() {
        let (dir, mut store) = store();
        store.set("id1", "note");
        let dest = dir.path().join("backups").join("notes-backup.json");
        store.backup(&dest).unwrap();

        let copy: Snapshot = serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(copy.transaction_notes["id1"], "note");
        assert!(copy.metadata.backup_created.is_some());
        assert!(store.metadata().backup_created.is_none());

        store.set("id1", "");
        let copy: Snapshot = serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(copy.transaction_notes["id1"], "note");
    }

    #[test]
    fn test_set_many_and_clear_all() {
        let (_dir, mut store) = store();
        let results = store.set_many([("a", "one"), ("b", "two"), ("c", " ")]);
        assert!(results.values().all(|ok| *ok));
        assert_eq!(store.notes().len(), 2);
        assert!(store.clear_all());
        assert!(store.notes().is_empty());
        assert!(on_disk(&store).transaction_notes.is_empty());
    }

    #[test]
    fn test_merge_attaches_notes() {
        let (_dir, mut store) = store();
        store.set("id1", "reimbursable");
        let txn = |id: &str| Transaction {
            id: id.to_string(),
            date: None,
            amount: None,
            category_raw: None,
            category_normalized: "other".to_string(),
            description: String::new(),
            bank: "chase".to_string(),
            source_file: "a.csv".to_string(),
            note: String::new(),
        };
        let mut txns = vec![txn("id1"), txn("id2")];
        store.merge(&mut txns);
        assert_eq!(txns[0].note, "reimbursable");
        assert_eq!(txns[1].note, "");
    }
}
