//! Progress blob storage.
//!
//! [`UserProgress`] is stored as one JSON blob. [`load_progress`] and
//! [`save_progress`] never fail: a missing or corrupt blob loads as the
//! default progress, and write failures are logged and dropped.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use crate::drill_engine::models::UserProgress;

/// Storage key of the progress blob; also the default file stem.
pub const STORAGE_KEY: &str = "calcstages_progress_v2";

/// Key-value blob store holding the single progress record.
pub trait ProgressStore {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> io::Result<Option<String>>;
    fn write(&mut self, blob: &str) -> io::Result<()>;
    fn clear(&mut self) -> io::Result<()>;
}

/// JSON file on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for FileStore {
    fn read(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, blob: &str) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(blob.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-process store for tests and hosts without a filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self { blob: Some(blob.into()) }
    }

    pub fn blob(&self) -> Option<&str> {
        self.blob.as_deref()
    }
}

impl ProgressStore for MemoryStore {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(self.blob.clone())
    }

    fn write(&mut self, blob: &str) -> io::Result<()> {
        self.blob = Some(blob.to_string());
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.blob = None;
        Ok(())
    }
}

/// Read the stored progress, falling back to [`UserProgress::default`].
pub fn load_progress<S: ProgressStore + ?Sized>(store: &S) -> UserProgress {
    match store.read() {
        Ok(Some(blob)) => match serde_json::from_str(&blob) {
            Ok(progress) => progress,
            Err(e) => {
                error!(target: "persistence", error = %e, "Stored progress is corrupt; using defaults.");
                UserProgress::default()
            }
        },
        Ok(None) => {
            debug!(target: "persistence", "No stored progress; using defaults.");
            UserProgress::default()
        }
        Err(e) => {
            error!(target: "persistence", error = %e, "Failed to read stored progress; using defaults.");
            UserProgress::default()
        }
    }
}

/// Write `progress` in full. Failures are logged, never returned.
pub fn save_progress<S: ProgressStore + ?Sized>(store: &mut S, progress: &UserProgress) {
    let blob = match serde_json::to_string(progress) {
        Ok(blob) => blob,
        Err(e) => {
            error!(target: "persistence", error = %e, "Failed to serialise progress.");
            return;
        }
    };
    if let Err(e) = store.write(&blob) {
        error!(target: "persistence", error = %e, "Failed to save progress.");
    }
}

/// Drop the stored blob. Failures are logged.
pub fn clear_progress<S: ProgressStore + ?Sized>(store: &mut S) {
    if let Err(e) = store.clear() {
        warn!(target: "persistence", error = %e, "Failed to clear stored progress.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill_engine::models::{StageProgress, DEFAULT_STAGE_ID};

    fn sample() -> UserProgress {
        let mut p = UserProgress { last_played_at: 42, ..UserProgress::default() };
        p.stage_progress_map.insert("A".into(), StageProgress::unlocked("A"));
        p
    }

    #[test]
    fn corrupt_blob_falls_back_to_default() {
        let store = MemoryStore::with_blob("{not json");
        let p = load_progress(&store);
        assert_eq!(p.current_stage_id, DEFAULT_STAGE_ID);
        assert!(p.stage_progress_map.is_empty());
    }

    #[test]
    fn memory_store_keeps_what_was_saved() {
        let mut store = MemoryStore::new();
        save_progress(&mut store, &sample());
        assert_eq!(load_progress(&store), sample());
        clear_progress(&mut store);
        assert!(store.blob().is_none());
    }

    #[test]
    fn file_store_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join(format!("{STORAGE_KEY}.json")));
        assert!(store.read().unwrap().is_none());
        save_progress(&mut store, &sample());
        assert_eq!(load_progress(&store), sample());
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn unwritable_location_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("missing").join("progress.json"));
        save_progress(&mut store, &sample());
        assert!(store.read().unwrap().is_none());
    }
}
