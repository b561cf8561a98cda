//! Checkpoint store: locked load-modify-store over the persisted documents.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::lock::{CheckpointLock, LockConfig, LockError};
use super::state::{
    now_timestamp, CheckpointState, CompletedDoc, FailedDoc, FailureRecord, ProgressDoc,
    TileStats, COMPLETED_FILE, FAILED_FILE, LOCK_FILE, PROGRESS_FILE,
};

/// Failure records keep at most this many bytes of the error message.
const MAX_ERROR_BYTES: usize = 500;

/// Errors from checkpoint persistence.
///
/// `Corrupt` is the integrity case: a document exists but cannot be parsed.
/// The job must stop loudly rather than silently proceed with empty state —
/// losing track of completed work is cheap (tiles get redone), but treating
/// demonstrably non-empty state as empty hides the damage.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("corrupt checkpoint document {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("checkpoint io on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Durable record of tile-level completion and failure.
///
/// Every mutation is a full load-modify-store cycle guarded by the lock,
/// never an in-memory shared structure: writers are independent processes
/// (possibly from different job submissions) and the store is their only
/// coordination channel. Writes go to a PID-suffixed temp file then rename
/// over the target, so concurrent writers never see a torn document.
pub struct CheckpointStore {
    dir: PathBuf,
    lock_path: PathBuf,
    lock_config: LockConfig,
}

impl CheckpointStore {
    /// Open (creating if needed) the checkpoint directory.
    pub fn new(dir: impl Into<PathBuf>, lock_config: LockConfig) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CheckpointError::Io {
            path: dir.clone(),
            source: e,
        })?;
        let lock_path = dir.join(LOCK_FILE);
        Ok(Self {
            dir,
            lock_path,
            lock_config,
        })
    }

    /// Directory holding the persisted documents.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a snapshot of the completed and failed sets, under the lock.
    pub fn load(&self) -> Result<CheckpointState, CheckpointError> {
        let _lock = CheckpointLock::acquire(&self.lock_path, self.lock_config)?;
        let completed: CompletedDoc = self.read_doc(COMPLETED_FILE)?;
        let failed: FailedDoc = self.read_doc(FAILED_FILE)?;
        Ok(CheckpointState::from_docs(completed, failed))
    }

    /// Durably mark a tile completed.
    ///
    /// Under the lock: reload the on-disk completed document, add the tile
    /// with its stats, drop it from the failed document if present, and
    /// atomically replace both. Reloading inside the critical section is what
    /// merges updates from concurrently running jobs instead of overwriting
    /// them.
    pub fn mark_completed(
        &self,
        tile_id: &str,
        n_sources: u64,
        n_valid: u64,
    ) -> Result<(), CheckpointError> {
        let _lock = CheckpointLock::acquire(&self.lock_path, self.lock_config)?;

        let mut completed: CompletedDoc = self.read_doc(COMPLETED_FILE)?;
        if !completed.completed.iter().any(|id| id == tile_id) {
            completed.completed.push(tile_id.to_string());
        }
        completed.stats.insert(
            tile_id.to_string(),
            TileStats {
                n_sources,
                n_valid,
                timestamp: now_timestamp(),
            },
        );
        self.write_doc(COMPLETED_FILE, &completed)?;

        let mut failed: FailedDoc = self.read_doc(FAILED_FILE)?;
        if failed.failed.remove(tile_id).is_some() {
            self.write_doc(FAILED_FILE, &failed)?;
            debug!(tile = %tile_id, "cleared previous failure after successful retry");
        }

        Ok(())
    }

    /// Durably record a tile failure with its last error.
    ///
    /// Does not touch the completed document: failure is non-terminal and the
    /// tile stays pending for the next run.
    pub fn mark_failed(&self, tile_id: &str, error: &str) -> Result<(), CheckpointError> {
        let _lock = CheckpointLock::acquire(&self.lock_path, self.lock_config)?;

        let mut failed: FailedDoc = self.read_doc(FAILED_FILE)?;
        failed.failed.insert(
            tile_id.to_string(),
            FailureRecord {
                error: truncate_error(error),
                timestamp: now_timestamp(),
            },
        );
        self.write_doc(FAILED_FILE, &failed)
    }

    /// Recompute and persist the rollup progress counters.
    ///
    /// Rollups are derived from the completed document inside the same locked
    /// cycle, so the progress view stays consistent with completions from all
    /// concurrently running jobs.
    pub fn update_progress(&self, total_tiles: u64) -> Result<ProgressDoc, CheckpointError> {
        let _lock = CheckpointLock::acquire(&self.lock_path, self.lock_config)?;

        let completed: CompletedDoc = self.read_doc(COMPLETED_FILE)?;
        let processed_tiles = completed.completed.len() as u64;
        let total_sources: u64 = completed.stats.values().map(|s| s.n_sources).sum();
        let valid_sources: u64 = completed.stats.values().map(|s| s.n_valid).sum();
        let percent_complete = if total_tiles > 0 {
            round2(processed_tiles as f64 / total_tiles as f64 * 100.0)
        } else {
            0.0
        };

        let progress = ProgressDoc {
            total_tiles,
            processed_tiles,
            total_sources,
            valid_sources,
            last_update: now_timestamp(),
            percent_complete,
        };
        self.write_doc(PROGRESS_FILE, &progress)?;

        info!(
            processed = processed_tiles,
            total = total_tiles,
            percent = percent_complete,
            "checkpoint progress updated"
        );
        Ok(progress)
    }

    /// Read a document, treating a missing file as the empty default and an
    /// unparsable file as [`CheckpointError::Corrupt`].
    fn read_doc<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, CheckpointError> {
        let path = self.dir.join(name);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(CheckpointError::Io { path, source: e }),
        };
        serde_json::from_str(&contents).map_err(|e| CheckpointError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    /// Atomically replace a document: write to a PID-suffixed temp sibling,
    /// then rename over the target.
    fn write_doc<T: Serialize>(&self, name: &str, doc: &T) -> Result<(), CheckpointError> {
        let path = self.dir.join(name);
        let tmp_path = self
            .dir
            .join(format!("{}.tmp.{}", name, std::process::id()));

        let json = serde_json::to_string_pretty(doc).map_err(|e| CheckpointError::Io {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        fs::write(&tmp_path, json).map_err(|e| CheckpointError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| CheckpointError::Io { path, source: e })
    }
}

/// Cap a failure message at 500 bytes, respecting char boundaries.
fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_BYTES {
        return message.to_string();
    }
    let mut end = MAX_ERROR_BYTES;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

/// Round to two decimal places for the human-readable progress view.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn test_store(dir: &Path) -> CheckpointStore {
        CheckpointStore::new(dir.join("checkpoints"), LockConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_store_loads_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let state = store.load().unwrap();
        assert_eq!(state.completed_count(), 0);
        assert!(state.failed_ids().is_empty());
    }

    #[test]
    fn test_mark_completed_persists_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store.mark_completed("n512_3", 1843, 207).unwrap();

        let state = store.load().unwrap();
        assert!(state.is_completed("n512_3"));
        match state.status("n512_3") {
            super::super::TileStatus::Completed(stats) => {
                assert_eq!(stats.n_sources, 1843);
                assert_eq!(stats.n_valid, 207);
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store.mark_completed("n512_3", 100, 10).unwrap();
        store.mark_completed("n512_3", 100, 12).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.completed_count(), 1);
    }

    #[test]
    fn test_mark_failed_then_completed_clears_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store.mark_failed("n512_3", "unreadable tile").unwrap();
        let state = store.load().unwrap();
        assert!(state.is_failed("n512_3"));
        assert!(!state.is_completed("n512_3"));

        store.mark_completed("n512_3", 50, 8).unwrap();
        let state = store.load().unwrap();
        assert!(state.is_completed("n512_3"));
        assert!(!state.is_failed("n512_3"));
    }

    #[test]
    fn test_failure_message_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let long = "x".repeat(2000);
        store.mark_failed("n1_0", &long).unwrap();

        let state = store.load().unwrap();
        match state.status("n1_0") {
            super::super::TileStatus::Failed(record) => {
                assert_eq!(record.error.len(), MAX_ERROR_BYTES);
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_document_is_loud() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        fs::write(store.dir().join(COMPLETED_FILE), "{not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }));
    }

    #[test]
    fn test_progress_rollups_from_completed_doc() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store.mark_completed("a", 100, 10).unwrap();
        store.mark_completed("b", 200, 30).unwrap();
        store.mark_failed("c", "bad").unwrap();

        let progress = store.update_progress(8).unwrap();
        assert_eq!(progress.processed_tiles, 2);
        assert_eq!(progress.total_sources, 300);
        assert_eq!(progress.valid_sources, 40);
        assert_eq!(progress.percent_complete, 25.0);
    }

    #[test]
    fn test_failed_tile_does_not_count_as_processed() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        store.mark_failed("c", "unreadable").unwrap();
        let progress = store.update_progress(4).unwrap();
        assert_eq!(progress.processed_tiles, 0);
        assert_eq!(progress.total_sources, 0);
    }

    #[test]
    fn test_concurrent_mutators_lose_no_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(test_store(dir.path()));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for i in 0..5 {
                    let id = format!("n{}_{}", worker, i);
                    store.mark_completed(&id, 10, 2).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Final on-disk completed set must equal the union of all updates.
        let state = store.load().unwrap();
        assert_eq!(state.completed_count(), 40);
        for worker in 0..8 {
            for i in 0..5 {
                assert!(state.is_completed(&format!("n{}_{}", worker, i)));
            }
        }
    }
}
