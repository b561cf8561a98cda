//! Persisted checkpoint documents and in-process snapshot.
//!
//! Three JSON documents, mirrored by the serde models here:
//!
//! ```text
//! completed_tiles.json  {"completed": ["n512_3", ...],
//!                        "stats": {"n512_3": {"n_sources": 1843,
//!                                             "n_valid": 207,
//!                                             "timestamp": "..."}}}
//! failed_tiles.json     {"failed": {"n512_9": {"error": "...",
//!                                              "timestamp": "..."}}}
//! progress.json         {"total_tiles": 22585, "processed_tiles": 104, ...}
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Completed-tiles document filename.
pub const COMPLETED_FILE: &str = "completed_tiles.json";
/// Failed-tiles document filename.
pub const FAILED_FILE: &str = "failed_tiles.json";
/// Progress rollup document filename.
pub const PROGRESS_FILE: &str = "progress.json";
/// Lock token filename, alongside the documents.
pub const LOCK_FILE: &str = ".checkpoint.lock";

/// Per-tile completion stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileStats {
    /// Sources seen in the tile
    pub n_sources: u64,
    /// Sources passing the quality filter with output written
    pub n_valid: u64,
    /// Completion time (RFC 3339)
    pub timestamp: String,
}

/// Last recorded failure for a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Classified error message, truncated to 500 bytes
    pub error: String,
    /// Failure time (RFC 3339)
    pub timestamp: String,
}

/// On-disk shape of `completed_tiles.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletedDoc {
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub stats: HashMap<String, TileStats>,
}

/// On-disk shape of `failed_tiles.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailedDoc {
    #[serde(default)]
    pub failed: BTreeMap<String, FailureRecord>,
}

/// On-disk shape of `progress.json`: rollup counters recomputed from the
/// completed document on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressDoc {
    pub total_tiles: u64,
    pub processed_tiles: u64,
    pub total_sources: u64,
    pub valid_sources: u64,
    pub last_update: String,
    pub percent_complete: f64,
}

/// Resumability status of one tile, derived from the snapshot.
///
/// Failure is a non-terminal tag: a failed tile is re-enumerated as pending
/// on the next normal run.
#[derive(Debug, Clone, PartialEq)]
pub enum TileStatus {
    Pending,
    Completed(TileStats),
    Failed(FailureRecord),
}

/// In-process snapshot of the checkpoint, loaded once at job start.
///
/// A running job is not required to observe other jobs' mid-run updates;
/// redundant processing of a tile by two jobs is benign because output is
/// idempotent.
#[derive(Debug, Clone, Default)]
pub struct CheckpointState {
    completed: HashSet<String>,
    stats: HashMap<String, TileStats>,
    failed: BTreeMap<String, FailureRecord>,
}

impl CheckpointState {
    /// Assemble a snapshot from the two loaded documents.
    pub fn from_docs(completed: CompletedDoc, failed: FailedDoc) -> Self {
        Self {
            completed: completed.completed.into_iter().collect(),
            stats: completed.stats,
            failed: failed.failed,
        }
    }

    /// Whether the tile has durably completed.
    pub fn is_completed(&self, tile_id: &str) -> bool {
        self.completed.contains(tile_id)
    }

    /// Whether the tile's last attempt failed.
    pub fn is_failed(&self, tile_id: &str) -> bool {
        self.failed.contains_key(tile_id)
    }

    /// Tile ids currently in the failed set, sorted.
    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.keys().cloned().collect()
    }

    /// Number of completed tiles.
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Derived status tag for a tile.
    pub fn status(&self, tile_id: &str) -> TileStatus {
        if let Some(stats) = self.stats.get(tile_id).filter(|_| self.is_completed(tile_id)) {
            TileStatus::Completed(stats.clone())
        } else if let Some(record) = self.failed.get(tile_id) {
            TileStatus::Failed(record.clone())
        } else {
            TileStatus::Pending
        }
    }

    /// Record a completion in this snapshot (the durable write is the
    /// store's job).
    pub fn add_completed(&mut self, tile_id: &str, n_sources: u64, n_valid: u64) {
        self.completed.insert(tile_id.to_string());
        self.stats.insert(
            tile_id.to_string(),
            TileStats {
                n_sources,
                n_valid,
                timestamp: now_timestamp(),
            },
        );
        self.failed.remove(tile_id);
    }

    /// Record a failure in this snapshot.
    pub fn add_failed(&mut self, tile_id: &str, error: &str) {
        self.failed.insert(
            tile_id.to_string(),
            FailureRecord {
                error: error.to_string(),
                timestamp: now_timestamp(),
            },
        );
    }
}

/// Current time in the format used across all checkpoint documents.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
