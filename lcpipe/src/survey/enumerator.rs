//! Tile discovery and pending-set computation.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::warn;

use crate::checkpoint::CheckpointState;

use super::Tile;

/// Default filename pattern for tile containers.
pub const DEFAULT_TILE_PATTERN: &str = "n*_*.hdf5";

/// Errors that can occur while listing the input collection.
///
/// All of these are fatal: a job that cannot enumerate its input has nothing
/// to checkpoint against.
#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    #[error("cannot list input directory {path}: {message}")]
    Unlistable { path: PathBuf, message: String },
    #[error("invalid tile pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("no tiles matching '{pattern}' under {path}")]
    NoTiles { path: PathBuf, pattern: String },
    #[error("shard index {index} out of range for {total} shards")]
    ShardOutOfRange { index: u32, total: u32 },
}

/// Which tiles a run should dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumerationMode {
    /// All discoverable tiles minus the completed set. Tiles already marked
    /// failed are pending again so they get a fresh attempt.
    #[default]
    Normal,
    /// Exactly the tiles in the failed set, ignoring the rest.
    RetryFailed,
}

/// A deterministic 1-of-M slice of the sorted tile list.
///
/// Lets M independent job submissions divide the input without coordination:
/// shard K takes every M-th tile starting at index K. All shards share one
/// checkpoint store safely via the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    index: u32,
    total: u32,
}

impl Shard {
    /// Create a shard slice, validating `index < total`.
    pub fn new(index: u32, total: u32) -> Result<Self, EnumerationError> {
        if total == 0 || index >= total {
            return Err(EnumerationError::ShardOutOfRange { index, total });
        }
        Ok(Self { index, total })
    }

    /// Shard index (0-based).
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Total number of shards.
    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Discovers the set of tiles to process from the input collection.
///
/// Enumeration order is lexicographic by tile id so progress is
/// human-inspectable and reruns dispatch in a deterministic order.
#[derive(Debug, Clone)]
pub struct TileEnumerator {
    input_dir: PathBuf,
    pattern: String,
    shard: Option<Shard>,
}

impl TileEnumerator {
    /// Create an enumerator over the given input directory with the default
    /// tile pattern and no sharding.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            pattern: DEFAULT_TILE_PATTERN.to_string(),
            shard: None,
        }
    }

    /// Set the filename pattern tiles are matched against.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Restrict enumeration to one shard of the sorted tile list.
    pub fn with_shard(mut self, shard: Option<Shard>) -> Self {
        self.shard = shard;
        self
    }

    /// Discover the tiles for this job, sorted by id and shard-sliced.
    ///
    /// Zero discoverable tiles is an error: it almost always means a wrong
    /// input directory or pattern, and silently exiting "complete" would be
    /// indistinguishable from a finished run.
    pub fn discover(&self) -> Result<Discovery, EnumerationError> {
        // glob returns empty for a missing directory, so check listability
        // explicitly to distinguish "no matches" from "cannot read input".
        std::fs::read_dir(&self.input_dir).map_err(|e| EnumerationError::Unlistable {
            path: self.input_dir.clone(),
            message: e.to_string(),
        })?;

        let pattern = self.input_dir.join(&self.pattern);
        let pattern_str = pattern.to_string_lossy();
        let paths = glob::glob(&pattern_str).map_err(|e| EnumerationError::Pattern {
            pattern: self.pattern.clone(),
            message: e.to_string(),
        })?;

        let mut tiles = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| EnumerationError::Unlistable {
                path: self.input_dir.clone(),
                message: e.to_string(),
            })?;
            if let Some(tile) = Tile::from_path(path) {
                tiles.push(tile);
            }
        }
        tiles.sort_by(|a, b| a.id().cmp(b.id()));

        if tiles.is_empty() {
            return Err(EnumerationError::NoTiles {
                path: self.input_dir.clone(),
                pattern: self.pattern.clone(),
            });
        }

        let total_in_dataset = tiles.len();
        if let Some(shard) = self.shard {
            tiles = tiles
                .into_iter()
                .enumerate()
                .filter(|(i, _)| (*i as u32) % shard.total == shard.index)
                .map(|(_, t)| t)
                .collect();
        }

        Ok(Discovery {
            tiles,
            total_in_dataset,
        })
    }

    /// Filter discovered tiles down to the pending set for a run.
    ///
    /// In [`EnumerationMode::Normal`], completed tiles are skipped and failed
    /// tiles get a fresh attempt. In [`EnumerationMode::RetryFailed`], only
    /// tiles currently in the failed set are dispatched.
    pub fn select_pending(
        &self,
        tiles: Vec<Tile>,
        mode: EnumerationMode,
        state: &CheckpointState,
    ) -> Vec<Tile> {
        match mode {
            EnumerationMode::Normal => tiles
                .into_iter()
                .filter(|t| !state.is_completed(t.id()))
                .collect(),
            EnumerationMode::RetryFailed => {
                let discovered: BTreeSet<&str> = tiles.iter().map(|t| t.id()).collect();
                for id in state.failed_ids() {
                    if !discovered.contains(id.as_str()) {
                        warn!(tile = %id, "failed tile has no backing file, skipping retry");
                    }
                }
                tiles
                    .into_iter()
                    .filter(|t| state.is_failed(t.id()))
                    .collect()
            }
        }
    }

    /// Discover and filter in one step.
    pub fn list_pending(
        &self,
        mode: EnumerationMode,
        state: &CheckpointState,
    ) -> Result<Vec<Tile>, EnumerationError> {
        let discovery = self.discover()?;
        Ok(self.select_pending(discovery.tiles, mode, state))
    }
}

/// Result of tile discovery: this job's (possibly shard-sliced) tiles plus
/// the size of the whole dataset, which progress rollups are measured
/// against.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub tiles: Vec<Tile>,
    pub total_in_dataset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_tiles(dir: &std::path::Path, ids: &[&str]) {
        for id in ids {
            fs::write(dir.join(format!("{}.hdf5", id)), "stub").unwrap();
        }
    }

    #[test]
    fn test_discovery_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        make_tiles(dir.path(), &["n512_3", "n512_1", "n511_9"]);

        let discovery = TileEnumerator::new(dir.path()).discover().unwrap();
        let ids: Vec<&str> = discovery.tiles.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["n511_9", "n512_1", "n512_3"]);
        assert_eq!(discovery.total_in_dataset, 3);
    }

    #[test]
    fn test_pattern_filters_files() {
        let dir = tempfile::tempdir().unwrap();
        make_tiles(dir.path(), &["n512_1"]);
        fs::write(dir.path().join("notes.txt"), "not a tile").unwrap();

        let discovery = TileEnumerator::new(dir.path()).discover().unwrap();
        assert_eq!(discovery.tiles.len(), 1);
        assert_eq!(discovery.tiles[0].id(), "n512_1");
    }

    #[test]
    fn test_missing_input_dir_is_unlistable() {
        let err = TileEnumerator::new("/nonexistent/tiles")
            .discover()
            .unwrap_err();
        assert!(matches!(err, EnumerationError::Unlistable { .. }));
    }

    #[test]
    fn test_empty_input_is_no_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let err = TileEnumerator::new(dir.path()).discover().unwrap_err();
        assert!(matches!(err, EnumerationError::NoTiles { .. }));
    }

    #[test]
    fn test_shard_slicing_partitions_sorted_list() {
        let dir = tempfile::tempdir().unwrap();
        make_tiles(dir.path(), &["n1_0", "n1_1", "n1_2", "n1_3", "n1_4"]);

        let shard0 = TileEnumerator::new(dir.path())
            .with_shard(Some(Shard::new(0, 2).unwrap()))
            .discover()
            .unwrap();
        let shard1 = TileEnumerator::new(dir.path())
            .with_shard(Some(Shard::new(1, 2).unwrap()))
            .discover()
            .unwrap();

        let ids0: Vec<&str> = shard0.tiles.iter().map(|t| t.id()).collect();
        let ids1: Vec<&str> = shard1.tiles.iter().map(|t| t.id()).collect();
        assert_eq!(ids0, vec!["n1_0", "n1_2", "n1_4"]);
        assert_eq!(ids1, vec!["n1_1", "n1_3"]);
        assert_eq!(shard0.total_in_dataset, 5);
    }

    #[test]
    fn test_shard_index_validation() {
        assert!(Shard::new(2, 2).is_err());
        assert!(Shard::new(0, 0).is_err());
        assert!(Shard::new(1, 2).is_ok());
    }

    #[test]
    fn test_normal_mode_skips_completed_but_retries_failed() {
        let dir = tempfile::tempdir().unwrap();
        make_tiles(dir.path(), &["n1_0", "n1_1", "n1_2"]);

        let mut state = CheckpointState::default();
        state.add_completed("n1_0", 10, 5);
        state.add_failed("n1_1", "boom");

        let pending = TileEnumerator::new(dir.path())
            .list_pending(EnumerationMode::Normal, &state)
            .unwrap();
        let ids: Vec<&str> = pending.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["n1_1", "n1_2"]);
    }

    #[test]
    fn test_retry_mode_dispatches_exactly_failed_set() {
        let dir = tempfile::tempdir().unwrap();
        make_tiles(dir.path(), &["n1_0", "n1_1", "n1_2"]);

        let mut state = CheckpointState::default();
        state.add_failed("n1_2", "boom");

        let pending = TileEnumerator::new(dir.path())
            .list_pending(EnumerationMode::RetryFailed, &state)
            .unwrap();
        let ids: Vec<&str> = pending.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["n1_2"]);
    }
}
