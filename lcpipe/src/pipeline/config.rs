//! Job-level configuration.

use std::path::PathBuf;

use crate::checkpoint::LockConfig;
use crate::extract::ExtractionConfig;
use crate::survey::{EnumerationMode, Shard, DEFAULT_TILE_PATTERN};

/// Configuration for one extraction job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Directory holding tile containers
    pub input_dir: PathBuf,
    /// Directory for output artifacts, checkpoints and logs
    pub output_dir: PathBuf,
    /// Bounded worker pool size (default: 32)
    pub workers: usize,
    /// Normal or retry-failed dispatch
    pub mode: EnumerationMode,
    /// Filename pattern tiles are matched against
    pub tile_pattern: String,
    /// Optional 1-of-M slice of the sorted tile list
    pub shard: Option<Shard>,
    /// Per-tile extraction tunables
    pub extraction: ExtractionConfig,
    /// Checkpoint lock timing
    pub lock: LockConfig,
    /// Refresh the progress document every this many settled tiles
    pub progress_interval: usize,
}

impl JobConfig {
    /// Create a configuration with the defaults the survey batch jobs use.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            workers: 32,
            mode: EnumerationMode::Normal,
            tile_pattern: DEFAULT_TILE_PATTERN.to_string(),
            shard: None,
            extraction: ExtractionConfig::default(),
            lock: LockConfig::default(),
            progress_interval: 10,
        }
    }

    /// Set the worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the dispatch mode.
    pub fn with_mode(mut self, mode: EnumerationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the tile filename pattern.
    pub fn with_tile_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.tile_pattern = pattern.into();
        self
    }

    /// Restrict this job to one shard of the tile list.
    pub fn with_shard(mut self, shard: Option<Shard>) -> Self {
        self.shard = shard;
        self
    }

    /// Set the extraction tunables.
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    /// Set the checkpoint lock timing.
    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    /// Checkpoint documents live alongside the output artifacts.
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.output_dir.join("checkpoints")
    }

    /// Run logs live alongside the output artifacts.
    pub fn log_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }
}
