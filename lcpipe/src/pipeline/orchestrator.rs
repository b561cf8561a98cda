//! Worker pool orchestrator: the job state machine.
//!
//! Init loads the checkpoint and computes the pending tile list; Dispatching
//! feeds the bounded pool; each completion is applied to the checkpoint
//! store *before* the tile is considered settled. That ordering is the
//! resumability contract: a tile's completion is durable only once the
//! checkpoint write lands, so a crash between worker-return and
//! checkpoint-write is indistinguishable from never having run and the tile
//! is safely redone on resume.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::extract::{
    CsvRecordWriter, DelimitedTileReader, ExtractionWorker, RecordWriter, TileReader,
};
use crate::survey::{EnumerationError, TileEnumerator};

use super::config::JobConfig;
use super::pool::WorkerPool;

/// Fatal pipeline errors.
///
/// Per-tile errors never reach this type; they are recorded in the failed
/// set and the job continues. Only integrity-threatening conditions abort
/// the job: a corrupt checkpoint, a lock that stayed contended through the
/// full acquisition timeout during a mandatory update, or an input
/// collection that cannot be enumerated.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Final accounting for one job invocation.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Tiles in this job's slice of the dataset
    pub tiles_total: usize,
    /// Tiles skipped because a previous run completed them
    pub tiles_skipped: usize,
    /// Tiles completed by this run
    pub tiles_processed: usize,
    /// Tiles that ended in the failed set this run
    pub tiles_failed: usize,
    /// Sources seen across tiles completed this run
    pub total_sources: u64,
    /// Sources with output written across tiles completed this run
    pub valid_sources: u64,
    /// Wall time for the run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether the process should exit zero.
    pub fn all_succeeded(&self) -> bool {
        self.tiles_failed == 0
    }

    /// Throughput for the final summary line.
    pub fn tiles_per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.tiles_processed as f64 / minutes
        } else {
            0.0
        }
    }
}

/// Drives one extraction job from enumeration to the final summary.
pub struct PipelineOrchestrator {
    config: JobConfig,
    store: CheckpointStore,
    worker: Arc<ExtractionWorker>,
}

impl PipelineOrchestrator {
    /// Build an orchestrator with the default collaborators: the
    /// delimited-text tile reader and the hierarchical CSV writer rooted at
    /// the output directory.
    pub fn new(config: JobConfig) -> Result<Self, PipelineError> {
        let reader = Arc::new(DelimitedTileReader::new());
        let writer = Arc::new(CsvRecordWriter::new(&config.output_dir));
        Self::with_collaborators(config, reader, writer)
    }

    /// Build an orchestrator with custom reader/writer collaborators.
    pub fn with_collaborators(
        config: JobConfig,
        reader: Arc<dyn TileReader>,
        writer: Arc<dyn RecordWriter>,
    ) -> Result<Self, PipelineError> {
        fs::create_dir_all(&config.output_dir).map_err(|e| PipelineError::OutputDir {
            path: config.output_dir.clone(),
            source: e,
        })?;
        let store = CheckpointStore::new(config.checkpoint_dir(), config.lock)?;
        let worker = Arc::new(ExtractionWorker::new(reader, writer, config.extraction));
        Ok(Self {
            config,
            store,
            worker,
        })
    }

    /// The checkpoint store this job coordinates through.
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run the job to completion.
    ///
    /// Returns the summary; the caller decides exit status from
    /// [`RunSummary::all_succeeded`].
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();

        let state = self.store.load()?;
        let enumerator = TileEnumerator::new(&self.config.input_dir)
            .with_pattern(&self.config.tile_pattern)
            .with_shard(self.config.shard);
        let discovery = enumerator.discover()?;
        let tiles_total = discovery.tiles.len();
        let total_in_dataset = discovery.total_in_dataset as u64;
        let pending = enumerator.select_pending(discovery.tiles, self.config.mode, &state);
        let tiles_skipped = tiles_total - pending.len();

        info!(
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            workers = self.config.workers,
            min_detections = self.config.extraction.min_detections,
            reference_band = %self.config.extraction.reference_band,
            "starting extraction job"
        );
        if let Some(shard) = self.config.shard {
            info!(
                shard = shard.index(),
                total_shards = shard.total(),
                "sharded run"
            );
        }
        info!(
            dataset_tiles = total_in_dataset,
            job_tiles = tiles_total,
            already_completed = tiles_skipped,
            to_process = pending.len(),
            "tile enumeration complete"
        );

        if pending.is_empty() {
            info!("nothing to process, all tiles for this job already settled");
            return Ok(RunSummary {
                tiles_total,
                tiles_skipped,
                elapsed: start.elapsed(),
                ..RunSummary::default()
            });
        }

        let mut pool = WorkerPool::new(Arc::clone(&self.worker), self.config.workers);
        let to_process = pending.len();
        for tile in pending {
            pool.submit(tile);
        }
        pool.close();

        let mut summary = RunSummary {
            tiles_total,
            tiles_skipped,
            ..RunSummary::default()
        };
        let mut settled = 0usize;
        let progress_interval = self.config.progress_interval.max(1);

        // Completions arrive in any order; each one is settled only after
        // its checkpoint update lands. A lock timeout here already survived
        // the full in-lock retry window, so it is treated as fatal rather
        // than risking silent progress loss.
        for outcome in pool.outcomes().iter() {
            settled += 1;
            match outcome.result {
                Ok(counts) => {
                    self.store
                        .mark_completed(&outcome.tile_id, counts.n_sources, counts.n_valid)?;
                    summary.tiles_processed += 1;
                    summary.total_sources += counts.n_sources;
                    summary.valid_sources += counts.n_valid;
                    info!(
                        tile = %outcome.tile_id,
                        progress = format!("{}/{}", settled, to_process),
                        valid = counts.n_valid,
                        sources = counts.n_sources,
                        "tile completed"
                    );
                }
                Err(ref failure) => {
                    self.store.mark_failed(&outcome.tile_id, &failure.to_string())?;
                    summary.tiles_failed += 1;
                    warn!(
                        tile = %outcome.tile_id,
                        progress = format!("{}/{}", settled, to_process),
                        error = %failure,
                        "tile failed"
                    );
                }
            }

            if settled % progress_interval == 0 {
                self.store.update_progress(total_in_dataset)?;
            }
        }

        self.store.update_progress(total_in_dataset)?;
        summary.elapsed = start.elapsed();

        info!(
            processed = summary.tiles_processed,
            failed = summary.tiles_failed,
            skipped = summary.tiles_skipped,
            sources = summary.total_sources,
            valid = summary.valid_sources,
            elapsed_secs = summary.elapsed.as_secs(),
            tiles_per_minute = format!("{:.1}", summary.tiles_per_minute()),
            "extraction job finished"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_exit_decision() {
        let ok = RunSummary {
            tiles_processed: 3,
            ..RunSummary::default()
        };
        assert!(ok.all_succeeded());

        let bad = RunSummary {
            tiles_failed: 1,
            ..RunSummary::default()
        };
        assert!(!bad.all_succeeded());
    }

    #[test]
    fn test_tiles_per_minute() {
        let summary = RunSummary {
            tiles_processed: 30,
            elapsed: Duration::from_secs(60),
            ..RunSummary::default()
        };
        assert!((summary.tiles_per_minute() - 30.0).abs() < 1e-9);
    }
}
