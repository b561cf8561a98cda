//! Per-tile extraction worker.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::lightcurve::{Band, Observation, QualityFilter, SourceRecord};
use crate::survey::Tile;

use super::reader::{RawDetection, TileReader};
use super::writer::{RecordWriter, WriteOutcome};

/// Tunables for per-tile extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionConfig {
    /// Band used as the quality gate (default: Ks)
    pub reference_band: Band,
    /// Detection count must strictly exceed this (default: 20)
    pub min_detections: u32,
    /// Record write failures tolerated before the tile fails
    /// (default: 0, any failure escalates)
    pub max_write_failures: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            reference_band: Band::Ks,
            min_detections: 20,
            max_write_failures: 0,
        }
    }
}

impl ExtractionConfig {
    /// Set the reference band for the quality gate.
    pub fn with_reference_band(mut self, band: Band) -> Self {
        self.reference_band = band;
        self
    }

    /// Set the minimum detection count (strict bound).
    pub fn with_min_detections(mut self, min: u32) -> Self {
        self.min_detections = min;
        self
    }

    /// Set how many per-source write failures a tile tolerates.
    pub fn with_max_write_failures(mut self, max: u64) -> Self {
        self.max_write_failures = max;
        self
    }
}

/// Success counts for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileCounts {
    /// Sources seen in the tile
    pub n_sources: u64,
    /// Accepted sources with output durably present
    pub n_valid: u64,
}

/// Why a tile failed.
///
/// These never unwind past the orchestrator; they become failed-set entries
/// in the checkpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TileFailure {
    #[error("{0}")]
    Unreadable(String),
    #[error("{failed} record write failures (first: {first})")]
    WriteFailures { failed: u64, first: String },
    #[error("SILENT_FAIL: {candidates} candidates but 0 saved")]
    NothingWritten { candidates: u64 },
}

/// Outcome of one tile attempt: a typed tagged value, never an unwound error.
#[derive(Debug, Clone)]
pub struct TileOutcome {
    pub tile_id: String,
    pub result: Result<TileCounts, TileFailure>,
}

/// Processes one tile end to end: read, group, filter, write.
pub struct ExtractionWorker {
    reader: Arc<dyn TileReader>,
    writer: Arc<dyn RecordWriter>,
    filter: QualityFilter,
    config: ExtractionConfig,
}

impl ExtractionWorker {
    pub fn new(
        reader: Arc<dyn TileReader>,
        writer: Arc<dyn RecordWriter>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            filter: QualityFilter::new(config.reference_band, config.min_detections),
            config,
        }
    }

    /// Process one tile.
    ///
    /// Read errors fail the tile as unreadable. Per-source write failures are
    /// logged and counted; the tile fails once they exceed the configured
    /// threshold, or when at least one source was accepted but nothing could
    /// be written at all (systemic breakage, e.g. disk full). Sources whose
    /// artifact already exists count as valid without rewriting, which is
    /// what makes redone tiles idempotent.
    pub fn process(&self, tile: &Tile) -> TileOutcome {
        let outcome = |result| TileOutcome {
            tile_id: tile.id().to_string(),
            result,
        };

        let rows = match self.reader.read(tile) {
            Ok(rows) => rows,
            Err(e) => {
                return outcome(Err(TileFailure::Unreadable(e.to_string())));
            }
        };

        let sources = group_by_source(rows);
        let n_sources = sources.len() as u64;

        let mut accepted: u64 = 0;
        let mut saved: u64 = 0;
        let mut write_failures: u64 = 0;
        let mut first_write_error: Option<String> = None;

        for (source_id, observations) in sources {
            let record = SourceRecord::new(source_id, observations);
            if !self.filter.accepts(&record) {
                continue;
            }
            accepted += 1;

            match self.writer.write(&record) {
                Ok(WriteOutcome::Written) => saved += 1,
                Ok(WriteOutcome::AlreadyPresent) => {
                    debug!(tile = %tile.id(), source = source_id, "output already present, skipping");
                    saved += 1;
                }
                Err(e) => {
                    warn!(tile = %tile.id(), source = source_id, error = %e, "record write failed");
                    write_failures += 1;
                    if first_write_error.is_none() {
                        first_write_error = Some(e.to_string());
                    }
                    if write_failures > self.config.max_write_failures {
                        return outcome(Err(TileFailure::WriteFailures {
                            failed: write_failures,
                            first: first_write_error.unwrap_or_default(),
                        }));
                    }
                }
            }
        }

        // A tile with candidates but zero saved output means writing is
        // systemically broken regardless of the tolerance threshold.
        if accepted > 0 && saved == 0 {
            return outcome(Err(TileFailure::NothingWritten {
                candidates: accepted,
            }));
        }

        outcome(Ok(TileCounts {
            n_sources,
            n_valid: saved,
        }))
    }
}

/// Group raw rows into per-source observation lists, keyed by source id.
fn group_by_source(rows: Vec<RawDetection>) -> BTreeMap<u64, Vec<Observation>> {
    let mut sources: BTreeMap<u64, Vec<Observation>> = BTreeMap::new();
    for row in rows {
        sources.entry(row.source_id).or_default().push(Observation {
            mjd: row.mjd,
            band: row.band,
            mag: row.mag,
            err: row.err,
            seeing: row.seeing,
            exptime: row.exptime,
            skylevel: row.skylevel,
            ellipticity: row.ellipticity,
            chi: row.chi,
            ast_res_chisq: row.ast_res_chisq,
            detected: row.detected,
        });
    }
    sources
}
