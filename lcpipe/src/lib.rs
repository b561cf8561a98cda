//! LCPipe - Checkpointed light curve extraction for survey tile archives
//!
//! This library extracts per-source photometric time series from partitioned
//! survey tile files and writes one output record-set per source, resuming
//! safely across interrupted multi-day batch jobs on a shared cluster.
//!
//! The core is a checkpointed, concurrent tile-processing pipeline:
//! tile-level progress and failure state are persisted as a small set of JSON
//! documents guarded by an advisory file lock, so many independent job
//! submissions can share one output directory without corrupting each other's
//! progress, and an interrupted run loses at most the in-flight tiles.
//!
//! # High-Level API
//!
//! ```ignore
//! use lcpipe::pipeline::{JobConfig, PipelineOrchestrator};
//!
//! let config = JobConfig::new("/data/tiles", "/data/lightcurves");
//! let orchestrator = PipelineOrchestrator::new(config)?;
//! let summary = orchestrator.run()?;
//! std::process::exit(if summary.all_succeeded() { 0 } else { 1 });
//! ```

pub mod checkpoint;
pub mod extract;
pub mod lightcurve;
pub mod logging;
pub mod monitor;
pub mod pipeline;
pub mod survey;

/// Version of the lcpipe library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
