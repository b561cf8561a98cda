//! Run command - extract light curves from a tile directory.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use lcpipe::checkpoint::LockConfig;
use lcpipe::extract::ExtractionConfig;
use lcpipe::lightcurve::Band;
use lcpipe::logging::{init_logging, run_log_file};
use lcpipe::pipeline::{JobConfig, PipelineOrchestrator};
use lcpipe::survey::{EnumerationMode, Shard, DEFAULT_TILE_PATTERN};

use crate::error::CliError;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Directory containing the survey tile files
    #[arg(long)]
    pub input_dir: PathBuf,

    /// Output directory for light curves, checkpoints and logs
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Number of extraction worker threads
    #[arg(long, default_value_t = 32)]
    pub workers: usize,

    /// Reference-band detection count must strictly exceed this
    #[arg(long, default_value_t = 20)]
    pub min_detections: u32,

    /// Band used as the quality gate (Ks, Z, Y, J, H)
    #[arg(long, default_value = "Ks")]
    pub reference_band: Band,

    /// Filename pattern tile files are matched against
    #[arg(long, default_value = DEFAULT_TILE_PATTERN)]
    pub tile_pattern: String,

    /// Dispatch only the tiles currently in the failed set
    #[arg(long)]
    pub retry_failed: bool,

    /// Process only this shard of the sorted tile list (0-based)
    #[arg(long, requires = "total_shards")]
    pub shard: Option<u32>,

    /// Total number of shards the tile list is divided into
    #[arg(long, requires = "shard")]
    pub total_shards: Option<u32>,

    /// Per-tile record write failures tolerated before the tile fails
    #[arg(long, default_value_t = 0)]
    pub max_write_failures: u64,

    /// Seconds to keep retrying checkpoint lock acquisition
    #[arg(long, default_value_t = 30)]
    pub lock_timeout_secs: u64,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let shard = match (args.shard, args.total_shards) {
        (Some(index), Some(total)) => {
            Some(Shard::new(index, total).map_err(|e| CliError::Usage(e.to_string()))?)
        }
        (None, None) => None,
        // clap's `requires` rejects these, but don't rely on it.
        _ => {
            return Err(CliError::Usage(
                "--shard and --total-shards must be given together".to_string(),
            ))
        }
    };

    let mode = if args.retry_failed {
        EnumerationMode::RetryFailed
    } else {
        EnumerationMode::Normal
    };

    let config = JobConfig::new(&args.input_dir, &args.output_dir)
        .with_workers(args.workers)
        .with_mode(mode)
        .with_tile_pattern(&args.tile_pattern)
        .with_shard(shard)
        .with_extraction(
            ExtractionConfig::default()
                .with_reference_band(args.reference_band)
                .with_min_detections(args.min_detections)
                .with_max_write_failures(args.max_write_failures),
        )
        .with_lock(
            LockConfig::default()
                .with_timeout(std::time::Duration::from_secs(args.lock_timeout_secs)),
        );

    let log_file = run_log_file(args.shard);
    let _logging_guard = init_logging(&config.log_dir(), &log_file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    info!(version = lcpipe::VERSION, log_file = %log_file, "lcpipe run");

    let orchestrator = PipelineOrchestrator::new(config)?;
    let summary = orchestrator.run()?;

    if summary.tiles_failed > 0 {
        return Err(CliError::TilesFailed {
            failed: summary.tiles_failed,
        });
    }
    Ok(())
}
