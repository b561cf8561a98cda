//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use lcpipe::checkpoint::{CheckpointError, LockError};
use lcpipe::pipeline::PipelineError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid argument combination
    Usage(String),
    /// Fatal pipeline error (checkpoint, lock, enumeration)
    Pipeline(PipelineError),
    /// The job finished but some tiles ended in the failed set
    TilesFailed { failed: usize },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Pipeline(PipelineError::Checkpoint(CheckpointError::Corrupt {
                path, ..
            })) => {
                eprintln!();
                eprintln!("The checkpoint document could not be parsed. To avoid losing");
                eprintln!("progress, nothing was reset. Inspect it manually:");
                eprintln!("  cat {}", path.display());
                eprintln!("Restore it from a valid copy, or delete it to start that");
                eprintln!("document over (completed tiles recorded only there are redone).");
            }
            CliError::Pipeline(PipelineError::Checkpoint(CheckpointError::Lock(
                LockError::Timeout { path, .. },
            ))) => {
                eprintln!();
                eprintln!("Could not acquire the checkpoint lock. Usually another job is");
                eprintln!("updating the checkpoint; rerun once it finishes. If no other");
                eprintln!("job is running, a crashed process may have left the token:");
                eprintln!("  ls -l {}", path.display());
                eprintln!("and remove it only after confirming nothing holds it (fuser).");
            }
            CliError::TilesFailed { .. } => {
                eprintln!();
                eprintln!("Failed tiles are recorded in the checkpoint and stay pending.");
                eprintln!("Rerun the same command to retry them along with remaining");
                eprintln!("tiles, or use --retry-failed to dispatch only the failed set.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Usage(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::Pipeline(e) => write!(f, "Pipeline failed: {}", e),
            CliError::TilesFailed { failed } => {
                write!(f, "{} tile(s) failed during extraction", failed)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}
