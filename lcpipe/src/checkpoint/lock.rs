//! Advisory file lock for checkpoint read-modify-write cycles.
//!
//! Uses `flock(2)` on a dedicated token file next to the checkpoint
//! documents. The non-blocking variant is polled at a fixed interval up to a
//! bounded timeout, so contended acquisition never hangs indefinitely and
//! never livelocks: each poll is a single syscall and the kernel hands the
//! lock to exactly one waiter.
//!
//! The lock is released when the guard drops, and the kernel drops it if the
//! process dies. Stale locks on filesystems with broken advisory locking are
//! an operational matter (delete the token file by hand), not handled in
//! code.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

/// Timing knobs for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    /// Give up after waiting this long (default: 30s)
    pub timeout: Duration,
    /// Poll the non-blocking lock at this interval (default: 100ms)
    pub retry_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_interval: Duration::from_millis(100),
        }
    }
}

impl LockConfig {
    /// Set the acquisition timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

/// Errors from lock acquisition.
///
/// `Timeout` is transient contention and retryable by the caller; `Io` means
/// the token file itself could not be opened or locked.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not acquire checkpoint lock at {path} within {waited:?}")]
    Timeout { path: PathBuf, waited: Duration },
    #[error("checkpoint lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Exclusive lock over the checkpoint documents.
///
/// RAII guard: dropping it releases the flock.
pub struct CheckpointLock {
    _flock: Flock<File>,
}

impl CheckpointLock {
    /// Acquire the exclusive lock at `path`, polling up to the configured
    /// timeout.
    pub fn acquire(path: &Path, config: LockConfig) -> Result<Self, LockError> {
        let start = Instant::now();

        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| LockError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;

            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(flock) => {
                    debug!(path = %path.display(), waited = ?start.elapsed(), "acquired checkpoint lock");
                    return Ok(Self { _flock: flock });
                }
                Err((_file, Errno::EWOULDBLOCK)) => {
                    if start.elapsed() >= config.timeout {
                        return Err(LockError::Timeout {
                            path: path.to_path_buf(),
                            waited: start.elapsed(),
                        });
                    }
                    std::thread::sleep(config.retry_interval);
                }
                Err((_file, errno)) => {
                    return Err(LockError::Io {
                        path: path.to_path_buf(),
                        source: std::io::Error::from(errno),
                    });
                }
            }
        }
    }
}
