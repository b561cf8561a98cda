//! Durable, lock-guarded checkpoint state.
//!
//! The checkpoint is the single source of truth for resumability: which tiles
//! are completed (with per-tile stats), which failed (with their last error),
//! and rollup progress counters. It is persisted as three independently
//! loadable JSON documents under `<output>/checkpoints/`, with a dedicated
//! lock token alongside them.
//!
//! Writers are independent OS processes potentially spanning multiple job
//! submissions on the same output directory, so every mutation is a full
//! load-modify-store cycle guarded by the advisory file lock, and every write
//! goes to a temp file first then renames over the target. A crash mid-write
//! never corrupts the previous valid state.

mod lock;
mod state;
mod store;

pub use lock::{CheckpointLock, LockConfig, LockError};
pub use state::{
    CheckpointState, CompletedDoc, FailedDoc, FailureRecord, ProgressDoc, TileStats, TileStatus,
    COMPLETED_FILE, FAILED_FILE, LOCK_FILE, PROGRESS_FILE,
};
pub use store::{CheckpointError, CheckpointStore};
