//! Job orchestration: configuration, the bounded worker pool, and the
//! orchestrator state machine that drives checkpoint updates.

mod config;
mod orchestrator;
mod pool;

pub use config::JobConfig;
pub use orchestrator::{PipelineError, PipelineOrchestrator, RunSummary};
pub use pool::WorkerPool;
