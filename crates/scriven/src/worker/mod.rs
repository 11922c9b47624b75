//! Worker pool dispatching jobs to slot threads, plus the startup
//! recovery sweep for jobs orphaned by an abrupt shutdown.

pub mod pool;
pub mod recovery;

pub use pool::{EngineFactory, WorkerPool};
pub use recovery::INTERRUPTED_REASON;
