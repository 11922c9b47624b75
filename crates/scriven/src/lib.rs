pub mod artifact;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod job;
pub mod progress;
pub mod service;
pub mod telemetry;
pub mod worker;

pub use artifact::{Artifact, ArtifactMeta};
pub use config::Settings;
pub use db::{Database, DatabaseError};
pub use engine::{
    EngineSet, EnhancementEngine, Executor, JobOutcome, TranscriptionEngine, TranscriptionRequest,
};
pub use error::{
    ConfigError, EngineError, Result, ScrivenError, StorageError, ValidationError, WorkerError,
};
pub use events::{EventSender, JobEvent, JobPhase};
pub use job::{Job, JobOptions, JobStatus, JobType};
pub use service::{JobResult, JobService};
pub use worker::{EngineFactory, WorkerPool, INTERRUPTED_REASON};
