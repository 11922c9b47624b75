use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum ScrivenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bad input to job creation or an operation on a job in the wrong state.
/// Surfaced immediately to the caller; never persisted as a job row.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Job {0} not found")]
    JobNotFound(i64),

    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Source job {id} is not completed (status: {status})")]
    SourceNotCompleted { id: i64, status: JobStatus },

    #[error("Source job {0} has no resolvable transcript artifact")]
    SourceArtifactMissing(i64),

    #[error("Job {0} is not completed")]
    JobNotCompleted(i64),

    #[error("Job {0} is still processing and cannot be deleted")]
    JobStillProcessing(i64),

    #[error("Job {id} is not failed and cannot be retried (status: {status})")]
    NotRetryable { id: i64, status: JobStatus },
}

/// Failure reported by a delegate engine. Caught at the execution engine
/// boundary and recorded in the job's `error_message`, never re-raised.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Enhancement failed: {0}")]
    Enhancement(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Job {id} already dispatched (status: {status})")]
    DuplicateDispatch { id: i64, status: JobStatus },
}

pub type Result<T> = std::result::Result<T, ScrivenError>;
