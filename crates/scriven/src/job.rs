//! Job model — the central tracked entity for transcription and
//! enhancement work.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Kind of work a job performs. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Transcribe,
    Enhance,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Transcribe => "transcribe",
            JobType::Enhance => "enhance",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcribe" => Ok(JobType::Transcribe),
            "enhance" => Ok(JobType::Enhance),
            other => Err(format!("Unknown job type: {}", other)),
        }
    }
}

/// Lifecycle state. `Completed` and `Failed` are terminal and are never
/// left once entered; a retry is a new job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("Unknown job status: {}", other)),
        }
    }
}

// Stored as plain text columns; invalid stored values surface as
// column conversion errors rather than panics.
macro_rules! impl_sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

impl_sql_text_enum!(JobType);
impl_sql_text_enum!(JobStatus);

/// Job-type-specific parameters, fixed at creation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    /// Clip start offset in seconds (transcription only).
    #[serde(default)]
    pub start_time: Option<f64>,
    /// Clip end offset in seconds (transcription only).
    #[serde(default)]
    pub end_time: Option<f64>,
    /// Request word/segment timestamps in the transcript.
    #[serde(default)]
    pub enable_timestamp: bool,
    /// Decode the audio in fixed-length chunks.
    #[serde(default)]
    pub enable_chunked: bool,
    /// Chunk length in seconds when chunked decoding is enabled.
    #[serde(default = "default_chunk_length")]
    pub chunk_length: u32,
    /// Target language for translation, forwarded with the job options.
    #[serde(default)]
    pub translate_to: Option<String>,
    /// Custom instruction for the enhancement engine.
    #[serde(default)]
    pub enhancement_prompt: Option<String>,
    /// Run enhancement inline after a successful transcription.
    #[serde(default)]
    pub auto_enhance: bool,
}

fn default_chunk_length() -> u32 {
    30
}

impl JobOptions {
    /// The (start, end) clip range, if either bound was given.
    pub fn clip(&self) -> Option<(Option<f64>, Option<f64>)> {
        if self.start_time.is_some() || self.end_time.is_some() {
            Some((self.start_time, self.end_time))
        } else {
            None
        }
    }
}

/// A single tracked unit of transcription or enhancement work.
///
/// Status and progress are mutated only by the execution engine and the
/// recovery sweep; everything else is immutable after creation (except
/// `output_file`, written once on success and possibly overwritten by the
/// inline auto-enhance path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Monotonically assigned numeric id (0 until inserted).
    pub id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Source audio (transcribe) or source transcript artifact (enhance).
    pub input_file: String,
    /// Produced artifact path; set on the success path only.
    pub output_file: Option<String>,
    pub options: JobOptions,
    /// Job-level percentage in [0, 100], non-decreasing per attempt.
    pub progress: f64,
    pub error_message: Option<String>,
    /// Soft-hidden from default listings; does not affect execution.
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(job_type: JobType, input_file: String, options: JobOptions) -> Self {
        Self {
            id: 0,
            job_type,
            status: JobStatus::Pending,
            input_file,
            output_file: None,
            options,
            progress: 0.0,
            error_message: None,
            archived: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Creates a pending transcription job for an audio file.
    pub fn transcription(input_file: impl Into<String>, options: JobOptions) -> Self {
        Self::new(JobType::Transcribe, input_file.into(), options)
    }

    /// Creates a pending enhancement job whose input is a transcript
    /// artifact produced by a completed transcription job.
    pub fn enhancement(input_file: impl Into<String>, options: JobOptions) -> Self {
        Self::new(JobType::Enhance, input_file.into(), options)
    }
}
