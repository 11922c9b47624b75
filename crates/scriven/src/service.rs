//! Job service — the submission and query surface over the store and the
//! worker pool.
//!
//! Creation validates inputs before any row is written: a rejected request
//! leaves no trace in the store. Successful creation persists a PENDING
//! job and enqueues its id in one step, so callers never see a job that
//! exists but was never dispatched.

use std::path::Path;

use tracing::{info, info_span};

use crate::artifact::{self, ArtifactMeta};
use crate::db::{job_repo, Database};
use crate::db::job_repo::JobFilter;
use crate::error::{Result, ValidationError};
use crate::job::{Job, JobOptions, JobStatus};
use crate::worker::WorkerPool;

/// A completed job's artifact, parsed for presentation.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: i64,
    /// Absolute path of the artifact on disk.
    pub output_file: String,
    pub meta: ArtifactMeta,
    /// Body text with the artifact header stripped.
    pub content: String,
}

pub struct JobService {
    db: Database,
    pool: WorkerPool,
}

impl JobService {
    pub fn new(db: Database, pool: WorkerPool) -> Self {
        Self { db, pool }
    }

    /// Creates and dispatches a transcription job for an audio file.
    ///
    /// The input must exist on disk at submission time; a dangling path is
    /// rejected here instead of producing a job that can only fail.
    pub fn create_transcription(
        &self,
        input_file: impl AsRef<Path>,
        options: JobOptions,
    ) -> Result<Job> {
        let input_file = input_file.as_ref();
        let span = info_span!("create_transcription", input = %input_file.display());
        let _guard = span.enter();

        if !input_file.is_file() {
            return Err(ValidationError::InputNotFound(input_file.to_path_buf()).into());
        }

        let job = Job::transcription(input_file.to_string_lossy().into_owned(), options);
        let id = job_repo::insert(&self.db, &job)?;
        self.pool.submit(id)?;

        info!(job_id = id, "Transcription job created");
        self.get_job(id)
    }

    /// Creates and dispatches an enhancement job chained off a completed
    /// transcription job.
    ///
    /// The new job's input is the source job's artifact path, captured at
    /// creation time. The source must be COMPLETED and its artifact must
    /// still exist on disk; the enhancement runs on the persisted artifact,
    /// not on any in-memory state of the source attempt.
    pub fn create_enhancement(&self, source_job_id: i64, options: JobOptions) -> Result<Job> {
        let span = info_span!("create_enhancement", source_job_id);
        let _guard = span.enter();

        let source = job_repo::find_by_id(&self.db, source_job_id)?
            .ok_or(ValidationError::JobNotFound(source_job_id))?;

        if source.status != JobStatus::Completed {
            return Err(ValidationError::SourceNotCompleted {
                id: source_job_id,
                status: source.status,
            }
            .into());
        }

        let artifact_path = source
            .output_file
            .filter(|p| Path::new(p).is_file())
            .ok_or(ValidationError::SourceArtifactMissing(source_job_id))?;

        let job = Job::enhancement(artifact_path, options);
        let id = job_repo::insert(&self.db, &job)?;
        self.pool.submit(id)?;

        info!(job_id = id, "Enhancement job created");
        self.get_job(id)
    }

    pub fn get_job(&self, id: i64) -> Result<Job> {
        job_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| ValidationError::JobNotFound(id).into())
    }

    /// Lists jobs matching the filter, newest first, with the total count
    /// of matching rows (for pagination).
    pub fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, u64)> {
        Ok(job_repo::query(&self.db, filter)?)
    }

    /// Reads a completed job's artifact and returns its parsed content.
    pub fn get_result(&self, id: i64) -> Result<JobResult> {
        let job = self.get_job(id)?;

        if job.status != JobStatus::Completed {
            return Err(ValidationError::JobNotCompleted(id).into());
        }
        // Completed implies output_file is set; a missing value means the
        // row was tampered with and is treated as no result.
        let output_file = job
            .output_file
            .ok_or(ValidationError::JobNotCompleted(id))?;

        let parsed = artifact::read(Path::new(&output_file))?;
        Ok(JobResult {
            job_id: id,
            output_file,
            meta: parsed.meta,
            content: parsed.body,
        })
    }

    /// Deletes a job row and its artifact file.
    ///
    /// A PROCESSING job cannot be deleted; its slot holds the row's id and
    /// would resurrect state through progress writes. The artifact is
    /// removed before the row so a failure leaves the job findable.
    pub fn delete_job(&self, id: i64) -> Result<()> {
        let job = self.get_job(id)?;

        if job.status == JobStatus::Processing {
            return Err(ValidationError::JobStillProcessing(id).into());
        }

        if let Some(ref output_file) = job.output_file {
            artifact::remove(Path::new(output_file))?;
        }

        if !job_repo::delete(&self.db, id)? {
            return Err(ValidationError::JobNotFound(id).into());
        }

        info!(job_id = id, "Job deleted");
        Ok(())
    }

    /// Archives or unarchives a job. Archived jobs are hidden from default
    /// listings but keep their rows and artifacts.
    pub fn set_archived(&self, id: i64, archived: bool) -> Result<()> {
        if !job_repo::set_archived(&self.db, id, archived)? {
            return Err(ValidationError::JobNotFound(id).into());
        }
        Ok(())
    }

    /// Marks a failed or interrupted job's work for another attempt by
    /// creating a fresh PENDING row with the same input and options. The
    /// original row is left untouched; terminal states are never re-entered.
    pub fn retry_job(&self, id: i64) -> Result<Job> {
        let source = self.get_job(id)?;

        if source.status != JobStatus::Failed {
            return Err(ValidationError::NotRetryable {
                id,
                status: source.status,
            }
            .into());
        }

        let fresh = match source.job_type {
            crate::job::JobType::Transcribe => {
                Job::transcription(source.input_file, source.options)
            }
            crate::job::JobType::Enhance => Job::enhancement(source.input_file, source.options),
        };
        let fresh_id = job_repo::insert(&self.db, &fresh)?;
        self.pool.submit(fresh_id)?;

        info!(job_id = fresh_id, retried_from = id, "Retry job created");
        self.get_job(fresh_id)
    }

    /// Blocks until the next job finishes and returns its outcome.
    pub fn recv_outcome(&self) -> Option<crate::engine::JobOutcome> {
        self.pool.recv_outcome()
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Stops the pool and waits for in-flight jobs to finish.
    pub fn wait(self) {
        self.pool.shutdown();
        self.pool.wait();
    }

    /// Count of jobs currently in the given status.
    pub fn count_by_status(&self, status: JobStatus) -> Result<u64> {
        Ok(job_repo::count_by_status(&self.db, status)?)
    }
}
