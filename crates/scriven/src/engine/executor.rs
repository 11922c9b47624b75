//! Execution engine — drives one job from PENDING to a terminal state.
//!
//! The state machine is identical for both job types; only the delegate
//! differs. The dispatcher always receives a definite [`JobOutcome`],
//! never an unhandled fault, so one job's failure cannot take down a
//! slot's ability to accept the next job.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, info_span, warn};

use crate::artifact::{self, ArtifactMeta};
use crate::db::{job_repo, Database};
use crate::error::ScrivenError;
use crate::events::{self, EventSender, JobEvent, JobPhase};
use crate::job::{Job, JobStatus, JobType};
use crate::progress::JobProgress;

use super::{EngineSet, TranscriptionRequest};

/// Definite outcome of one execution attempt, reported to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { job_id: i64, output_file: String },
    Failed { job_id: i64, error: String },
    /// The job was not in a claimable state (duplicate dispatch or
    /// deleted before pickup); nothing was executed.
    Skipped { job_id: i64 },
}

/// Runs jobs to completion or failure on behalf of one worker slot.
///
/// Owns the slot's delegate engine instances; the dispatcher rebuilds the
/// whole executor when it recycles the slot.
pub struct Executor {
    db: Database,
    output_dir: PathBuf,
    engines: EngineSet,
    events: Option<EventSender>,
}

impl Executor {
    pub fn new(
        db: Database,
        output_dir: PathBuf,
        engines: EngineSet,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            output_dir,
            engines,
            events,
        }
    }

    /// Executes one job end-to-end and persists its terminal state.
    pub fn execute(&mut self, job_id: i64) -> JobOutcome {
        let _span = info_span!("job", job_id).entered();

        let job = match job_repo::find_by_id(&self.db, job_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!("Job vanished before pickup");
                return JobOutcome::Skipped { job_id };
            }
            Err(e) => {
                error!(error = %e, "Failed to load job");
                return JobOutcome::Failed {
                    job_id,
                    error: e.to_string(),
                };
            }
        };

        if job.status != JobStatus::Pending {
            info!(status = %job.status, "Ignoring duplicate dispatch");
            return JobOutcome::Skipped { job_id };
        }

        // Exactly-once execution per accepted id: the claim is a single
        // conditional write, so of two slots racing on the same id only
        // one wins it. The loser drops the job without executing.
        match job_repo::mark_processing(&self.db, job_id, Utc::now()) {
            Ok(true) => {}
            Ok(false) => {
                info!("Job claimed by another slot");
                return JobOutcome::Skipped { job_id };
            }
            Err(e) => {
                error!(error = %e, "Failed to claim job");
                return JobOutcome::Failed {
                    job_id,
                    error: e.to_string(),
                };
            }
        }
        events::emit(
            &self.events,
            JobEvent::new(job_id, JobPhase::Started, 0.0, None),
        );
        info!(job_type = %job.job_type, input = %job.input_file, "Job started");

        let progress = JobProgress::new(
            self.db.clone(),
            job_id,
            job.job_type,
            self.events.clone(),
        );

        let result = match job.job_type {
            JobType::Transcribe => self.run_transcribe(&job, &progress),
            JobType::Enhance => self.run_enhance(&job, &progress),
        };

        match result {
            Ok(output_file) => match job_repo::mark_completed(&self.db, job_id, Utc::now()) {
                Ok(()) => {
                    events::emit(
                        &self.events,
                        JobEvent::new(job_id, JobPhase::Completed, 100.0, Some(output_file.clone())),
                    );
                    info!(output = %output_file, "Job completed");
                    JobOutcome::Completed {
                        job_id,
                        output_file,
                    }
                }
                Err(e) => self.fail(job_id, &e.to_string(), progress.last()),
            },
            Err(e) => self.fail(job_id, &e.to_string(), progress.last()),
        }
    }

    /// The terminal failure write. Best-effort idempotent: if even this
    /// write fails the job may be left stuck in PROCESSING, which the
    /// startup recovery sweep resolves.
    fn fail(&self, job_id: i64, cause: &str, last_progress: f64) -> JobOutcome {
        warn!(error = %cause, "Job failed");
        if let Err(db_err) = job_repo::mark_failed(&self.db, job_id, cause, Utc::now()) {
            error!(
                error = %db_err,
                "Could not persist failure; job may be stuck in processing until restart"
            );
        }
        events::emit(
            &self.events,
            JobEvent::new(job_id, JobPhase::Failed, last_progress, Some(cause.to_string())),
        );
        JobOutcome::Failed {
            job_id,
            error: cause.to_string(),
        }
    }

    fn run_transcribe(
        &mut self,
        job: &Job,
        progress: &JobProgress,
    ) -> Result<String, ScrivenError> {
        let input = Path::new(&job.input_file);
        progress.signal("setup", 1.0);

        let request = TranscriptionRequest {
            audio_path: input,
            start_time: job.options.start_time,
            end_time: job.options.end_time,
            enable_timestamps: job.options.enable_timestamp,
            chunk_length: job
                .options
                .enable_chunked
                .then_some(job.options.chunk_length),
        };

        let text = self
            .engines
            .transcriber
            .transcribe(&request, &|stage, fraction| {
                progress.signal(stage, fraction)
            })?;

        let source = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.input_file.clone());

        let path = self
            .output_dir
            .join(artifact::transcript_filename(input, job.id));
        artifact::write(
            &path,
            &ArtifactMeta {
                source: source.clone(),
                timestamps: job.options.enable_timestamp,
                enhanced_by: None,
            },
            &text,
        )?;

        let output_file = path.to_string_lossy().into_owned();
        job_repo::set_output(&self.db, job.id, &output_file)?;
        progress.signal("persist", 1.0);

        if !job.options.auto_enhance {
            return Ok(output_file);
        }

        // Inline auto-enhance: uses the in-memory transcript, not a
        // re-read from disk, and bypasses re-dispatch. Its failure is
        // the transcription job's own failure.
        let enhanced = self
            .engines
            .enhancer
            .enhance(&text, job.options.enhancement_prompt.as_deref())?;

        let enhanced_path = self
            .output_dir
            .join(artifact::enhanced_filename(input, job.id));
        artifact::write(
            &enhanced_path,
            &ArtifactMeta {
                source,
                timestamps: job.options.enable_timestamp,
                enhanced_by: Some(self.engines.enhancer.name().to_string()),
            },
            &enhanced,
        )?;

        let enhanced_file = enhanced_path.to_string_lossy().into_owned();
        job_repo::set_output(&self.db, job.id, &enhanced_file)?;
        Ok(enhanced_file)
    }

    fn run_enhance(&mut self, job: &Job, progress: &JobProgress) -> Result<String, ScrivenError> {
        let input = Path::new(&job.input_file);

        // The input is a transcript artifact; only its body is fed to the
        // enhancement engine, never the metadata header.
        let source_artifact = artifact::read(input)?;
        progress.signal("read", 1.0);

        let body = source_artifact.body;
        progress.signal("extract", 1.0);

        let enhanced = self
            .engines
            .enhancer
            .enhance(&body, job.options.enhancement_prompt.as_deref())?;
        progress.signal("enhance", 1.0);

        let source = if source_artifact.meta.source.is_empty() {
            input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| job.input_file.clone())
        } else {
            source_artifact.meta.source
        };

        let path = self
            .output_dir
            .join(artifact::enhanced_filename(Path::new(&source), job.id));
        artifact::write(
            &path,
            &ArtifactMeta {
                source,
                timestamps: source_artifact.meta.timestamps,
                enhanced_by: Some(self.engines.enhancer.name().to_string()),
            },
            &enhanced,
        )?;

        let output_file = path.to_string_lossy().into_owned();
        job_repo::set_output(&self.db, job.id, &output_file)?;
        progress.signal("persist", 1.0);
        Ok(output_file)
    }
}
