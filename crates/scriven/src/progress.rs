//! Progress reporting — maps a work unit's stage-local progress signals
//! onto the persisted job-level percentage.
//!
//! Each job type has a fixed stage table. A stage maps its local fraction
//! f ∈ [0, 1] linearly onto a job-level range; fixed checkpoints are
//! ranges of zero width. The persisted value never decreases within an
//! attempt, so jittery or out-of-order signals from the delegate cannot
//! move a job backwards.

use std::sync::Mutex;

use crate::db::{job_repo, Database};
use crate::events::{self, EventSender, JobEvent, JobPhase};
use crate::job::JobType;

/// One stage's slice of the job-level percentage space.
#[derive(Debug, Clone, Copy)]
pub struct StageSpan {
    pub stage: &'static str,
    pub lo: f64,
    pub hi: f64,
}

/// Fixed per-stage range table for one job type.
#[derive(Debug, Clone, Copy)]
pub struct StageMap(&'static [StageSpan]);

/// Transcription: setup floor at 10, inference fills 10–80, artifact
/// persistence steps to 90, inline enhancement fills 90–100.
pub const TRANSCRIBE_STAGES: StageMap = StageMap(&[
    StageSpan { stage: "setup", lo: 10.0, hi: 10.0 },
    StageSpan { stage: "inference", lo: 10.0, hi: 80.0 },
    StageSpan { stage: "persist", lo: 90.0, hi: 90.0 },
    StageSpan { stage: "enhance", lo: 90.0, hi: 100.0 },
]);

/// Enhancement: source read at 20, body extraction at 30, the engine call
/// fills 30–80, artifact persistence steps to 90.
pub const ENHANCE_STAGES: StageMap = StageMap(&[
    StageSpan { stage: "read", lo: 20.0, hi: 20.0 },
    StageSpan { stage: "extract", lo: 30.0, hi: 30.0 },
    StageSpan { stage: "enhance", lo: 30.0, hi: 80.0 },
    StageSpan { stage: "persist", lo: 90.0, hi: 90.0 },
]);

impl StageMap {
    pub fn for_job_type(job_type: JobType) -> Self {
        match job_type {
            JobType::Transcribe => TRANSCRIBE_STAGES,
            JobType::Enhance => ENHANCE_STAGES,
        }
    }

    /// Maps a stage-local fraction to a job-level percentage.
    /// Unknown stages return None and are ignored by the reporter.
    pub fn map(&self, stage: &str, fraction: f64) -> Option<f64> {
        let span = self.0.iter().find(|s| s.stage == stage)?;
        let f = fraction.clamp(0.0, 1.0);
        Some(span.lo + f * (span.hi - span.lo))
    }
}

/// Persisting progress reporter for one job's execution attempt.
///
/// Every accepted signal is a single synchronous update of the job row;
/// there is no batching or delay here — callers wanting lower write
/// amplification throttle at the signal source. A failed progress write
/// is logged and dropped (the job only shows stale progress); checkpoint
/// and terminal writes are handled by the executor and stay fatal.
pub struct JobProgress {
    db: Database,
    job_id: i64,
    stages: StageMap,
    last: Mutex<f64>,
    events: Option<EventSender>,
}

impl JobProgress {
    pub fn new(db: Database, job_id: i64, job_type: JobType, events: Option<EventSender>) -> Self {
        Self {
            db,
            job_id,
            stages: StageMap::for_job_type(job_type),
            last: Mutex::new(0.0),
            events,
        }
    }

    /// Handles one (stage, fraction) signal from the work unit.
    pub fn signal(&self, stage: &str, fraction: f64) {
        let Some(pct) = self.stages.map(stage, fraction) else {
            tracing::debug!(job_id = self.job_id, stage, "Ignoring unknown progress stage");
            return;
        };

        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if pct <= *last {
            return;
        }

        if let Err(e) = job_repo::update_progress(&self.db, self.job_id, pct) {
            tracing::warn!(job_id = self.job_id, error = %e, "Progress write failed");
            return;
        }
        *last = pct;

        events::emit(
            &self.events,
            JobEvent::new(self.job_id, JobPhase::Progress, pct, None),
        );
    }

    /// The last successfully persisted percentage.
    pub fn last(&self) -> f64 {
        match self.last.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
