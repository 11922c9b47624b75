//! Startup recovery sweep.
//!
//! No execution attempt survives a process restart (there is no
//! checkpoint/resume), so any job found in PROCESSING at startup is a
//! crashed attempt. This is the only place a non-terminal job is
//! force-transitioned without a delegate outcome.

use chrono::Utc;
use tracing::warn;

use crate::db::{job_repo, Database, DatabaseError};
use crate::job::JobStatus;

/// Fixed error reason recorded on jobs orphaned by a restart.
pub const INTERRUPTED_REASON: &str = "interrupted by restart";

/// Marks every PROCESSING job as FAILED. Returns the number of jobs
/// resolved. Run once before the worker pool starts accepting work.
pub fn sweep(db: &Database) -> Result<usize, DatabaseError> {
    let stuck = job_repo::find_by_status(db, JobStatus::Processing)?;

    for job in &stuck {
        warn!(job_id = job.id, "Resolving job orphaned by restart");
        job_repo::mark_failed(db, job.id, INTERRUPTED_REASON, Utc::now())?;
    }

    Ok(stuck.len())
}
