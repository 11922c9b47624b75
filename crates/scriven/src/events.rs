//! Job event broadcaster for live status streaming.
//!
//! Subscribers (a UI feed, tests) receive every lifecycle transition and
//! progress write. Sending never blocks; events for lagging or absent
//! receivers are dropped, the job row remains the source of truth.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Phase of job processing.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Started,
    Progress,
    Completed,
    Failed,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Started => write!(f, "Started"),
            JobPhase::Progress => write!(f, "Progress"),
            JobPhase::Completed => write!(f, "Completed"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// A single job lifecycle or progress event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: i64,
    pub phase: JobPhase,
    /// Job-level percentage at the time of the event.
    pub progress: f64,
    /// Output path on completion, error message on failure.
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: i64, phase: JobPhase, progress: f64, message: Option<String>) -> Self {
        Self {
            job_id,
            phase,
            progress,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Shared sender handle; cloned into each worker slot.
pub type EventSender = Arc<broadcast::Sender<JobEvent>>;

/// Creates a broadcast channel for job events.
pub fn channel(capacity: usize) -> (EventSender, broadcast::Receiver<JobEvent>) {
    let (tx, rx) = broadcast::channel(capacity);
    (Arc::new(tx), rx)
}

/// Emits an event if a sender is attached. A send error only means there
/// are no live receivers and is ignored.
pub(crate) fn emit(sender: &Option<EventSender>, event: JobEvent) {
    if let Some(tx) = sender {
        let _ = tx.send(event);
    }
}
