//! Worker pool — dispatches job ids to slot threads.
//!
//! One slot processes exactly one job end-to-end before picking up the
//! next; there is no preemption. Each slot owns its own delegate engine
//! instances (the underlying model runtimes are not safe to share), and
//! the slot is recycled — executor torn down and rebuilt — after a
//! bounded number of jobs to cap memory growth in the model runtime.
//!
//! Submission never blocks on slot availability; accepted job ids queue
//! on an unbounded channel until a slot is free.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info};

use crate::db::{job_repo, Database, DatabaseError};
use crate::engine::{EngineSet, Executor, JobOutcome};
use crate::error::{ScrivenError, ValidationError, WorkerError};
use crate::events::{self, EventSender, JobEvent, JobPhase};
use crate::job::JobStatus;
use crate::worker::recovery;

/// Builds one slot's delegate engines. Called per slot at startup and
/// again on every recycle.
pub type EngineFactory = Arc<dyn Fn() -> EngineSet + Send + Sync>;

pub struct WorkerPool {
    db: Database,
    job_sender: Sender<i64>,
    outcome_receiver: Receiver<JobOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    events: Option<EventSender>,
}

impl WorkerPool {
    /// Starts the pool: runs the recovery sweep, then spawns
    /// `worker_count` slot threads.
    ///
    /// # Panics
    /// Panics if `worker_count` or `max_jobs_per_slot` is 0.
    pub fn start(
        db: Database,
        output_dir: PathBuf,
        worker_count: usize,
        max_jobs_per_slot: usize,
        factory: EngineFactory,
        events: Option<EventSender>,
    ) -> Result<Self, DatabaseError> {
        assert!(worker_count > 0, "worker_count must be > 0");
        assert!(max_jobs_per_slot > 0, "max_jobs_per_slot must be > 0");

        let recovered = recovery::sweep(&db)?;
        if recovered > 0 {
            info!(count = recovered, "Recovery sweep resolved orphaned jobs");
        }

        let (job_sender, job_receiver) = unbounded::<i64>();
        let (outcome_sender, outcome_receiver) = unbounded::<JobOutcome>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for slot_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let outcome_tx = outcome_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let slot_db = db.clone();
            let slot_output_dir = output_dir.clone();
            let slot_factory = Arc::clone(&factory);
            let slot_events = events.clone();

            let handle = thread::spawn(move || {
                run_slot(
                    slot_id,
                    job_rx,
                    outcome_tx,
                    shutdown_flag,
                    slot_db,
                    slot_output_dir,
                    max_jobs_per_slot,
                    slot_factory,
                    slot_events,
                );
            });

            workers.push(handle);
        }

        info!("Started {} worker slots", worker_count);

        Ok(Self {
            db,
            job_sender,
            outcome_receiver,
            workers,
            shutdown,
            events,
        })
    }

    /// Enqueues a job id for execution.
    ///
    /// A job that is already PROCESSING or terminal is rejected here;
    /// the executor re-checks at claim time and ignores any duplicate
    /// that slips through, so execution stays exactly-once per id.
    pub fn submit(&self, job_id: i64) -> Result<(), ScrivenError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed.into());
        }

        let job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or(ValidationError::JobNotFound(job_id))?;
        if job.status != JobStatus::Pending {
            return Err(WorkerError::DuplicateDispatch {
                id: job_id,
                status: job.status,
            }
            .into());
        }

        self.job_sender
            .send(job_id)
            .map_err(|_| WorkerError::ChannelClosed)?;

        events::emit(
            &self.events,
            JobEvent::new(job_id, JobPhase::Queued, 0.0, None),
        );
        Ok(())
    }

    /// Non-blocking poll for the next finished job's outcome.
    pub fn try_recv_outcome(&self) -> Option<JobOutcome> {
        self.outcome_receiver.try_recv().ok()
    }

    /// Blocks until some job finishes (or the pool stops).
    pub fn recv_outcome(&self) -> Option<JobOutcome> {
        self.outcome_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Waits for all slot threads to finish. In-flight jobs run to
    /// completion; queued jobs not yet claimed are dropped (they remain
    /// PENDING and can be re-submitted).
    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Slot {} panicked: {:?}", i, e);
            } else {
                debug!("Slot {} finished", i);
            }
        }

        info!("All worker slots have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_slot(
    slot_id: usize,
    job_receiver: Receiver<i64>,
    outcome_sender: Sender<JobOutcome>,
    shutdown: Arc<AtomicBool>,
    db: Database,
    output_dir: PathBuf,
    max_jobs_per_slot: usize,
    factory: EngineFactory,
    events: Option<EventSender>,
) {
    debug!("Slot {} started", slot_id);

    let mut executor = Executor::new(db.clone(), output_dir.clone(), factory(), events.clone());
    let mut jobs_since_recycle = 0usize;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Slot {} received shutdown signal", slot_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(job_id) => {
                debug!("Slot {} processing job {}", slot_id, job_id);

                let outcome = executor.execute(job_id);
                jobs_since_recycle += 1;

                if let Err(e) = outcome_sender.send(outcome) {
                    error!("Slot {} failed to send outcome: {}", slot_id, e);
                    break;
                }

                // Recycle: rebuild the executor (and with it the slot's
                // engine instances) after the per-slot task limit.
                if jobs_since_recycle >= max_jobs_per_slot {
                    debug!(
                        "Slot {} recycling after {} jobs",
                        slot_id, jobs_since_recycle
                    );
                    executor =
                        Executor::new(db.clone(), output_dir.clone(), factory(), events.clone());
                    jobs_since_recycle = 0;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Slot {} job channel disconnected", slot_id);
                break;
            }
        }
    }

    debug!("Slot {} stopped", slot_id);
}
