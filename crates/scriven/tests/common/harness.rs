//! Test harness for isolated job engine runs.
//!
//! Each harness owns a temp directory with upload/output subdirectories
//! and an in-memory job store, and starts a real worker pool over
//! scripted delegate engines. Tests drive the public `JobService` surface
//! and observe persisted rows and artifact files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use scriven::db::job_repo;
use scriven::{
    Database, EngineFactory, EventSender, Job, JobService, JobStatus, WorkerPool,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let upload_dir = base.join("uploads");
        let output_dir = base.join("outputs");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");
        std::fs::create_dir_all(&output_dir).expect("Failed to create output dir");

        let db = Database::open_in_memory().expect("Failed to open store");

        Self {
            temp_dir,
            upload_dir,
            output_dir,
            db,
        }
    }

    /// Starts a single-slot service over the given engine factory.
    pub fn start_service(&self, factory: EngineFactory) -> JobService {
        self.start_service_with(1, 3, factory)
    }

    pub fn start_service_with(
        &self,
        worker_count: usize,
        max_jobs_per_slot: usize,
        factory: EngineFactory,
    ) -> JobService {
        self.build_service(worker_count, max_jobs_per_slot, factory, None)
    }

    /// Starts a single-slot service with a live event broadcaster attached.
    pub fn start_service_with_events(
        &self,
        factory: EngineFactory,
        events: EventSender,
    ) -> JobService {
        self.build_service(1, 3, factory, Some(events))
    }

    fn build_service(
        &self,
        worker_count: usize,
        max_jobs_per_slot: usize,
        factory: EngineFactory,
        events: Option<EventSender>,
    ) -> JobService {
        let pool = WorkerPool::start(
            self.db.clone(),
            self.output_dir.clone(),
            worker_count,
            max_jobs_per_slot,
            factory,
            events,
        )
        .expect("Failed to start worker pool");
        JobService::new(self.db.clone(), pool)
    }

    /// Writes a placeholder audio file into the upload directory.
    pub fn write_audio(&self, filename: &str) -> PathBuf {
        let path = self.upload_dir.join(filename);
        std::fs::write(&path, b"\x00fake audio bytes").expect("Failed to write audio file");
        path
    }

    /// Blocks on pool outcomes until the job reaches a terminal status.
    pub fn wait_for_terminal(&self, svc: &JobService, id: i64) -> Job {
        loop {
            svc.recv_outcome().expect("Worker pool stopped unexpectedly");
            let job = svc.get_job(id).expect("Job vanished mid-run");
            if job.status.is_terminal() {
                return job;
            }
        }
    }

    /// Inserts a row directly, bypassing validation and dispatch.
    pub fn insert_raw(&self, job: &Job) -> i64 {
        job_repo::insert(&self.db, job).expect("Failed to insert job row")
    }

    /// Forces a row into PROCESSING, as if a crashed run left it behind.
    pub fn strand_processing(&self, id: i64, progress: f64) {
        job_repo::mark_processing(&self.db, id, chrono::Utc::now())
            .expect("Failed to mark processing");
        job_repo::update_progress(&self.db, id, progress).expect("Failed to set progress");
    }

    pub fn reload(&self, id: i64) -> Job {
        job_repo::find_by_id(&self.db, id)
            .expect("Failed to query job")
            .expect("Job row missing")
    }

    pub fn read_artifact(&self, path: &str) -> String {
        std::fs::read_to_string(path).expect("Failed to read artifact file")
    }

    pub fn assert_status(&self, id: i64, status: JobStatus) {
        assert_eq!(self.reload(id).status, status);
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
