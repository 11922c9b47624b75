//! End-to-end tests for the job lifecycle: creation through the service,
//! dispatch through a real worker pool, scripted delegate engines, and
//! assertions on persisted rows and artifact files.

mod common;

use std::path::Path;

use common::{
    default_factory, scripted_factory, EnhancerScript, TestHarness, TranscriberScript,
};
use scriven::db::job_repo::JobFilter;
use scriven::{
    events, Job, JobOptions, JobPhase, JobStatus, JobType, ScrivenError, ValidationError,
    INTERRUPTED_REASON,
};

#[test]
fn transcription_job_completes_and_persists_artifact() {
    let harness = TestHarness::new();
    let transcriber = TranscriberScript::returning("hello from the meeting");
    let seen_timestamps = transcriber.seen_timestamps.clone();
    let svc = harness.start_service(scripted_factory(
        transcriber,
        EnhancerScript::prefixing("enhanced: "),
    ));

    let audio = harness.write_audio("weekly sync.mp3");
    let job = svc
        .create_transcription(
            &audio,
            JobOptions {
                enable_timestamp: true,
                ..Default::default()
            },
        )
        .unwrap();

    let done = harness.wait_for_terminal(&svc, job.id);
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100.0);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert!(done.error_message.is_none());

    let output = done.output_file.unwrap();
    assert!(output.ends_with(&format!("weekly sync_{}.md", job.id)));

    let content = harness.read_artifact(&output);
    assert!(content.starts_with("# Transcript: weekly sync\n"));
    assert!(content.contains("**Source:** weekly sync.mp3"));
    assert!(content.contains("**Timestamps:** Enabled"));
    assert!(content.contains("hello from the meeting"));

    // The timestamp flag reached the delegate.
    assert_eq!(seen_timestamps.lock().unwrap().as_slice(), &[true]);

    svc.wait();
}

#[test]
fn transcription_failure_records_error_and_keeps_progress() {
    let harness = TestHarness::new();
    let svc = harness.start_service(scripted_factory(
        TranscriberScript::failing("decoder exploded"),
        EnhancerScript::prefixing("enhanced: "),
    ));

    let audio = harness.write_audio("broken.mp3");
    let job = svc.create_transcription(&audio, JobOptions::default()).unwrap();

    let done = harness.wait_for_terminal(&svc, job.id);
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.output_file.is_none());
    assert!(done.error_message.unwrap().contains("decoder exploded"));
    // The failing script last signalled inference at 0.5, which maps to
    // the 45% mark; failure freezes progress there.
    assert_eq!(done.progress, 45.0);
    assert!(done.completed_at.is_some());

    // No result is readable for a failed job.
    let err = svc.get_result(job.id).unwrap_err();
    assert!(matches!(
        err,
        ScrivenError::Validation(ValidationError::JobNotCompleted(_))
    ));

    svc.wait();
}

#[test]
fn auto_enhance_replaces_output_and_keeps_raw_artifact() {
    let harness = TestHarness::new();
    let enhancer = EnhancerScript::prefixing("enhanced: ");
    let seen_instructions = enhancer.seen_instructions.clone();
    let svc = harness.start_service(scripted_factory(
        TranscriberScript::returning("raw words"),
        enhancer,
    ));

    let audio = harness.write_audio("talk.mp3");
    let job = svc
        .create_transcription(
            &audio,
            JobOptions {
                auto_enhance: true,
                enhancement_prompt: Some("make it formal".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let done = harness.wait_for_terminal(&svc, job.id);
    assert_eq!(done.status, JobStatus::Completed);

    let output = done.output_file.unwrap();
    assert!(output.ends_with(&format!("talk_{}_enhanced.md", job.id)));

    let enhanced = harness.read_artifact(&output);
    assert!(enhanced.starts_with("# Enhanced Transcript: talk\n"));
    assert!(enhanced.contains("**Enhanced:** Yes (scripted-llm)"));
    assert!(enhanced.contains("enhanced: raw words"));

    // The raw transcript is persisted alongside the enhanced artifact.
    let raw_path = harness
        .output_dir
        .join(format!("talk_{}.md", job.id));
    assert!(raw_path.is_file());
    assert!(harness
        .read_artifact(raw_path.to_str().unwrap())
        .contains("raw words"));

    // The custom instruction reached the enhancement delegate.
    assert_eq!(
        seen_instructions.lock().unwrap().as_slice(),
        &[Some("make it formal".to_string())]
    );

    svc.wait();
}

#[test]
fn auto_enhance_failure_fails_the_transcription_job() {
    let harness = TestHarness::new();
    let svc = harness.start_service(scripted_factory(
        TranscriberScript::returning("raw words"),
        EnhancerScript::failing("quota exceeded"),
    ));

    let audio = harness.write_audio("talk.mp3");
    let job = svc
        .create_transcription(
            &audio,
            JobOptions {
                auto_enhance: true,
                ..Default::default()
            },
        )
        .unwrap();

    let done = harness.wait_for_terminal(&svc, job.id);
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.output_file.is_none());
    assert!(done.error_message.unwrap().contains("quota exceeded"));
    // Transcription itself got as far as the persistence checkpoint.
    assert_eq!(done.progress, 90.0);

    svc.wait();
}

#[test]
fn chained_enhancement_runs_on_persisted_artifact() {
    let harness = TestHarness::new();
    let svc = harness.start_service(default_factory());

    let audio = harness.write_audio("standup.mp3");
    let source = svc
        .create_transcription(
            &audio,
            JobOptions {
                enable_timestamp: true,
                ..Default::default()
            },
        )
        .unwrap();
    let source = harness.wait_for_terminal(&svc, source.id);
    let source_artifact = source.output_file.unwrap();

    let enhance = svc
        .create_enhancement(source.id, JobOptions::default())
        .unwrap();
    assert_eq!(enhance.job_type, JobType::Enhance);
    assert_eq!(enhance.input_file, source_artifact);

    let done = harness.wait_for_terminal(&svc, enhance.id);
    assert_eq!(done.status, JobStatus::Completed);

    let result = svc.get_result(done.id).unwrap();
    // Only the body was enhanced; the source header never reached the
    // delegate, and the source metadata carries over.
    assert_eq!(result.content, "enhanced: raw words");
    assert_eq!(result.meta.source, "standup.mp3");
    assert!(result.meta.timestamps);
    assert_eq!(result.meta.enhanced_by.as_deref(), Some("scripted-llm"));

    // Enhanced filename derives from the source stem, not the artifact name.
    assert!(result
        .output_file
        .ends_with(&format!("standup_{}_enhanced.md", done.id)));

    // The source job and its artifact are untouched.
    harness.assert_status(source.id, JobStatus::Completed);
    assert!(Path::new(&source_artifact).is_file());

    svc.wait();
}

#[test]
fn restart_resolves_stranded_processing_jobs() {
    let harness = TestHarness::new();

    let stranded = harness.insert_raw(&Job::transcription("/tmp/gone.mp3", JobOptions::default()));
    harness.strand_processing(stranded, 42.0);

    // Pool startup stands in for a process restart.
    let svc = harness.start_service(default_factory());

    let job = harness.reload(stranded);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(INTERRUPTED_REASON));
    assert_eq!(job.progress, 42.0);
    assert!(job.completed_at.is_some());

    svc.wait();
}

#[test]
fn retry_of_interrupted_job_creates_fresh_attempt() {
    let harness = TestHarness::new();

    let audio = harness.write_audio("retry me.mp3");
    let stranded = harness.insert_raw(&Job::transcription(
        audio.to_string_lossy().into_owned(),
        JobOptions::default(),
    ));
    harness.strand_processing(stranded, 55.0);

    let svc = harness.start_service(default_factory());
    harness.assert_status(stranded, JobStatus::Failed);

    let fresh = svc.retry_job(stranded).unwrap();
    assert_ne!(fresh.id, stranded);
    assert_eq!(fresh.input_file, audio.to_string_lossy());

    let fresh = harness.wait_for_terminal(&svc, fresh.id);
    assert_eq!(fresh.status, JobStatus::Completed);

    // The failed attempt is immutable history.
    let original = harness.reload(stranded);
    assert_eq!(original.status, JobStatus::Failed);
    assert_eq!(original.progress, 55.0);

    svc.wait();
}

#[test]
fn listing_filters_and_paginates_newest_first() {
    let harness = TestHarness::new();
    let svc = harness.start_service(default_factory());

    let mut ids = Vec::new();
    for name in ["a.mp3", "b.mp3", "c.mp3"] {
        let audio = harness.write_audio(name);
        let job = svc.create_transcription(&audio, JobOptions::default()).unwrap();
        ids.push(job.id);
        harness.wait_for_terminal(&svc, job.id);
    }
    let failing = harness.insert_raw(&Job::enhancement("/tmp/none.md", JobOptions::default()));
    harness.strand_processing(failing, 20.0);
    scriven::worker::recovery::sweep(&harness.db).unwrap();

    let (all, total) = svc.list_jobs(&JobFilter::default()).unwrap();
    assert_eq!(total, 4);
    assert_eq!(all.len(), 4);

    let (completed, total) = svc
        .list_jobs(&JobFilter {
            status: Some(JobStatus::Completed),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(total, 3);
    assert!(completed.iter().all(|j| j.status == JobStatus::Completed));
    // Newest first, with the id as tiebreaker for equal timestamps.
    assert!(completed.windows(2).all(|w| w[0].id > w[1].id));

    let (page, total) = svc
        .list_jobs(&JobFilter {
            status: Some(JobStatus::Completed),
            limit: Some(2),
            offset: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, ids[0]);

    let (enhancements, _) = svc
        .list_jobs(&JobFilter {
            job_type: Some(JobType::Enhance),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(enhancements.len(), 1);
    assert_eq!(enhancements[0].id, failing);

    svc.wait();
}

#[test]
fn events_stream_the_full_lifecycle() {
    let harness = TestHarness::new();
    let (tx, mut rx) = events::channel(64);
    let svc = harness.start_service_with_events(default_factory(), tx);

    let audio = harness.write_audio("live.mp3");
    let job = svc.create_transcription(&audio, JobOptions::default()).unwrap();
    harness.wait_for_terminal(&svc, job.id);

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.job_id, job.id);
        phases.push((event.phase, event.progress));
    }

    assert_eq!(phases.first().map(|p| p.0), Some(JobPhase::Queued));
    assert_eq!(phases.last(), Some(&(JobPhase::Completed, 100.0)));
    assert!(phases.iter().any(|p| p.0 == JobPhase::Started));

    // Progress events arrive in non-decreasing order.
    let progress: Vec<f64> = phases
        .iter()
        .filter(|p| p.0 == JobPhase::Progress)
        .map(|p| p.1)
        .collect();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    svc.wait();
}

#[test]
fn pool_survives_slot_recycling_under_load() {
    let harness = TestHarness::new();
    // Two slots, recycled after every job.
    let svc = harness.start_service_with(2, 1, default_factory());

    let mut ids = Vec::new();
    for i in 0..6 {
        let audio = harness.write_audio(&format!("clip{}.mp3", i));
        ids.push(
            svc.create_transcription(&audio, JobOptions::default())
                .unwrap()
                .id,
        );
    }

    for _ in 0..ids.len() {
        svc.recv_outcome().unwrap();
    }
    for id in ids {
        harness.assert_status(id, JobStatus::Completed);
    }

    svc.wait();
}
