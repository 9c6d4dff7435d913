#![allow(clippy::unwrap_used)]
// Integration tests for the job manager: phases, isolation, async dispatch.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use alarmflow_core::{
    ContextParameters, JobContext, JobManager, JobPhase, MemoryOperationStore, Operation,
    OperationId, PluginRegistry,
};
use pretty_assertions::assert_eq;

use common::{Behavior, CallLog, RecordingJob, call_log, engine_config, register_job, services};

// ── Helpers ─────────────────────────────────────────────────────────

fn manager(jobs: &[(&str, bool, Behavior)], enabled: &[&str], log: &CallLog) -> JobManager {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryOperationStore::new());
    let mut registry = common::registry(&store);
    for (name, asynchronous, behavior) in jobs {
        register_job(&mut registry, name, *asynchronous, *behavior, log);
    }
    let services = services(registry, engine_config(dir.path(), enabled), &store);
    JobManager::initialize(&services).unwrap()
}

fn context(phase: JobPhase) -> JobContext {
    JobContext::new("fax", ContextParameters::new(), phase)
}

fn stored_operation() -> Operation {
    let mut op = Operation::new();
    op.id = Some(OperationId(1));
    op.messenger = Some("ILS".into());
    op
}

fn names(log: &CallLog) -> Vec<String> {
    log.calls().into_iter().map(|c| c.job).collect()
}

// ── Isolation ───────────────────────────────────────────────────────

#[test]
fn test_failing_job_does_not_stop_siblings() {
    let log = call_log();
    let jobs = manager(
        &[
            ("first", false, Behavior::Succeed),
            ("second", false, Behavior::Fail),
            ("third", false, Behavior::Succeed),
        ],
        &["first", "second", "third"],
        &log,
    );

    jobs.execute_jobs(&context(JobPhase::AfterOperationStored), &mut stored_operation());
    assert_eq!(names(&log), vec!["first", "second", "third"]);
    jobs.dispose();
}

#[test]
fn test_panicking_job_is_contained() {
    let log = call_log();
    let jobs = manager(
        &[
            ("first", false, Behavior::Succeed),
            ("second", false, Behavior::Panic),
            ("third", false, Behavior::Succeed),
        ],
        &["first", "second", "third"],
        &log,
    );

    let (_, logs) = common::capture_logs(|| {
        jobs.execute_jobs(&context(JobPhase::AfterOperationStored), &mut stored_operation());
    });
    assert_eq!(names(&log), vec!["first", "second", "third"]);
    assert!(logs.contains("job panicked"), "{logs}");
    assert!(logs.contains("second"), "{logs}");
    assert!(logs.contains("AfterOperationStored"), "{logs}");
    jobs.dispose();
}

#[test]
fn test_jobs_run_in_registration_order() {
    let log = call_log();
    let jobs = manager(
        &[
            ("a", false, Behavior::Succeed),
            ("b", false, Behavior::Succeed),
        ],
        &["b", "a", "b"],
        &log,
    );
    assert_eq!(jobs.active_jobs(), vec!["a".to_owned(), "b".to_owned()]);

    jobs.execute_jobs(&context(JobPhase::AfterOperationStored), &mut stored_operation());
    assert_eq!(names(&log), vec!["a", "b"]);
    jobs.dispose();
}

#[test]
fn test_unregistered_job_alias_is_logged() {
    let log = call_log();
    let (jobs, logs) = common::capture_logs(|| {
        manager(&[("a", false, Behavior::Succeed)], &["pager", "a"], &log)
    });
    assert_eq!(jobs.active_jobs(), vec!["a".to_owned()]);
    assert!(logs.contains("no job registered"), "{logs}");
    assert!(logs.contains("pager"), "{logs}");
    jobs.dispose();
}

// ── Operation changes ───────────────────────────────────────────────

#[test]
fn test_successful_sync_job_may_enrich_operation() {
    let log = call_log();
    let jobs = manager(&[("enricher", false, Behavior::Mutate)], &["enricher"], &log);

    let mut op = Operation::new();
    jobs.execute_jobs(&context(JobPhase::OnOperationSurfaced), &mut op);
    assert_eq!(op.messenger.as_deref(), Some("enriched by enricher"));
    jobs.dispose();
}

#[test]
fn test_failing_job_leaves_operation_untouched() {
    let log = call_log();
    let jobs = manager(&[("broken", false, Behavior::MutateThenFail)], &["broken"], &log);

    let mut op = stored_operation();
    jobs.execute_jobs(&context(JobPhase::OnOperationSurfaced), &mut op);
    assert_eq!(op.messenger.as_deref(), Some("ILS"));
    jobs.dispose();
}

#[test]
fn test_async_job_changes_are_not_observed() {
    let log = call_log();
    let jobs = manager(&[("background", true, Behavior::Mutate)], &["background"], &log);

    let mut op = stored_operation();
    jobs.execute_jobs(&context(JobPhase::OnOperationSurfaced), &mut op);
    assert!(common::wait_for(Duration::from_secs(5), || log.calls().len() == 1));
    assert_eq!(op.messenger.as_deref(), Some("ILS"));
    jobs.dispose();
}

// ── Async dispatch ──────────────────────────────────────────────────

#[test]
fn test_async_job_does_not_block_caller() {
    let log = call_log();
    let jobs = manager(
        &[
            ("slow", true, Behavior::Sleep(Duration::from_secs(2))),
            ("fast", false, Behavior::Succeed),
        ],
        &["slow", "fast"],
        &log,
    );

    let started = Instant::now();
    jobs.execute_jobs(&context(JobPhase::AfterOperationStored), &mut stored_operation());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(names(&log), vec!["fast"]);

    assert!(common::wait_for(Duration::from_secs(5), || log.calls().len() == 2));
    jobs.dispose();
}

#[test]
fn test_failing_async_job_is_contained() {
    let log = call_log();
    let jobs = manager(
        &[
            ("bad", true, Behavior::Panic),
            ("good", true, Behavior::Succeed),
        ],
        &["bad", "good"],
        &log,
    );

    jobs.execute_jobs(&context(JobPhase::AfterOperationStored), &mut stored_operation());
    assert!(common::wait_for(Duration::from_secs(5), || log.calls().len() == 2));
    jobs.dispose();
}

#[test]
fn test_async_jobs_are_skipped_after_dispose() {
    let log = call_log();
    let jobs = manager(&[("background", true, Behavior::Succeed)], &["background"], &log);
    jobs.dispose();

    jobs.execute_jobs(&context(JobPhase::AfterOperationStored), &mut stored_operation());
    std::thread::sleep(Duration::from_millis(50));
    assert!(log.calls().is_empty());
}

// ── Loading & lifecycle ─────────────────────────────────────────────

#[test]
fn test_unusable_jobs_are_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let log = call_log();
    let store = Arc::new(MemoryOperationStore::new());
    let mut registry: PluginRegistry = common::registry(&store);
    register_job(&mut registry, "good", false, Behavior::Succeed, &log);
    let declining = Arc::clone(&log);
    registry.jobs.register("declining", move |_| {
        let mut job = RecordingJob::new("declining", &declining);
        job.ready = false;
        Ok(Box::new(job))
    });
    registry
        .jobs
        .register("exploding", |_| panic!("constructor crashed"));

    let services = services(
        registry,
        engine_config(dir.path(), &["declining", "exploding", "missing", "export", "good"]),
        &store,
    );
    let jobs = JobManager::initialize(&services).unwrap();

    // `export` has no directory configured and is dropped as well.
    assert_eq!(jobs.active_jobs(), vec!["good".to_owned()]);
    jobs.dispose();
}

#[test]
fn test_dispose_reaches_every_job_and_clears_list() {
    let log = call_log();
    let jobs = manager(
        &[
            ("a", false, Behavior::Succeed),
            ("b", true, Behavior::Succeed),
        ],
        &["a", "b"],
        &log,
    );

    jobs.dispose();
    assert_eq!(log.disposed(), vec!["a".to_owned(), "b".to_owned()]);
    assert!(jobs.active_jobs().is_empty());
}

#[test]
fn test_reconfigure_swaps_job_set() {
    let log = call_log();
    let jobs = manager(
        &[
            ("a", false, Behavior::Succeed),
            ("b", false, Behavior::Succeed),
            ("c", false, Behavior::Succeed),
        ],
        &["a", "b"],
        &log,
    );

    jobs.reconfigure(&["b".to_owned(), "c".to_owned()]);
    assert_eq!(jobs.active_jobs(), vec!["b".to_owned(), "c".to_owned()]);
    assert_eq!(log.disposed(), vec!["a".to_owned()]);

    jobs.execute_jobs(&context(JobPhase::AfterOperationStored), &mut stored_operation());
    assert_eq!(names(&log), vec!["b", "c"]);
    jobs.dispose();
}
