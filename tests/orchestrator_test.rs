//! Integration tests for build orchestration
//!
//! Runs the orchestrator against a scripted build service. Tests use
//! tokio's paused clock, so poll intervals elapse instantly.

mod common;

use common::{independent, srpm_url, wave, ScriptedBuildService};
use copr_rebuild::core::observer::{BuildObserver, NoopObserver};
use copr_rebuild::core::orchestrator::{BuildOrchestrator, Strategy};
use copr_rebuild::core::package::{BuildId, BuildResult, BuildWave};
use copr_rebuild::core::service::EnvironmentConfig;
use copr_rebuild::core::status::BuildStatus;
use copr_rebuild::error::BuildError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn orchestrator(service: &ScriptedBuildService, strategy: Strategy) -> BuildOrchestrator<'_> {
    BuildOrchestrator::new(service)
        .with_strategy(strategy)
        .with_poll_interval(Duration::from_secs(30))
        .with_observer(Arc::new(NoopObserver))
}

fn two_waves() -> Vec<BuildWave> {
    vec![wave(0, &["a", "b"]), wave(1, &["c"])]
}

/// Observer that records every event as a line
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl BuildObserver for RecordingObserver {
    fn wave_submitted(&self, wave: &BuildWave, build_ids: &[BuildId]) {
        self.push(format!("submitted {} {build_ids:?}", wave.index));
    }

    fn build_finished(&self, result: &BuildResult) {
        self.push(format!("finished {}", result.package_name));
    }

    fn wave_finished(&self, wave: &BuildWave) {
        self.push(format!("wave {}", wave.index));
    }

    fn run_failed(&self, _reason: &str, outstanding: &[(BuildId, Option<BuildStatus>)]) {
        let ids: Vec<BuildId> = outstanding.iter().map(|(id, _)| *id).collect();
        self.push(format!("failed {ids:?}"));
    }
}

// ============================================
// Successful runs
// ============================================

#[tokio::test(start_paused = true)]
async fn test_sequential_two_waves_succeed() {
    let service = ScriptedBuildService::new().with_statuses(
        &srpm_url("c"),
        &["pending", "running", "succeeded"],
    );
    let metadata = independent(&["a", "b", "c"]);

    let results = orchestrator(&service, Strategy::Sequential)
        .execute(&two_waves(), &metadata)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.status == "succeeded"));
    let names: Vec<&str> = results.iter().map(|r| r.package_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(results[2].artifact_location, srpm_url("c"));

    // c was polled three times before it succeeded
    let c_id = service.id_of(&srpm_url("c")).unwrap();
    assert_eq!(service.queries().iter().filter(|id| **id == c_id).count(), 3);
    assert_eq!(service.batch_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_two_waves_succeed() {
    let service = ScriptedBuildService::new().with_statuses(
        &srpm_url("c"),
        &["pending", "running", "succeeded"],
    );
    let metadata = independent(&["a", "b", "c"]);

    let results = orchestrator(&service, Strategy::Batch)
        .execute(&two_waves(), &metadata)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.status == "succeeded"));
    assert_eq!(service.batch_calls(), 1);
    assert_eq!(
        service.submitted(),
        vec![srpm_url("a"), srpm_url("b"), srpm_url("c")]
    );
    assert_eq!(
        results.iter().map(|r| r.build_id).collect::<Vec<_>>(),
        vec![BuildId::new(1), BuildId::new(2), BuildId::new(3)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sequential_waits_for_wave_before_submitting_next() {
    let service = ScriptedBuildService::new()
        .with_statuses(&srpm_url("a"), &["running", "running", "succeeded"]);
    let metadata = independent(&["a", "b", "c"]);

    orchestrator(&service, Strategy::Sequential)
        .execute(&two_waves(), &metadata)
        .await
        .unwrap();

    // every query before c's id was issued belongs to wave 0
    let c_id = service.id_of(&srpm_url("c")).unwrap();
    let queries = service.queries();
    let first_c = queries.iter().position(|id| *id == c_id).unwrap();
    assert_eq!(first_c, 4);
    assert!(queries[..first_c].iter().all(|id| *id < c_id));
}

#[tokio::test(start_paused = true)]
async fn test_forked_and_skipped_count_as_success() {
    let service = ScriptedBuildService::new()
        .with_statuses(&srpm_url("a"), &["forked"])
        .with_statuses(&srpm_url("b"), &["importing", "skipped"]);
    let metadata = independent(&["a", "b"]);

    let results = orchestrator(&service, Strategy::Batch)
        .execute(&[wave(0, &["a", "b"])], &metadata)
        .await
        .unwrap();

    assert_eq!(results[0].status, "forked");
    assert_eq!(results[1].status, "skipped");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_keeps_polling() {
    let service = ScriptedBuildService::new()
        .with_statuses(&srpm_url("a"), &["frobnicating", "succeeded"]);
    let metadata = independent(&["a"]);

    let results = orchestrator(&service, Strategy::Sequential)
        .execute(&[wave(0, &["a"])], &metadata)
        .await
        .unwrap();

    assert_eq!(results[0].status, "succeeded");
    assert_eq!(service.queries().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_plan_submits_nothing() {
    let service = ScriptedBuildService::new();
    let metadata = independent(&[]);

    for strategy in [Strategy::Batch, Strategy::Sequential] {
        let results = orchestrator(&service, strategy)
            .execute(&[], &metadata)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
    assert!(service.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_observer_sees_waves_and_builds() {
    let service = ScriptedBuildService::new();
    let metadata = independent(&["a", "b", "c"]);
    let observer = Arc::new(RecordingObserver::default());

    BuildOrchestrator::new(&service)
        .with_strategy(Strategy::Sequential)
        .with_observer(observer.clone())
        .execute(&two_waves(), &metadata)
        .await
        .unwrap();

    assert_eq!(
        observer.events(),
        vec![
            "submitted 0 [BuildId(1), BuildId(2)]",
            "finished a",
            "finished b",
            "wave 0",
            "submitted 1 [BuildId(3)]",
            "finished c",
            "wave 1",
        ]
    );
}

// ============================================
// Failures
// ============================================

#[tokio::test(start_paused = true)]
async fn test_sequential_failure_stops_before_next_wave() {
    let service = ScriptedBuildService::new()
        .with_statuses(&srpm_url("b"), &["running", "failed"]);
    let metadata = independent(&["a", "b", "c"]);

    let err = orchestrator(&service, Strategy::Sequential)
        .execute(&two_waves(), &metadata)
        .await
        .unwrap_err();

    match err {
        BuildError::BuildFailed {
            build_id,
            package,
            status,
            outstanding,
        } => {
            assert_eq!(build_id, BuildId::new(2));
            assert_eq!(package, "b");
            assert_eq!(status, "failed");
            assert!(outstanding.is_empty());
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert!(!service.submitted().contains(&srpm_url("c")));
}

#[tokio::test(start_paused = true)]
async fn test_batch_failure_reports_failing_build_and_outstanding() {
    let service = ScriptedBuildService::new()
        .with_statuses(&srpm_url("a"), &["running"])
        .with_statuses(&srpm_url("b"), &["running", "failed"])
        .with_statuses(&srpm_url("c"), &["pending"]);
    let metadata = independent(&["a", "b", "c"]);
    let observer = Arc::new(RecordingObserver::default());

    let err = orchestrator(&service, Strategy::Batch)
        .with_observer(observer.clone())
        .execute(&two_waves(), &metadata)
        .await
        .unwrap_err();

    match err {
        BuildError::BuildFailed {
            build_id,
            outstanding,
            ..
        } => {
            assert_eq!(build_id, BuildId::new(2));
            assert_eq!(outstanding, vec![BuildId::new(1), BuildId::new(3)]);
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert_eq!(service.submitted().len(), 3);
    assert_eq!(
        observer.events().last().map(String::as_str),
        Some("failed [BuildId(1), BuildId(3)]")
    );
}

#[tokio::test(start_paused = true)]
async fn test_canceled_build_is_failure() {
    let service = ScriptedBuildService::new().with_statuses(&srpm_url("a"), &["canceled"]);
    let metadata = independent(&["a"]);

    let err = orchestrator(&service, Strategy::Sequential)
        .execute(&[wave(0, &["a"])], &metadata)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::BuildFailed { ref status, .. } if status == "canceled"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_package_fails_before_submission() {
    let service = ScriptedBuildService::new();
    let metadata = independent(&["a"]);

    let err = orchestrator(&service, Strategy::Batch)
        .execute(&[wave(0, &["a"]), wave(1, &["ghost"])], &metadata)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::UnknownPackage { wave: 1, .. }));
    assert!(service.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sequential_submission_error_propagates() {
    let service = ScriptedBuildService::new().rejecting(&srpm_url("c"));
    let metadata = independent(&["a", "b", "c"]);

    let err = orchestrator(&service, Strategy::Sequential)
        .execute(&two_waves(), &metadata)
        .await
        .unwrap_err();

    match err {
        BuildError::Submission(e) => assert!(e.stderr.contains("refused")),
        other => panic!("expected Submission, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_submission_error_reports_created_builds() {
    let service = ScriptedBuildService::new().rejecting(&srpm_url("c"));
    let metadata = independent(&["a", "b", "c"]);
    let waves = vec![wave(0, &["a"]), wave(1, &["b"]), wave(2, &["c"])];
    let observer = Arc::new(RecordingObserver::default());

    let err = orchestrator(&service, Strategy::Batch)
        .with_observer(observer.clone())
        .execute(&waves, &metadata)
        .await
        .unwrap_err();

    match &err {
        BuildError::PartialSubmission { source, submitted } => {
            assert!(source.stderr.contains("refused"));
            assert_eq!(submitted, &vec![BuildId::new(1), BuildId::new(2)]);
        }
        other => panic!("expected PartialSubmission, got {other:?}"),
    }
    assert!(err.to_string().ends_with("(already created: 1, 2)"));
    assert_eq!(observer.events(), vec!["failed [BuildId(1), BuildId(2)]"]);
    assert!(service.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_batch_submission_error_before_any_build() {
    let service = ScriptedBuildService::new().rejecting(&srpm_url("a"));
    let metadata = independent(&["a", "b", "c"]);
    let observer = Arc::new(RecordingObserver::default());

    let err = orchestrator(&service, Strategy::Batch)
        .with_observer(observer.clone())
        .execute(&two_waves(), &metadata)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Submission(_)));
    assert_eq!(observer.events(), vec!["failed []"]);
}

#[tokio::test(start_paused = true)]
async fn test_status_query_error_propagates() {
    let service = ScriptedBuildService::new().with_broken_status(&srpm_url("a"));
    let metadata = independent(&["a"]);

    let err = orchestrator(&service, Strategy::Batch)
        .execute(&[wave(0, &["a"])], &metadata)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Submission(_)));
}

#[tokio::test(start_paused = true)]
async fn test_batch_shape_mismatch_is_rejected() {
    let service = ScriptedBuildService::new().dropping_batch_ids();
    let metadata = independent(&["a", "b", "c"]);

    let err = orchestrator(&service, Strategy::Batch)
        .execute(&two_waves(), &metadata)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::BatchMismatch {
            wave: 1,
            expected: 1,
            got: 0
        }
    ));
    assert!(service.queries().is_empty());
}

// ============================================
// Cancellation
// ============================================

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_polling() {
    let service = ScriptedBuildService::new()
        .with_statuses(&srpm_url("a"), &["running"])
        .with_statuses(&srpm_url("b"), &["succeeded"]);
    let metadata = independent(&["a", "b"]);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(95)).await;
        trigger.cancel();
    });

    let err = orchestrator(&service, Strategy::Batch)
        .with_cancellation(cancel)
        .execute(&[wave(0, &["a", "b"])], &metadata)
        .await
        .unwrap_err();

    match err {
        BuildError::Cancelled { outstanding } => assert_eq!(outstanding, vec![BuildId::new(1)]),
        other => panic!("expected Cancelled, got {other:?}"),
    }
    // polls at 0s, 30s, 60s and 90s
    let a_polls = service
        .queries()
        .iter()
        .filter(|id| **id == BuildId::new(1))
        .count();
    assert_eq!(a_polls, 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start_submits_nothing() {
    let service = ScriptedBuildService::new();
    let metadata = independent(&["a"]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator(&service, Strategy::Sequential)
        .with_cancellation(cancel)
        .execute(&[wave(0, &["a"])], &metadata)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Cancelled { ref outstanding } if outstanding.is_empty()));
    assert!(service.submitted().is_empty());
}

// ============================================
// Environment configuration
// ============================================

#[tokio::test]
async fn test_configure_environments_skips_empty_config() {
    let service = ScriptedBuildService::new();
    let chroots = vec!["epel-9-x86_64".to_string()];

    orchestrator(&service, Strategy::Batch)
        .configure_environments(&chroots, &EnvironmentConfig::default())
        .await
        .unwrap();

    assert!(service.configured().is_empty());
}

#[tokio::test]
async fn test_configure_environments_applies_to_each_chroot() {
    let service = ScriptedBuildService::new();
    let chroots = vec!["epel-9-x86_64".to_string(), "epel-9-aarch64".to_string()];
    let config = EnvironmentConfig {
        packages: vec!["python3-devel".to_string()],
        rpmbuild_without: Vec::new(),
    };

    orchestrator(&service, Strategy::Batch)
        .configure_environments(&chroots, &config)
        .await
        .unwrap();

    let configured = service.configured();
    assert_eq!(configured.len(), 2);
    assert_eq!(configured[1].0, "epel-9-aarch64");
    assert_eq!(configured[1].1, config);
}
