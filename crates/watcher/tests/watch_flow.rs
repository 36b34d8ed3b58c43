//! End-to-end watcher tests against a live relay.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use verifyflow_core::{CoreError, JobId, WatcherState, TRANSACTIONS_UPDATED};
use verifyflow_watcher::{StartOutcome, WatchExit, Watcher, WatcherConfig, WatcherError};

use common::{eventually, RecordingHost, TestRelay, JOB};

fn job() -> JobId {
    JobId::new(JOB)
}

fn push_watcher(relay: &TestRelay) -> (Watcher<RecordingHost>, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::default());
    let watcher = Watcher::new(WatcherConfig::push(relay.base_url()), Arc::clone(&host)).unwrap();
    (watcher, host)
}

fn poll_watcher(relay: &TestRelay) -> (Watcher<RecordingHost>, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::default());
    let config = WatcherConfig::poll(relay.base_url(), Duration::from_millis(50));
    let watcher = Watcher::new(config, Arc::clone(&host)).unwrap();
    (watcher, host)
}

// ---------------------------------------------------------------------------
// Push transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn push_completes_once_despite_duplicate_callbacks() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = push_watcher(&relay);

    assert_eq!(watcher.start(Some(job())).unwrap(), StartOutcome::Watching(job()));
    relay.wait_for_sessions(1).await;

    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": JOB})).await;
    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": JOB})).await;

    let exit = tokio::time::timeout(Duration::from_secs(5), watcher.wait())
        .await
        .expect("watch should finish");
    assert_matches!(exit, Some(WatchExit::Completed(c)) if c.job_id == job());

    assert_eq!(watcher.state(), WatcherState::Completed { job_id: job() });
    assert_eq!(watcher.progress(), 100);
    assert!(watcher.can_continue());

    // Completion tears the session down.
    relay.wait_for_sessions(0).await;
    assert_eq!(host.completions(), vec![job()]);
}

#[tokio::test]
async fn irrelevant_events_keep_waiting() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = push_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    relay.wait_for_sessions(1).await;

    relay.post(json!({"eventTypeId": "accounts.updated", "jobId": JOB})).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(host.completions().is_empty());
    assert_eq!(watcher.state(), WatcherState::AwaitingEvent { job_id: job() });
    assert_eq!(watcher.progress(), 0);
    assert!(watcher.is_subscribed());

    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED})).await;
    eventually(|| host.completions().len() == 1).await;
}

#[tokio::test]
async fn completion_for_another_job_is_ignored() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = push_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    relay.wait_for_sessions(1).await;

    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": "someone-elses-job"})).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(host.completions().is_empty());
    assert_eq!(watcher.state(), WatcherState::AwaitingEvent { job_id: job() });
    assert!(watcher.is_subscribed());

    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": JOB})).await;
    eventually(|| host.completions().len() == 1).await;
}

#[tokio::test]
async fn stale_completion_for_another_job_does_not_finish_new_watch() {
    let relay = TestRelay::spawn().await;
    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": "someone-elses-job"})).await;

    let (mut watcher, host) = push_watcher(&relay);
    watcher.start(Some(job())).unwrap();
    relay.wait_for_sessions(1).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(host.completions().is_empty());
    assert_eq!(watcher.state(), WatcherState::AwaitingEvent { job_id: job() });
    watcher.stop().await;
}

#[tokio::test]
async fn push_connect_catches_event_delivered_earlier() {
    let relay = TestRelay::spawn().await;
    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": JOB})).await;

    let (mut watcher, host) = push_watcher(&relay);
    watcher.start(Some(job())).unwrap();

    let exit = tokio::time::timeout(Duration::from_secs(5), watcher.wait())
        .await
        .expect("watch should finish");
    assert_matches!(exit, Some(WatchExit::Completed(_)));
    assert_eq!(host.completions(), vec![job()]);
}

#[tokio::test]
async fn stop_releases_push_session() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = push_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    relay.wait_for_sessions(1).await;

    assert_eq!(watcher.stop().await, Some(WatchExit::Cancelled));
    assert!(!watcher.is_subscribed());
    relay.wait_for_sessions(0).await;

    // Events after teardown are not observed.
    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(host.completions().is_empty());
}

#[tokio::test]
async fn dropping_watcher_releases_push_session() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, _host) = push_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    relay.wait_for_sessions(1).await;

    drop(watcher);
    relay.wait_for_sessions(0).await;
}

// ---------------------------------------------------------------------------
// Poll transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_completes_on_matching_latest_event() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = poll_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    assert_eq!(relay.sessions().await, 0);

    relay.post(json!({"eventTypeId": "accounts.updated"})).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(host.completions().is_empty());

    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": JOB})).await;
    eventually(|| host.completions().len() == 1).await;
    eventually(|| !watcher.is_subscribed()).await;

    // The stored event is still there, but polling has stopped.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(host.completions(), vec![job()]);
}

// ---------------------------------------------------------------------------
// Host interaction and lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_job_id_stays_idle_and_warns() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = push_watcher(&relay);

    let job_id = JobId::from_query("?state=abc");
    assert_eq!(watcher.start(job_id).unwrap(), StartOutcome::MissingJobId);

    assert_eq!(watcher.state(), WatcherState::Idle);
    assert_eq!(host.warnings(), 1);
    assert!(!watcher.is_subscribed());

    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(host.completions().is_empty());
    assert_eq!(relay.sessions().await, 0);
}

#[tokio::test]
async fn error_then_retry_resubscribes_once() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = push_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    relay.wait_for_sessions(1).await;

    assert!(watcher.report_error("Institution connection failed"));
    assert_matches!(watcher.state(), WatcherState::Failed { reason, .. } if reason == "Institution connection failed");
    assert!(watcher.can_retry());
    relay.wait_for_sessions(0).await;

    assert_eq!(watcher.retry(Some(job())).await.unwrap(), StartOutcome::Watching(job()));
    relay.wait_for_sessions(1).await;

    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": JOB})).await;
    eventually(|| host.completions().len() == 1).await;
    relay.wait_for_sessions(0).await;
    assert_eq!(host.completions(), vec![job()]);
}

#[tokio::test]
async fn retry_only_allowed_after_failure() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, _host) = push_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    assert_matches!(
        watcher.retry(Some(job())).await,
        Err(WatcherError::Core(CoreError::InvalidTransition { action: "retry", .. }))
    );
    watcher.stop().await;
}

#[tokio::test]
async fn completion_is_terminal() {
    let relay = TestRelay::spawn().await;
    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": JOB})).await;

    let (mut watcher, host) = poll_watcher(&relay);
    watcher.start(Some(job())).unwrap();
    assert_matches!(watcher.wait().await, Some(WatchExit::Completed(_)));

    // A late error does not undo completion, and the step cannot restart.
    assert!(!watcher.report_error("late failure"));
    assert_eq!(watcher.state(), WatcherState::Completed { job_id: job() });
    assert_matches!(
        watcher.start(Some(job())),
        Err(WatcherError::Core(CoreError::InvalidTransition { action: "begin", .. }))
    );
    assert_eq!(host.completions().len(), 1);
}

#[tokio::test]
async fn poll_ignores_stored_completion_from_earlier_attempt() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = poll_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    assert!(watcher.report_error("bank declined"));
    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": "old-attempt"})).await;

    watcher.retry(Some(job())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(watcher.state(), WatcherState::AwaitingEvent { job_id: job() });
    assert!(host.completions().is_empty());
    watcher.stop().await;
}

#[tokio::test]
async fn retry_never_overlaps_push_sessions() {
    let relay = TestRelay::spawn().await;
    let (mut watcher, host) = push_watcher(&relay);

    watcher.start(Some(job())).unwrap();
    relay.wait_for_sessions(1).await;

    let peak = Arc::new(AtomicUsize::new(0));
    let sampler = {
        let peak = Arc::clone(&peak);
        let ws_manager = Arc::clone(&relay.state.ws_manager);
        tokio::spawn(async move {
            loop {
                peak.fetch_max(ws_manager.connection_count().await, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    for attempt in 1..=3 {
        assert!(watcher.report_error(format!("attempt {attempt} failed")));
        watcher.retry(Some(job())).await.unwrap();
        relay.wait_for_sessions(1).await;
    }
    sampler.abort();

    assert_eq!(peak.load(Ordering::SeqCst), 1);

    relay.post(json!({"eventTypeId": TRANSACTIONS_UPDATED, "jobId": JOB})).await;
    eventually(|| host.completions().len() == 1).await;
    assert_eq!(host.completions(), vec![job()]);
}
