//! Scheduler timing and serialization, driven on paused tokio time.

use alloy::primitives::U256;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceExt;

use harvest_keeper::engine::PipelineSettings;
use harvest_keeper::scheduler::Scheduler;
use harvest_keeper::status::build_router;

use super::mock_engine::{MockEngine, ReceiptPlan};

const INTERVAL: Duration = Duration::from_secs(60);

fn close_to(actual: Duration, expected: Duration) -> bool {
    actual >= expected && actual <= expected + Duration::from_millis(5)
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_immediate_then_every_interval() {
    let engine = MockEngine::shared();
    let started = Instant::now();

    let handle = Scheduler::new(engine.clone(), &PipelineSettings::default(), INTERVAL).spawn();
    tokio::time::sleep(Duration::from_secs(150)).await;
    let state = handle.stop().await.unwrap();

    let calls = engine.balance_calls_at();
    assert_eq!(calls.len(), 3, "ticks at 0s, 60s and 120s");
    assert!(close_to(calls[0] - started, Duration::ZERO));
    assert!(close_to(calls[1] - calls[0], INTERVAL));
    assert!(close_to(calls[2] - calls[1], INTERVAL));
    assert_eq!(state.harvest_count(), 3);
    assert_eq!(state.total_bounty_earned(), U256::from(3_000_000u64));
}

#[tokio::test(start_paused = true)]
async fn test_slow_confirmation_never_overlaps() {
    let engine = MockEngine::shared();
    engine.set_confirmation_delay(Duration::from_secs(150));

    let handle = Scheduler::new(engine.clone(), &PipelineSettings::default(), INTERVAL).spawn();
    tokio::time::sleep(Duration::from_secs(620)).await;
    let state = handle.stop().await.unwrap();

    assert_eq!(engine.max_in_flight(), 1);

    let windows = engine.windows();
    let ticks = engine.balance_calls_at();
    assert!(windows.len() >= 3, "got {} windows", windows.len());
    // An overlapping scheduler would have started one attempt per interval.
    assert!(windows.len() < 620 / 60);
    assert_eq!(ticks.len(), windows.len());

    for pair in windows.windows(2) {
        assert!(pair[1].sent_at >= pair[0].confirmed_at);
    }
    for (window, next_tick) in windows.iter().zip(ticks.iter().skip(1)) {
        assert!(*next_tick >= window.confirmed_at, "tick started before previous attempt finished");
    }

    // Shutdown lets the in-flight attempt finish and record.
    assert_eq!(state.harvest_count() as usize, windows.len());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_marks_in_flight_attempt() {
    let engine = MockEngine::shared();
    engine.set_confirmation_delay(Duration::from_secs(150));

    let handle = Scheduler::new(engine.clone(), &PipelineSettings::default(), INTERVAL).spawn();
    tokio::time::sleep(Duration::from_secs(10)).await;

    {
        let snap = handle.snapshots().borrow().clone();
        assert!(snap.in_flight);
        assert_eq!(snap.ticks, 0);
        assert_eq!(engine.counts().send, 1);
        assert_eq!(engine.counts().wait, 1);
    }

    // The ticks missed while confirming collapse into one that starts
    // as soon as the first attempt is recorded.
    tokio::time::sleep(Duration::from_secs(150)).await;
    let snap = handle.snapshots().borrow().clone();
    assert_eq!(snap.ticks, 1);
    assert_eq!(snap.harvest_count, 1);
    assert!(snap.in_flight);
    assert_eq!(engine.counts().send, 2);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_does_not_stop_loop() {
    let engine = MockEngine::shared();
    engine.fail_next("simulate", "upstream timeout");

    let handle = Scheduler::new(engine.clone(), &PipelineSettings::default(), INTERVAL).spawn();
    let mut snapshots = handle.snapshots();
    let snap = snapshots.wait_for(|s| s.ticks >= 2).await.unwrap().clone();

    assert_eq!(snap.recent[0].outcome.label(), "errored");
    assert_eq!(snap.recent[1].outcome.label(), "harvested");
    assert_eq!(snap.harvest_count, 1);

    let state = handle.stop().await.unwrap();
    assert!(state.harvest_count() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_endpoint_follows_scheduler() {
    let engine = MockEngine::shared();
    engine.script_receipts(&[ReceiptPlan::Success(Some(1_000_000)), ReceiptPlan::Revert]);

    let interval = Duration::from_secs(3600);
    let handle = Scheduler::new(engine.clone(), &PipelineSettings::default(), interval).spawn();
    let mut snapshots = handle.snapshots();
    snapshots.wait_for(|s| s.ticks >= 2).await.unwrap();

    let resp = build_router(handle.snapshots())
        .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["harvest_count"], 1);
    assert_eq!(json["total_bounty_earned"], "1000000");
    assert_eq!(json["last_outcome"], "reverted");
    assert_eq!(json["recent_failures"], 1);

    let router = build_router(handle.snapshots());
    handle.stop().await.unwrap();

    // Scheduler gone: health reports unavailable.
    let resp = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
