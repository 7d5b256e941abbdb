//! SyncActor behavior tests
//!
//! Run on a paused tokio clock: sleeping in the test advances virtual time
//! and fires the actor's deadlines deterministically. `stats()` is used as
//! a barrier, since the actor answers it only after every earlier command.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{sleep, Instant};

use super::*;
use crate::config::SyncConfig;
use crate::easing::{Algorithm, Curve};
use crate::state::Value;
use crate::transport::{ConsoleTransport, InboundMessage, OutboundCommand};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn test_config() -> SyncConfig {
    SyncConfig {
        fade_tick_ms: 100,
        request_timeout_ms: 200,
        request_concurrency: 100,
        debounce_wait_ms: 100,
        debounce_max_wait_ms: 500,
        heartbeat_interval_ms: 9000,
        subscription_timeout_ms: 10000,
        subscribe_address: "/xremote".to_string(),
    }
}

fn spawn(config: SyncConfig) -> (SyncHandle, Arc<ConsoleTransport>) {
    let transport = Arc::new(ConsoleTransport::new("test").recording());
    let handle = SyncActor::spawn(&config, transport.clone());
    (handle, transport)
}

async fn barrier(handle: &SyncHandle) -> SyncStats {
    handle.stats().await.expect("actor alive")
}

fn values(commands: &[OutboundCommand]) -> Vec<Value> {
    commands.iter().filter_map(|c| c.value.clone()).collect()
}

// ============================================================================
// Request coordination
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_duplicate_ensure_loaded_sends_one_query() {
    let (handle, transport) = spawn(test_config());

    for _ in 0..50 {
        handle.ensure_loaded("/ch/01/mix/fader");
    }
    let stats = barrier(&handle).await;

    let sent = transport.sent_to("/ch/01/mix/fader");
    assert_eq!(sent, vec![OutboundCommand::query("/ch/01/mix/fader".into())]);
    assert_eq!(stats.pending_queries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_emits_one_failure_and_allows_retry() {
    let (handle, transport) = spawn(test_config());
    let mut failures = handle.subscribe_failures();

    handle.ensure_loaded("/ch/01/mix/fader");
    barrier(&handle).await;

    sleep(ms(250)).await;

    let failure = failures.try_recv().unwrap();
    assert_eq!(failure.address.as_str(), "/ch/01/mix/fader");
    assert!(failure.waited >= ms(200) && failure.waited < ms(202));
    assert!(!failure.traffic_seen);
    assert!(matches!(failures.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(barrier(&handle).await.pending_queries, 0);

    // Retry is the caller's call, and issues a fresh query
    handle.ensure_loaded("/ch/01/mix/fader");
    assert_eq!(barrier(&handle).await.pending_queries, 1);
    assert_eq!(transport.sent_to("/ch/01/mix/fader").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reply_resolves_query_before_timeout() {
    let (handle, _transport) = spawn(test_config());
    let mut failures = handle.subscribe_failures();

    handle.ensure_loaded("/ch/01/mix/fader");
    sleep(ms(50)).await;
    handle.on_message(InboundMessage::new("/ch/01/mix/fader", Value::Float(0.5)));

    assert_eq!(handle.get("/ch/01/mix/fader").await, Some(Value::Float(0.5)));
    assert_eq!(barrier(&handle).await.pending_queries, 0);

    sleep(ms(500)).await;
    assert!(matches!(failures.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_queues_queries() {
    let mut config = test_config();
    config.request_concurrency = 2;
    let (handle, transport) = spawn(config);

    handle.ensure_loaded("/a");
    handle.ensure_loaded("/b");
    handle.ensure_loaded("/c");
    let stats = barrier(&handle).await;
    assert_eq!(stats.pending_queries, 2);
    assert_eq!(stats.queued_queries, 1);
    assert!(transport.sent_to("/c").is_empty());

    handle.on_message(InboundMessage::new("/a", Value::Int(1)));
    let stats = barrier(&handle).await;
    assert_eq!(transport.sent_to("/c").len(), 1);
    assert_eq!(stats.pending_queries, 2);
    assert_eq!(stats.queued_queries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_queued_query_admitted_after_timeout() {
    let mut config = test_config();
    config.request_concurrency = 1;
    let (handle, transport) = spawn(config);
    let mut failures = handle.subscribe_failures();

    handle.ensure_loaded("/a");
    handle.ensure_loaded("/b");
    barrier(&handle).await;
    assert!(transport.sent_to("/b").is_empty());

    sleep(ms(210)).await;
    assert_eq!(failures.try_recv().unwrap().address.as_str(), "/a");
    assert_eq!(transport.sent_to("/b").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_set_sends_value_then_confirmation_query() {
    let (handle, transport) = spawn(test_config());

    handle.set("/ch/01/mix/on", Value::Int(1));
    barrier(&handle).await;

    assert_eq!(
        transport.sent_to("/ch/01/mix/on"),
        vec![
            OutboundCommand::set("/ch/01/mix/on".into(), Value::Int(1)),
            OutboundCommand::query("/ch/01/mix/on".into()),
        ]
    );
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_linear_fade_sends_each_step_once() {
    let (handle, transport) = spawn(test_config());
    let t0 = Instant::now();

    handle.run_transition(
        TransitionRequest::new("/ch/01/mix/fader", Value::Int(10), ms(1000))
            .from_value(Value::Int(0))
            .easing(Algorithm::Linear, Curve::EaseInOut),
    );
    sleep(ms(1100)).await;

    let sent = transport.sent();
    let expected: Vec<Value> = (1..=10).map(Value::Int).collect();
    assert_eq!(values(&transport.sent_to("/ch/01/mix/fader")), expected);
    assert_eq!(sent.len(), 10);

    // One step per tick, the last one at the full duration
    let first = sent[0].at.duration_since(t0);
    let last = sent[9].at.duration_since(t0);
    assert!(first >= ms(100) && first < ms(102), "first step at {:?}", first);
    assert!(last >= ms(1000) && last < ms(1010), "last step at {:?}", last);
    assert_eq!(barrier(&handle).await.active_transitions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_fade_supersedes_running_one() {
    let (handle, transport) = spawn(test_config());

    handle.run_transition(
        TransitionRequest::new("/fader", Value::Int(10), ms(1000)).from_value(Value::Int(0)),
    );
    sleep(ms(350)).await;
    assert_eq!(
        values(&transport.sent_to("/fader")),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );

    handle.run_transition(
        TransitionRequest::new("/fader", Value::Int(0), ms(200)).from_value(Value::Int(3)),
    );
    sleep(ms(1000)).await;

    let sent = values(&transport.sent_to("/fader"));
    assert_eq!(&sent[3..], &[Value::Int(2), Value::Int(0)]);
    assert!(sent[3..].iter().all(|v| !matches!(v, Value::Int(n) if *n > 3)));
    assert_eq!(sent.last(), Some(&Value::Int(0)));
}

#[tokio::test(start_paused = true)]
async fn test_fade_without_known_start_snaps() {
    let (handle, transport) = spawn(test_config());
    let t0 = Instant::now();

    handle.run_transition(TransitionRequest::new("/fader", Value::Float(5.0), ms(500)));
    barrier(&handle).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command, OutboundCommand::set("/fader".into(), Value::Float(5.0)));
    assert_eq!(sent[0].at, t0);

    sleep(ms(1000)).await;
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fade_starts_from_mirrored_value() {
    let (handle, transport) = spawn(test_config());

    handle.on_message(InboundMessage::new("/fader", Value::Float(0.0)));
    handle.run_transition(
        TransitionRequest::new("/fader", Value::Float(1.0), ms(200))
            .easing(Algorithm::Quadratic, Curve::EaseIn),
    );
    sleep(ms(300)).await;

    assert_eq!(
        values(&transport.sent_to("/fader")),
        vec![Value::Float(0.25), Value::Float(1.0)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_cancels_running_fade() {
    let (handle, transport) = spawn(test_config());

    handle.run_transition(
        TransitionRequest::new("/fader", Value::Int(10), ms(1000)).from_value(Value::Int(0)),
    );
    sleep(ms(150)).await;
    handle.set("/fader", Value::Int(7));
    sleep(ms(1000)).await;

    let sent = values(&transport.sent_to("/fader"));
    assert_eq!(sent, vec![Value::Int(1), Value::Int(7)]);
}

// ============================================================================
// Change aggregation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_burst_produces_single_batch() {
    let (handle, _transport) = spawn(test_config());
    let mut changes = handle.subscribe_changes();
    let t0 = Instant::now();

    for group in 0..10 {
        for i in 0..5 {
            let n = group * 5 + i;
            handle.on_message(InboundMessage::new(format!("/ch/{n:02}/mix/fader"), Value::Float(0.1)));
        }
        sleep(ms(2)).await;
    }

    let batch = tokio::time::timeout(ms(600), changes.recv())
        .await
        .expect("batch within max wait")
        .unwrap();
    assert!(Instant::now().duration_since(t0) <= ms(500));
    assert_eq!(batch.len(), 50);
    assert!(batch.contains("/ch/00/mix/fader") && batch.contains("/ch/49/mix/fader"));

    sleep(ms(1000)).await;
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn test_continuous_churn_flushes_within_max_wait() {
    let (handle, _transport) = spawn(test_config());
    let mut changes = handle.subscribe_changes();
    let t0 = Instant::now();

    let mut first_batch_at = None;
    for i in 0..30u64 {
        handle.on_message(InboundMessage::new(format!("/bus/{i}"), Value::Int(1)));
        sleep(ms(50)).await;
        if first_batch_at.is_none() && changes.try_recv().is_ok() {
            first_batch_at = Some(Instant::now().duration_since(t0));
        }
    }

    let at = first_batch_at.expect("a batch was released under churn");
    assert!(at <= ms(550), "first batch after {:?}", at);
}

#[tokio::test(start_paused = true)]
async fn test_unsolicited_push_is_stored_and_reported() {
    let (handle, _transport) = spawn(test_config());
    let mut changes = handle.subscribe_changes();
    let mut failures = handle.subscribe_failures();

    handle.on_message(InboundMessage::new("/ch/05/config/name", Value::from("Snare")));
    let batch = changes.recv().await.unwrap();

    assert!(batch.contains("/ch/05/config/name"));
    assert_eq!(
        handle.get("/ch/05/config/name").await,
        Some(Value::from("Snare"))
    );
    assert!(matches!(failures.try_recv(), Err(TryRecvError::Empty)));
}

// ============================================================================
// State mirror
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_store_reflects_latest_message() {
    let (handle, _transport) = spawn(test_config());

    handle.ensure_loaded("/fader");
    handle.run_transition(
        TransitionRequest::new("/fader", Value::Float(1.0), ms(1000)).from_value(Value::Float(0.0)),
    );
    for v in [0.1, 0.2, 0.3] {
        handle.on_message(InboundMessage::new("/fader", Value::Float(v)));
    }

    assert_eq!(handle.get("/fader").await, Some(Value::Float(0.3)));
    let entry = handle.get_entry("/fader").await.unwrap();
    assert_eq!(entry.value, Value::Float(0.3));
    assert_eq!(barrier(&handle).await.messages_applied, 3);
}

// ============================================================================
// Heartbeat and lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_heartbeat_resubscribes_before_expiry() {
    let (handle, transport) = spawn(test_config());

    handle.start();
    handle.start();
    barrier(&handle).await;
    assert_eq!(
        transport.sent_to("/xremote"),
        vec![OutboundCommand::query("/xremote".into())]
    );

    sleep(ms(9_010)).await;
    assert_eq!(transport.sent_to("/xremote").len(), 2);
    sleep(ms(9_000)).await;
    assert_eq!(transport.sent_to("/xremote").len(), 3);

    handle.stop();
    sleep(ms(30_000)).await;
    let stats = barrier(&handle).await;
    assert_eq!(transport.sent_to("/xremote").len(), 3);
    assert!(!stats.heartbeat_running);
    assert_eq!(stats.heartbeats_sent, 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_drops_queries_and_fades_silently() {
    let (handle, transport) = spawn(test_config());
    let mut failures = handle.subscribe_failures();

    handle.on_message(InboundMessage::new("/kept", Value::Int(1)));
    handle.ensure_loaded("/a");
    handle.run_transition(
        TransitionRequest::new("/fader", Value::Int(10), ms(1000)).from_value(Value::Int(0)),
    );
    handle.stop();
    let stats = barrier(&handle).await;

    assert_eq!(stats.pending_queries, 0);
    assert_eq!(stats.active_transitions, 0);
    assert_eq!(stats.dirty, 0);
    assert_eq!(stats.entries, 1);

    sleep(ms(2000)).await;
    assert!(transport.sent_to("/fader").is_empty());
    assert!(matches!(failures.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(handle.get("/kept").await, Some(Value::Int(1)));
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_mirror_and_restart_resubscribes() {
    let (handle, transport) = spawn(test_config());

    handle.start();
    handle.on_message(InboundMessage::new("/a", Value::Int(1)));
    handle.reset();
    assert_eq!(handle.get("/a").await, None);
    assert_eq!(barrier(&handle).await.entries, 0);

    handle.start();
    barrier(&handle).await;
    assert_eq!(transport.sent_to("/xremote").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_actor() {
    let (handle, _transport) = spawn(test_config());
    assert!(handle.is_alive());

    handle.shutdown();
    sleep(ms(1)).await;

    assert!(!handle.is_alive());
    assert_eq!(handle.get("/a").await, None);
}
