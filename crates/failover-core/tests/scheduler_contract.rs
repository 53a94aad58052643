//! Contract Test: Scheduling and Shutdown
//!
//! Constraints verified:
//! - Every domain runs a cycle immediately at start
//! - Cycles repeat once per interval
//! - Cycles of one domain never overlap
//! - Domain starts are staggered
//! - Shutdown terminates every domain task, even mid-cycle
//!
//! Timer-driven tests run on a paused clock; the runtime advances time
//! whenever every task is idle.

mod common;

use common::*;
use failover_core::config::ProbeOverride;
use failover_core::engine::{EngineEvent, FailoverEngine};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

fn start(
    prober: &ScriptedProber,
    provider: &RecordingProvider,
    config: failover_core::FailoverConfig,
) -> (
    oneshot::Sender<()>,
    JoinHandle<failover_core::Result<()>>,
    mpsc::Receiver<EngineEvent>,
) {
    let (engine, events) = assert_ok!(FailoverEngine::new(
        Box::new(prober.clone()),
        Box::new(provider.clone()),
        config,
    ));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(shutdown_rx).await });
    (shutdown_tx, handle, events)
}

async fn stop(shutdown_tx: oneshot::Sender<()>, handle: JoinHandle<failover_core::Result<()>>) {
    shutdown_tx.send(()).expect("engine is still running");
    let joined = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("engine should terminate within 5 seconds");
    assert_ok!(joined.expect("engine task panicked"));
}

#[tokio::test(start_paused = true)]
async fn first_cycle_runs_immediately() {
    let prober = ScriptedProber::new().with("10.0.0.1", ProbeScript::Latency(10));
    let provider = RecordingProvider::with_zone("example.com", "zone-1");
    let (shutdown_tx, handle, _events) = start(
        &prober,
        &provider,
        minimal_config(vec![domain("example.com", &["10.0.0.1"])]),
    );

    // Far less than the 60 s interval
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(prober.call_count("10.0.0.1"), 1);
    assert_eq!(provider.ips("example.com"), vec!["10.0.0.1"]);

    stop(shutdown_tx, handle).await;
}

#[tokio::test(start_paused = true)]
async fn cycles_repeat_every_interval() {
    let prober = ScriptedProber::new().with("10.0.0.1", ProbeScript::Latency(10));
    let provider = RecordingProvider::with_zone("example.com", "zone-1");
    let (shutdown_tx, handle, _events) = start(
        &prober,
        &provider,
        minimal_config(vec![domain("example.com", &["10.0.0.1"])]),
    );

    // Ticks at 0 s, 60 s and 120 s
    tokio::time::sleep(Duration::from_secs(150)).await;
    assert_eq!(prober.call_count("10.0.0.1"), 3);

    // Records were created once and left alone afterwards
    assert_eq!(
        provider.mutations(),
        vec![ProviderCall::Create("10.0.0.1".to_string())]
    );

    stop(shutdown_tx, handle).await;
}

#[tokio::test(start_paused = true)]
async fn slow_cycles_never_overlap() {
    let prober = ScriptedProber::new().with(
        "10.0.0.1",
        ProbeScript::Slow(Duration::from_secs(90), 10),
    );
    let provider = RecordingProvider::with_zone("example.com", "zone-1");

    let mut slow = domain("example.com", &["10.0.0.1"]);
    slow.probe = Some(ProbeOverride {
        timeout_ms: Some(120_000),
        ..ProbeOverride::default()
    });
    let (shutdown_tx, handle, _events) = start(&prober, &provider, minimal_config(vec![slow]));

    tokio::time::sleep(Duration::from_secs(200)).await;

    assert_eq!(prober.max_in_flight(), 1, "cycles of one domain overlapped");
    let calls = prober.call_count("10.0.0.1");
    assert!((2..=3).contains(&calls), "unexpected probe count {}", calls);

    stop(shutdown_tx, handle).await;
}

#[tokio::test(start_paused = true)]
async fn domain_starts_are_staggered() {
    let prober = ScriptedProber::new()
        .with("10.0.0.1", ProbeScript::Latency(10))
        .with("10.0.1.1", ProbeScript::Latency(10));
    let provider = RecordingProvider::with_zone("example.com", "zone-1");

    let mut config = minimal_config(vec![
        domain("a.example.com", &["10.0.0.1"]),
        domain("b.example.com", &["10.0.1.1"]),
    ]);
    config.engine.startup_stagger_ms = 10_000;
    let (shutdown_tx, handle, _events) = start(&prober, &provider, config);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(prober.call_count("10.0.0.1"), 1);
    assert_eq!(prober.call_count("10.0.1.1"), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(prober.call_count("10.0.1.1"), 1);

    stop(shutdown_tx, handle).await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_in_flight_cycle() {
    let prober = ScriptedProber::new().with(
        "10.0.0.1",
        ProbeScript::Slow(Duration::from_secs(3600), 10),
    );
    let provider = RecordingProvider::with_zone("example.com", "zone-1");

    let mut slow = domain("example.com", &["10.0.0.1"]);
    slow.probe = Some(ProbeOverride {
        timeout_ms: Some(7_200_000),
        ..ProbeOverride::default()
    });
    let (shutdown_tx, handle, _events) = start(&prober, &provider, minimal_config(vec![slow]));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(prober.max_in_flight(), 1, "probe should be in flight");

    stop(shutdown_tx, handle).await;
    assert!(provider.calls().is_empty(), "interrupted cycle must not reach the provider");
}

#[tokio::test]
async fn shutdown_signal_terminates_engine() {
    let prober = ScriptedProber::new().with("10.0.0.1", ProbeScript::Latency(10));
    let provider = RecordingProvider::with_zone("example.com", "zone-1");
    let (shutdown_tx, handle, mut events) = start(
        &prober,
        &provider,
        minimal_config(vec![domain("example.com", &["10.0.0.1"])]),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop(shutdown_tx, handle).await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(received.first(), Some(&EngineEvent::Started { domains_count: 1 }));
    assert!(matches!(received.last(), Some(EngineEvent::Stopped { .. })));
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_engine() {
    let prober = ScriptedProber::new().with("10.0.0.1", ProbeScript::Latency(10));
    let provider = RecordingProvider::with_zone("example.com", "zone-1");
    let (shutdown_tx, handle, _events) = start(
        &prober,
        &provider,
        minimal_config(vec![domain("example.com", &["10.0.0.1"])]),
    );

    drop(shutdown_tx);

    let joined = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("engine should terminate within 5 seconds");
    assert_ok!(joined.expect("engine task panicked"));
}
