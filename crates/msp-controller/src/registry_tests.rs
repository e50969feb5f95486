// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

fn agent(id: &str, host: &str) -> Agent {
    Agent { id: id.to_owned(), name: id.to_owned(), host_id: host.to_owned(), domain: "default".to_owned(), version: "1.0.0".to_owned() }
}

fn noop_registry(timeout: Duration) -> Arc<AgentRegistry> {
    AgentRegistry::new(timeout, Arc::new(|_, _| {}), Arc::new(|_| {}))
}

#[tokio::test]
async fn register_then_heartbeat_keeps_agent_online() {
    let reg = noop_registry(Duration::from_secs(60));
    reg.register(agent("a1", "h1")).await;

    let entry = reg.get("a1").await.expect("registered");
    assert!(entry.is_online());

    assert!(reg.heartbeat("a1", AgentStats { connection_count: 3, ..Default::default() }).await);
    assert_eq!(entry.stats().await.connection_count, 3);
}

#[tokio::test]
async fn heartbeat_for_unknown_agent_reports_failure() {
    let reg = noop_registry(Duration::from_secs(60));
    assert!(!reg.heartbeat("ghost", AgentStats::default()).await);
}

#[tokio::test]
async fn s6_register_fires_join_and_liveness_sweep_fires_leave() {
    let joins = Arc::new(AtomicUsize::new(0));
    let leaves = Arc::new(AtomicUsize::new(0));
    let j2 = Arc::clone(&joins);
    let l2 = Arc::clone(&leaves);

    let reg = AgentRegistry::new(
        Duration::from_millis(20),
        Arc::new(move |_, _| {
            j2.fetch_add(1, Ordering::SeqCst);
        }),
        Arc::new(move |_| {
            l2.fetch_add(1, Ordering::SeqCst);
        }),
    );

    reg.register(agent("a1", "h1")).await;
    // on_join is spawned, give it a chance to run.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(joins.load(Ordering::SeqCst), 1);

    reg.spawn_liveness_sweep(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let entry = reg.get("a1").await.expect("still present, never GC'd");
    assert!(!entry.is_online(), "agent should be marked offline after the timeout elapses");
    assert_eq!(leaves.load(Ordering::SeqCst), 1);

    reg.stop();
}

#[tokio::test]
async fn touch_updates_last_seen_for_report_calls() {
    let reg = noop_registry(Duration::from_millis(50));
    reg.register(agent("a1", "h1")).await;

    assert!(!reg.touch("ghost").await);
    assert!(reg.touch("a1").await);
}
