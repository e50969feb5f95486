// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios S1-S6, driven against an in-process controller
//! (no subprocess, no real network) the way the teacher's `tests/specs`
//! crate drives a running `coop` process.

use std::sync::Arc;
use std::time::Duration;

use msp_core::aggregate::{Aggregator, Observation, ThreatObservation};
use msp_core::model::{Agent, Group, PolicyAction, PolicyMode, PolicyRule, Workload};
use msp_controller::registry::AgentRegistry;
use msp_controller::rpc::MspGrpc;
use msp_controller::store::ControllerState;
use msp_proto::proto;
use msp_proto::proto::micro_segment_server::MicroSegment;
use tonic::Request;

fn agent(id: &str, host_id: &str) -> Agent {
    Agent { id: id.to_owned(), name: id.to_owned(), host_id: host_id.to_owned(), domain: "default".to_owned(), version: "0".to_owned() }
}

fn rule(id: u32, from: &str, to: &str, ports: &str, action: PolicyAction, priority: i32) -> PolicyRule {
    PolicyRule {
        id,
        from: from.to_owned(),
        to: to.to_owned(),
        ports: ports.to_owned(),
        applications: Vec::new(),
        action,
        priority,
        disable: false,
        comment: String::new(),
        created_at: 0,
        updated_at: 0,
    }
}

fn workload(id: &str, domain: &str, policy_mode: PolicyMode) -> Workload {
    Workload {
        id: id.to_owned(),
        name: id.to_owned(),
        host_id: "h1".to_owned(),
        domain: domain.to_owned(),
        service: String::new(),
        image: String::new(),
        policy_mode,
        running: true,
        interfaces: Default::default(),
    }
}

/// S1: `Register` responds with the advertised `cluster_id` and
/// `report_interval_s` (spec §8's end-to-end scenarios).
#[tokio::test]
async fn s1_register_returns_cluster_identity() {
    let state = Arc::new(ControllerState::new());
    let on_join: msp_controller::registry::JoinCallback = Arc::new(|_, _| {});
    let on_leave: msp_controller::registry::LeaveCallback = Arc::new(|_| {});
    let registry = AgentRegistry::new(Duration::from_secs(60), on_join, on_leave);
    let grpc = MspGrpc::new(Arc::clone(&state), Arc::clone(&registry), "micro-segment-cluster".to_owned(), 5);

    let request = Request::new(proto::RegisterRequest {
        agent: Some(proto::AgentInfo {
            agent_id: "A1".to_owned(),
            host_id: "h1".to_owned(),
            host_name: "host-1".to_owned(),
            domain: "default".to_owned(),
            version: "1.0".to_owned(),
        }),
    });

    let response = grpc.register(request).await.expect("register").into_inner();
    assert_eq!(response.code, 0);
    assert_eq!(response.cluster_id, "micro-segment-cluster");
    assert_eq!(response.report_interval_s, 5);

    assert!(registry.get("A1").await.is_some());
}

/// S2: a matching rule wins; a non-matching port falls through to the
/// group's default action.
#[tokio::test]
async fn s2_matching_rule_then_default_fallthrough() {
    let state = ControllerState::new();
    state.policy.set_group_mode("db", PolicyMode::Protect).await;
    state.policy.add_rule(rule(1, "web", "db", "tcp:3306", PolicyAction::Allow, 100)).await.expect("add_rule");

    let matched = state.policy.evaluate("web", "db", 3306, 6, 0).await;
    assert_eq!((matched.rule_id, matched.action), (1, PolicyAction::Allow));

    let fallthrough = state.policy.evaluate("web", "db", 3307, 6, 0).await;
    assert_eq!((fallthrough.rule_id, fallthrough.action), (0, PolicyAction::Deny));
}

/// S3: three observations with the same fingerprint coalesce into one
/// summary on the next drain.
#[tokio::test]
async fn s3_identical_fingerprint_observations_coalesce_on_drain() {
    let drained: Arc<std::sync::Mutex<Vec<(u64, u64)>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let drained_clone = Arc::clone(&drained);
    let on_connections = Arc::new(move |batch: Vec<(msp_core::model::FlowFingerprint, msp_core::model::ConnectionSummary)>| {
        for (_, summary) in batch {
            drained_clone.lock().unwrap().push((summary.bytes, summary.sessions));
        }
    });
    let on_threats = Arc::new(|_: Vec<ThreatObservation>| {});

    let aggregator = Aggregator::new("A1", "h1", on_connections, on_threats);

    for bytes in [100, 200, 50] {
        aggregator.observe(Observation {
            client_ip: "10.0.0.1".to_owned(),
            server_ip: "10.0.0.2".to_owned(),
            server_port: 3306,
            ip_proto: 6,
            ingress: false,
            policy_id: 1,
            application: 0,
            bytes,
            sessions: 1,
            violates: 0,
            first_seen_at: 0,
            last_seen_at: 0,
            policy_action: PolicyAction::Allow,
            severity: 0,
            threat_id: 0,
            client_wl: "web".to_owned(),
            server_wl: "db".to_owned(),
            external_peer: String::new(),
            local_peer: String::new(),
        });
    }

    aggregator.flush().await;

    let summaries = drained.lock().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0], (350, 3));
}

/// S4: `add -> update -> delete` returns the graph node count to zero
/// and drops the link referencing the deleted workload.
#[tokio::test]
async fn s4_workload_lifecycle_cascades_to_graph_node_but_not_connections() {
    let state = ControllerState::new();

    state.upsert_workload(workload("w1", "default", PolicyMode::Monitor)).await;
    state.upsert_workload(workload("w2", "default", PolicyMode::Monitor)).await;
    state
        .apply_connections(vec![msp_core::model::ConnectionSummary {
            bytes: 10,
            sessions: 1,
            violates: 0,
            first_seen_at: 0,
            last_seen_at: 0,
            policy_action: PolicyAction::Allow,
            policy_id: 0,
            severity: 0,
            threat_id: 0,
            client_wl: "w1".to_owned(),
            server_wl: "w2".to_owned(),
            external_peer: String::new(),
            local_peer: String::new(),
            ingress: false,
            agent_id: "A1".to_owned(),
            host_id: "h1".to_owned(),
        }])
        .await;

    let mut w1 = workload("w1", "default", PolicyMode::Monitor);
    w1.policy_mode = PolicyMode::Protect;
    state.upsert_workload(w1).await;

    state.delete_workload("w1").await.expect("delete_workload");

    let graph = state.get_graph().await;
    assert!(!graph.nodes.iter().any(|n| n.workload_id == "w1"));
    assert!(!graph.links.iter().any(|l| l.src == "w1" || l.dst == "w1"));

    // spec §4.5: deletion does not cascade to connection summaries.
    assert!(state.get_connection("w1", "w2").await.is_some());
}

/// S5: the 131,073rd distinct fingerprint with a low-priority action is
/// dropped at capacity; resending it with a priority action is admitted.
#[tokio::test]
async fn s5_capacity_admission_prioritizes_deny_over_allow() {
    let aggregator = Aggregator::new("A1", "h1", Arc::new(|_| {}), Arc::new(|_| {}));

    for i in 0..msp_core::aggregate::N_CONN {
        aggregator.observe(observation_for(i as u32, PolicyAction::Allow));
    }
    aggregator.flush().await;
    assert_eq!(aggregator.len().await, msp_core::aggregate::N_CONN);

    let overflow_fp = msp_core::aggregate::N_CONN as u32;
    aggregator.observe(observation_for(overflow_fp, PolicyAction::Allow));
    aggregator.flush().await;
    assert_eq!(aggregator.len().await, msp_core::aggregate::N_CONN, "low-priority observation should be dropped at capacity");

    aggregator.observe(observation_for(overflow_fp, PolicyAction::Deny));
    aggregator.flush().await;
    assert_eq!(aggregator.len().await, msp_core::aggregate::N_CONN + 1, "priority observation should be admitted over capacity");
}

fn observation_for(i: u32, policy_action: PolicyAction) -> Observation {
    Observation {
        client_ip: format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff),
        server_ip: "10.0.0.2".to_owned(),
        server_port: 1,
        ip_proto: 6,
        ingress: false,
        policy_id: 0,
        application: 0,
        bytes: 1,
        sessions: 1,
        violates: 0,
        first_seen_at: 0,
        last_seen_at: 0,
        policy_action,
        severity: 0,
        threat_id: 0,
        client_wl: String::new(),
        server_wl: String::new(),
        external_peer: String::new(),
        local_peer: String::new(),
    }
}

/// S6: an agent that registers then heartbeats, then goes silent, is
/// marked offline within one sweep of the liveness timeout, firing
/// `on_agent_leave` exactly once.
#[tokio::test]
async fn s6_silent_agent_goes_offline_and_fires_leave_once() {
    let leave_count = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let leave_count_clone = Arc::clone(&leave_count);
    let on_join: msp_controller::registry::JoinCallback = Arc::new(|_, _| {});
    let on_leave: msp_controller::registry::LeaveCallback = Arc::new(move |_| {
        leave_count_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });

    let liveness_timeout = Duration::from_millis(60);
    let registry = AgentRegistry::new(liveness_timeout, on_join, on_leave);
    registry.spawn_liveness_sweep(Duration::from_millis(20));

    registry.register(agent("A1", "h1")).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(registry.heartbeat("A1", Default::default()).await);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let entry = registry.get("A1").await.expect("agent present");
    assert!(!entry.is_online());
    assert_eq!(leave_count.load(std::sync::atomic::Ordering::SeqCst), 1);
}

/// Sanity check that `GetPolicies` filters by domain the way the
/// agent's policy-poll loop expects (grounds the RPC surface test, not a
/// named spec scenario).
#[tokio::test]
async fn get_policies_filters_by_requested_domain() {
    let state = Arc::new(ControllerState::new());
    state.upsert_group(Group { name: "db".to_owned(), comment: String::new(), domain: "prod".to_owned(), policy_mode: PolicyMode::Protect, members: Vec::new(), criteria: Vec::new() }).await;
    state.upsert_group(Group { name: "web".to_owned(), comment: String::new(), domain: "staging".to_owned(), policy_mode: PolicyMode::Monitor, members: Vec::new(), criteria: Vec::new() }).await;
    state.policy.add_rule(rule(1, "web", "db", "any", PolicyAction::Allow, 10)).await.unwrap();

    let on_join: msp_controller::registry::JoinCallback = Arc::new(|_, _| {});
    let on_leave: msp_controller::registry::LeaveCallback = Arc::new(|_| {});
    let registry = AgentRegistry::new(Duration::from_secs(60), on_join, on_leave);
    registry.register(agent("A1", "h1")).await;
    let grpc = MspGrpc::new(Arc::clone(&state), registry, "cluster".to_owned(), 5);

    let request = Request::new(proto::GetPoliciesRequest {
        agent_id: "A1".to_owned(),
        filters: Some(proto::PolicyFilter { domain: "prod".to_owned() }),
    });
    let response = grpc.get_policies(request).await.expect("get_policies").into_inner();
    assert_eq!(response.rules.len(), 1);

    let request = Request::new(proto::GetPoliciesRequest {
        agent_id: "A1".to_owned(),
        filters: Some(proto::PolicyFilter { domain: "qa".to_owned() }),
    });
    let response = grpc.get_policies(request).await.expect("get_policies").into_inner();
    assert!(response.rules.is_empty());
}
