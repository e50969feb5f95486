// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use super::*;
use msp_core::model::PolicyMode;

fn workload(id: &str) -> Workload {
    Workload {
        id: id.to_owned(),
        name: id.to_owned(),
        host_id: "h1".to_owned(),
        domain: "prod".to_owned(),
        service: "svc".to_owned(),
        image: "img".to_owned(),
        policy_mode: PolicyMode::Monitor,
        running: true,
        interfaces: HashMap::new(),
    }
}

fn summary(client_wl: &str, server_wl: &str) -> ConnectionSummary {
    ConnectionSummary {
        bytes: 10,
        sessions: 1,
        violates: 0,
        first_seen_at: 1,
        last_seen_at: 1,
        policy_action: PolicyAction::Allow,
        policy_id: 1,
        severity: 0,
        threat_id: 0,
        client_wl: client_wl.to_owned(),
        server_wl: server_wl.to_owned(),
        external_peer: String::new(),
        local_peer: String::new(),
        ingress: false,
        agent_id: "a1".to_owned(),
        host_id: "h1".to_owned(),
    }
}

#[tokio::test]
async fn apply_connections_merges_by_workload_pair_and_projects_into_graph() {
    let state = ControllerState::new();
    state.upsert_workload(workload("web")).await;
    state.upsert_workload(workload("db")).await;

    state.apply_connections(vec![summary("web", "db"), summary("web", "db")]).await;

    let conn = state.get_connection("web", "db").await.expect("merged summary present");
    assert_eq!(conn.bytes, 20);

    let graph = state.get_graph().await;
    let link = graph.links.iter().find(|l| l.src == "web" && l.dst == "db").expect("link projected");
    assert_eq!(link.attrs.bytes, 20);
}

#[tokio::test]
async fn deleting_a_workload_drops_its_graph_node_but_not_its_connection_summaries() {
    let state = ControllerState::new();
    state.upsert_workload(workload("web")).await;
    state.upsert_workload(workload("db")).await;
    state.apply_connections(vec![summary("web", "db")]).await;

    state.delete_workload("web").await.unwrap();

    assert!(state.get_workload("web").await.is_none());
    assert!(state.get_connection("web", "db").await.is_some(), "deleting a workload must not cascade to flows");

    let graph = state.get_graph().await;
    assert!(graph.nodes.iter().all(|n| n.workload_id != "web"));
    assert!(graph.links.iter().all(|l| l.src != "web" && l.dst != "web"));
}

#[tokio::test]
async fn delete_workload_is_not_found_for_an_unknown_id() {
    let state = ControllerState::new();
    assert_eq!(state.delete_workload("ghost").await, Err(CoreError::NotFound));
}

#[tokio::test]
async fn group_and_host_round_trip_through_the_store() {
    let state = ControllerState::new();
    state
        .upsert_group(Group {
            name: "web".to_owned(),
            comment: String::new(),
            domain: "prod".to_owned(),
            policy_mode: PolicyMode::Protect,
            members: vec!["web-1".to_owned()],
            criteria: Vec::new(),
        })
        .await;
    assert_eq!(state.get_group("web").await.unwrap().members, vec!["web-1".to_owned()]);

    state
        .upsert_host(Host { id: "h1".to_owned(), name: "host-1".to_owned(), platform: "linux".to_owned(), interfaces: HashMap::new() })
        .await;
    assert_eq!(state.get_host("h1").await.unwrap().name, "host-1");
}
