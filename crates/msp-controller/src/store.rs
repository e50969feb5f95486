// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller state store (spec §4.5, component C5): five maps
//! behind one readers-writer lock, plus the connection-summary map,
//! the policy engine (C4), and the graph projection (C6) composed
//! alongside it.
//!
//! `workloads`, `groups`, `hosts`, `agents`, and `connections` share one
//! lock (spec §4.5: "a single in-memory store with a readers-writer
//! lock"). The policy engine and graph projection are separate
//! components (C4, C6) with their own internal locking, composed here
//! rather than folded into the five-map `Inner` struct — each already
//! has to serialize its own cross-cutting operations (rule evaluation,
//! link replacement) independently of workload/group/host churn.

use std::collections::HashMap;

use tokio::sync::RwLock;

use msp_core::graph::{GraphProjection, GraphSnapshot, LinkAttrs};
use msp_core::model::{Agent, ConnectionSummary, Group, Host, Workload};
use msp_core::policy::PolicyEngine;
use msp_core::CoreError;

struct Inner {
    workloads: HashMap<String, Workload>,
    groups: HashMap<String, Group>,
    hosts: HashMap<String, Host>,
    agents: HashMap<String, Agent>,
    connections: HashMap<String, ConnectionSummary>,
}

impl Inner {
    fn new() -> Self {
        Self {
            workloads: HashMap::new(),
            groups: HashMap::new(),
            hosts: HashMap::new(),
            agents: HashMap::new(),
            connections: HashMap::new(),
        }
    }
}

/// `"{client_wl}-{server_wl}"`, per spec §4.5.
fn connection_key(client_wl: &str, server_wl: &str) -> String {
    format!("{client_wl}-{server_wl}")
}

/// The controller's state store (component C5).
pub struct ControllerState {
    inner: RwLock<Inner>,
    pub policy: PolicyEngine,
    graph: RwLock<GraphProjection>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerState {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::new()), policy: PolicyEngine::new(), graph: RwLock::new(GraphProjection::new()) }
    }

    // -- Workloads --------------------------------------------------------

    pub async fn upsert_workload(&self, workload: Workload) {
        let mut inner = self.inner.write().await;
        let mut graph = self.graph.write().await;
        graph.upsert_node(workload.id.clone(), workload.name.clone(), workload.domain.clone());
        inner.workloads.insert(workload.id.clone(), workload);
    }

    /// Removing a workload drops its C6 node but leaves connection
    /// summaries intact (spec §4.5: callers MUST NOT assume cascade).
    pub async fn delete_workload(&self, id: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        inner.workloads.remove(id).ok_or(CoreError::NotFound)?;
        let mut graph = self.graph.write().await;
        graph.remove_node(id);
        Ok(())
    }

    pub async fn get_workload(&self, id: &str) -> Option<Workload> {
        self.inner.read().await.workloads.get(id).cloned()
    }

    pub async fn list_workloads(&self) -> Vec<Workload> {
        self.inner.read().await.workloads.values().cloned().collect()
    }

    // -- Groups -------------------------------------------------------------

    pub async fn upsert_group(&self, group: Group) {
        self.inner.write().await.groups.insert(group.name.clone(), group);
    }

    pub async fn get_group(&self, name: &str) -> Option<Group> {
        self.inner.read().await.groups.get(name).cloned()
    }

    pub async fn list_groups(&self) -> Vec<Group> {
        self.inner.read().await.groups.values().cloned().collect()
    }

    // -- Hosts ----------------------------------------------------------------

    pub async fn upsert_host(&self, host: Host) {
        self.inner.write().await.hosts.insert(host.id.clone(), host);
    }

    pub async fn get_host(&self, id: &str) -> Option<Host> {
        self.inner.read().await.hosts.get(id).cloned()
    }

    // -- Agent identity (static; liveness lives in `registry::AgentRegistry`) --

    pub async fn upsert_agent(&self, agent: Agent) {
        self.inner.write().await.agents.insert(agent.id.clone(), agent);
    }

    pub async fn get_agent(&self, id: &str) -> Option<Agent> {
        self.inner.read().await.agents.get(id).cloned()
    }

    // -- Connection summaries -------------------------------------------------

    /// Merge a batch of reported connection summaries into the store and
    /// project each into C6 as a latest-wins link (spec §4.5, §4.6).
    pub async fn apply_connections(&self, batch: Vec<ConnectionSummary>) {
        if batch.is_empty() {
            return;
        }

        let mut inner = self.inner.write().await;
        let mut projected = Vec::with_capacity(batch.len());
        for summary in batch {
            let key = connection_key(&summary.client_wl, &summary.server_wl);
            match inner.connections.get_mut(&key) {
                Some(existing) => existing.merge(&summary),
                None => {
                    inner.connections.insert(key, summary.clone());
                }
            }
            projected.push(summary);
        }
        drop(inner);

        let mut graph = self.graph.write().await;
        for summary in projected {
            graph.set_link(
                summary.client_wl.clone(),
                summary.server_wl.clone(),
                LinkAttrs {
                    bytes: summary.bytes,
                    sessions: summary.sessions,
                    severity: summary.severity,
                    policy_action: summary.policy_action,
                },
            );
        }
    }

    pub async fn get_connection(&self, client_wl: &str, server_wl: &str) -> Option<ConnectionSummary> {
        self.inner.read().await.connections.get(&connection_key(client_wl, server_wl)).cloned()
    }

    pub async fn list_connections(&self) -> Vec<ConnectionSummary> {
        self.inner.read().await.connections.values().cloned().collect()
    }

    // -- Graph (C6) -----------------------------------------------------------

    pub async fn get_graph(&self) -> GraphSnapshot {
        self.graph.read().await.get_graph()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
