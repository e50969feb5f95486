// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workload-to-workload graph projection (spec §4.6, component C6).
//!
//! This is a projection, not a running aggregate: each connection summary
//! update *replaces* the corresponding link's attributes with the latest
//! summary snapshot, it does not accumulate across updates (accumulation
//! already happened inside the aggregator/state store).

use std::collections::HashMap;

use serde::Serialize;

use crate::model::PolicyAction;

/// Attributes carried by a graph node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeAttrs {
    pub workload_id: String,
    pub name: String,
    pub domain: String,
}

/// Attributes carried by a directed link between two workloads.
#[derive(Debug, Clone, Serialize)]
pub struct LinkAttrs {
    pub bytes: u64,
    pub sessions: u64,
    pub severity: u8,
    pub policy_action: PolicyAction,
}

/// A materialized snapshot suitable for serialization to a caller.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeAttrs>,
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphLink {
    pub src: String,
    pub dst: String,
    pub attrs: LinkAttrs,
}

/// The directed multigraph of workload connectivity (component C6).
#[derive(Debug, Default)]
pub struct GraphProjection {
    nodes: HashMap<String, NodeAttrs>,
    links: HashMap<(String, String), LinkAttrs>,
}

impl GraphProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node's attributes.
    pub fn upsert_node(&mut self, id: impl Into<String>, name: impl Into<String>, domain: impl Into<String>) {
        let id = id.into();
        self.nodes.insert(id.clone(), NodeAttrs { workload_id: id, name: name.into(), domain: domain.into() });
    }

    /// Remove a node and every link incident to it (spec §4.6).
    pub fn remove_node(&mut self, id: &str) {
        self.nodes.remove(id);
        self.links.retain(|(src, dst), _| src != id && dst != id);
    }

    /// Set a link's attributes to the latest connection summary snapshot
    /// (spec §4.6: "the link aggregate is set... it is a projection, not
    /// a running sum").
    pub fn set_link(&mut self, src: impl Into<String>, dst: impl Into<String>, attrs: LinkAttrs) {
        self.links.insert((src.into(), dst.into()), attrs);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn has_link(&self, src: &str, dst: &str) -> bool {
        self.links.contains_key(&(src.to_owned(), dst.to_owned()))
    }

    /// Materialize a snapshot suitable for serialization (spec §4.6).
    pub fn get_graph(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            links: self
                .links
                .iter()
                .map(|((src, dst), attrs)| GraphLink { src: src.clone(), dst: dst.clone(), attrs: attrs.clone() })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
