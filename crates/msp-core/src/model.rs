// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The data model (spec §3): flow fingerprints, connection summaries,
//! workloads, groups, policy rules, hosts, and agents.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// IANA protocol numbers the fingerprint treats specially.
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// Enforcement action, shared by rules and connection summaries.
///
/// Wire encoding is fixed by spec §6: `open=0, allow=1, deny=2, violate=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum PolicyAction {
    Open = 0,
    Allow = 1,
    Deny = 2,
    Violate = 3,
}

impl PolicyAction {
    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Open),
            1 => Some(Self::Allow),
            2 => Some(Self::Deny),
            3 => Some(Self::Violate),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Violate => "violate",
        };
        f.write_str(s)
    }
}

/// Per-group enforcement posture (glossary: "Policy mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Monitor,
    Protect,
}

impl PolicyMode {
    /// spec §4.4: `default_action(g) = deny if group_mode(g) == protect else violate`.
    pub fn default_action(self) -> PolicyAction {
        match self {
            Self::Protect => PolicyAction::Deny,
            Self::Monitor => PolicyAction::Violate,
        }
    }
}

/// The flow fingerprint (spec §3): an equality key used to coalesce
/// observations into a single summary. Client port is deliberately
/// excluded. Ordering is irrelevant — this type only needs `Eq + Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowFingerprint {
    pub client_ip: String,
    pub server_ip: String,
    /// `None` for non-TCP/UDP protocols, per spec §3.
    pub server_port: Option<u16>,
    pub ip_proto: u8,
    pub ingress: bool,
    pub policy_id: u32,
    pub application: u32,
}

impl FlowFingerprint {
    /// Build the fingerprint for an observation, applying the TCP/UDP vs.
    /// other-protocol tuple split from spec §3.
    pub fn new(
        client_ip: impl Into<String>,
        server_ip: impl Into<String>,
        server_port: u16,
        ip_proto: u8,
        ingress: bool,
        policy_id: u32,
        application: u32,
    ) -> Self {
        let server_port =
            if matches!(ip_proto, PROTO_TCP | PROTO_UDP) { Some(server_port) } else { None };
        Self {
            client_ip: client_ip.into(),
            server_ip: server_ip.into(),
            server_port,
            ip_proto,
            ingress,
            policy_id,
            application,
        }
    }
}

/// The value associated with a [`FlowFingerprint`] (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub bytes: u64,
    pub sessions: u64,
    pub violates: u64,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    pub policy_action: PolicyAction,
    pub policy_id: u32,
    pub severity: u8,
    pub threat_id: u32,
    pub client_wl: String,
    pub server_wl: String,
    pub external_peer: String,
    pub local_peer: String,
    pub ingress: bool,
    pub agent_id: String,
    pub host_id: String,
}

impl ConnectionSummary {
    /// Merge observation `o` into `self`, per the invariants in spec §3:
    /// counters are additive, `last_seen_at`-wins for classification,
    /// `severity` is monotone-max, `first_seen_at` is never overwritten.
    pub fn merge(&mut self, o: &ConnectionSummary) {
        self.bytes += o.bytes;
        self.sessions += o.sessions;
        self.violates += o.violates;

        if o.last_seen_at >= self.last_seen_at {
            self.policy_action = o.policy_action;
            self.policy_id = o.policy_id;
            self.last_seen_at = o.last_seen_at;
        }

        if o.severity > self.severity {
            self.severity = o.severity;
            self.threat_id = o.threat_id;
        }

        self.first_seen_at = self.first_seen_at.min(o.first_seen_at);
    }
}

/// A network interface address, scoped (e.g. "host", "global", "overlay").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub ip: String,
    pub scope: String,
}

/// A protected application instance (glossary: "Workload").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub id: String,
    pub name: String,
    pub host_id: String,
    pub domain: String,
    pub service: String,
    pub image: String,
    pub policy_mode: PolicyMode,
    pub running: bool,
    pub interfaces: HashMap<String, Vec<InterfaceAddress>>,
}

/// A criterion for future selector-based group membership (spec §3: not
/// used for membership evaluation in this core — static inclusion only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub key: String,
    pub value: String,
    pub op: String,
}

/// A named set of workloads used as the unit of policy (glossary: "Group").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub comment: String,
    pub domain: String,
    pub policy_mode: PolicyMode,
    pub members: Vec<String>,
    pub criteria: Vec<Criterion>,
}

/// The sentinel group name that matches any `from`/`to`.
pub const ANY_GROUP: &str = "any";

/// A prioritized policy rule (spec §3, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: u32,
    pub from: String,
    pub to: String,
    pub ports: String,
    pub applications: Vec<u32>,
    pub action: PolicyAction,
    pub priority: i32,
    pub disable: bool,
    pub comment: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A physical or virtual host running one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub interfaces: HashMap<String, Vec<InterfaceAddress>>,
}

/// Static identity of a per-host agent (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub host_id: String,
    pub domain: String,
    pub version: String,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
