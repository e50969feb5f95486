// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The data-plane datagram protocol (spec §4.1, §6).
//!
//! One UDP/Unix datagram carries one [`DataPlaneMessage`], a tagged record
//! encoded as a single line of JSON. The 64 KiB datagram cap bounds the
//! encoded size of every variant; none of the payloads defined here
//! (a single flow observation, a single threat event, a policy snapshot of
//! at most a few thousand rules, or a handful of MAC/subnet strings) can
//! reasonably exceed it.

use serde::{Deserialize, Serialize};

/// Upper bound on an encoded datagram, matching the local socket's MTU.
pub const MAX_DATAGRAM_BYTES: usize = 64 * 1024;

/// A single message exchanged over the data-plane channel.
///
/// Outbound variants ([`PushPolicy`], [`AddEndpoint`], [`RemoveEndpoint`],
/// [`ConfigureSubnets`]) flow from agent to data-plane source. Inbound
/// variants ([`Connection`], [`Threat`]) flow the other way.
///
/// [`PushPolicy`]: DataPlaneMessage::PushPolicy
/// [`AddEndpoint`]: DataPlaneMessage::AddEndpoint
/// [`RemoveEndpoint`]: DataPlaneMessage::RemoveEndpoint
/// [`ConfigureSubnets`]: DataPlaneMessage::ConfigureSubnets
/// [`Connection`]: DataPlaneMessage::Connection
/// [`Threat`]: DataPlaneMessage::Threat
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DataPlaneMessage {
    Connection(FlowObservation),
    Threat(ThreatEvent),
    Policy(PolicySnapshot),
    AddMac { mac: String, workload_id: String },
    DelMac { mac: String },
    ConfigSubnets { subnets: Vec<String> },
}

impl DataPlaneMessage {
    /// Encode as a single line of JSON. Returns `None` if the encoded form
    /// would exceed [`MAX_DATAGRAM_BYTES`].
    pub fn encode(&self) -> Option<Vec<u8>> {
        let bytes = serde_json::to_vec(self).ok()?;
        if bytes.len() > MAX_DATAGRAM_BYTES {
            return None;
        }
        Some(bytes)
    }

    /// Decode a single datagram payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A raw per-flow observation as classified by the data-plane source.
///
/// Unlike [`crate::proto::ConnectionSummaryWire`] this carries no
/// provenance (`agent_id`/`host_id`) — those are stamped locally by the
/// aggregator on ingestion (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowObservation {
    pub client_ip: String,
    pub server_ip: String,
    pub server_port: u16,
    pub ip_proto: u8,
    pub ingress: bool,
    pub policy_id: u32,
    pub application: u32,
    pub bytes: u64,
    pub sessions: u64,
    pub violates: u64,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    pub policy_action: u8,
    pub severity: u8,
    pub threat_id: u32,
    pub client_wl: String,
    pub server_wl: String,
    pub external_peer: String,
    pub local_peer: String,
}

/// A threat event keyed by the same fingerprint fields as its originating
/// flow, carried out-of-band from the bulk byte/session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatEvent {
    pub client_ip: String,
    pub server_ip: String,
    pub server_port: u16,
    pub ip_proto: u8,
    pub ingress: bool,
    pub policy_id: u32,
    pub application: u32,
    pub severity: u8,
    pub threat_id: u32,
    pub reported_at: i64,
}

/// A policy snapshot pushed down to the data-plane source so it can
/// enforce locally without a controller round trip per packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub rules: Vec<PolicySnapshotRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySnapshotRule {
    pub id: u32,
    pub from: String,
    pub to: String,
    pub ports: String,
    pub applications: Vec<u32>,
    pub action: u8,
    pub priority: i32,
}

#[cfg(test)]
#[path = "dataplane_tests.rs"]
mod tests;
