// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The local data-plane channel (component C1, spec §4.1).
//!
//! A single [`tokio::net::UnixDatagram`] carries self-describing JSON
//! records (see [`msp_proto::dataplane`]) both ways: policy pushes and
//! endpoint/subnet configuration flow out to the packet-processing
//! source, flow observations and threat events flow back in.

use std::path::{Path, PathBuf};

use msp_proto::dataplane::{DataPlaneMessage, FlowObservation, PolicySnapshot, PolicySnapshotRule, ThreatEvent, MAX_DATAGRAM_BYTES};
use tokio::net::UnixDatagram;

use crate::error::AgentError;

/// Outbound/inbound channel to the local data-plane source.
///
/// Any I/O failure on the underlying socket surfaces as
/// [`AgentError::NotConnected`] (spec §7) — the session loop treats the
/// channel as down rather than distinguishing socket error kinds.
pub struct DataPlaneChannel {
    socket: UnixDatagram,
}

impl DataPlaneChannel {
    /// Connect to the data-plane source's well-known socket path.
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let bind_path = ephemeral_bind_path(socket_path.as_ref());
        let socket = UnixDatagram::bind(&bind_path).map_err(|_| AgentError::NotConnected)?;
        socket.connect(socket_path.as_ref()).map_err(|_| AgentError::NotConnected)?;
        Ok(Self { socket })
    }

    async fn send(&self, message: &DataPlaneMessage) -> Result<(), AgentError> {
        let bytes = message.encode().ok_or(AgentError::InvalidArgument)?;
        self.socket.send(&bytes).await.map_err(|_| AgentError::NotConnected)?;
        Ok(())
    }

    /// Push a full policy snapshot down to the data-plane source (spec §6:
    /// called whenever `GetPolicies` returns a changed rule set).
    pub async fn push_policy(&self, rules: &[msp_core::model::PolicyRule]) -> Result<(), AgentError> {
        let snapshot = PolicySnapshot {
            rules: rules
                .iter()
                .map(|r| PolicySnapshotRule {
                    id: r.id,
                    from: r.from.clone(),
                    to: r.to.clone(),
                    ports: r.ports.clone(),
                    applications: r.applications.clone(),
                    action: r.action.to_wire(),
                    priority: r.priority,
                })
                .collect(),
        };
        self.send(&DataPlaneMessage::Policy(snapshot)).await
    }

    /// Register a workload's MAC address so the data-plane source can tag
    /// observations with a workload id (spec §4.1).
    pub async fn add_endpoint(&self, mac: impl Into<String>, workload_id: impl Into<String>) -> Result<(), AgentError> {
        self.send(&DataPlaneMessage::AddMac { mac: mac.into(), workload_id: workload_id.into() }).await
    }

    /// Forget a previously registered MAC address.
    pub async fn remove_endpoint(&self, mac: impl Into<String>) -> Result<(), AgentError> {
        self.send(&DataPlaneMessage::DelMac { mac: mac.into() }).await
    }

    /// Tell the data-plane source which subnets are internal, so it can
    /// classify peers as local workloads vs. external (spec §4.1).
    pub async fn configure_internal_subnets(&self, subnets: &[String]) -> Result<(), AgentError> {
        self.send(&DataPlaneMessage::ConfigSubnets { subnets: subnets.to_vec() }).await
    }

    /// Receive the next inbound record, blocking until one arrives.
    pub async fn recv(&self) -> Result<DataPlaneEvent, AgentError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
        let n = self.socket.recv(&mut buf).await.map_err(|_| AgentError::NotConnected)?;
        match DataPlaneMessage::decode(&buf[..n]) {
            Ok(DataPlaneMessage::Connection(obs)) => Ok(DataPlaneEvent::Connection(obs)),
            Ok(DataPlaneMessage::Threat(threat)) => Ok(DataPlaneEvent::Threat(threat)),
            Ok(_) => Ok(DataPlaneEvent::Ignored),
            Err(_) => Err(AgentError::InvalidArgument),
        }
    }
}

/// The two record kinds the agent actually consumes off the channel;
/// anything else (a policy echo, say) is ignored rather than treated as
/// an error, since the wire format is shared by both directions.
pub enum DataPlaneEvent {
    Connection(FlowObservation),
    Threat(ThreatEvent),
    Ignored,
}

/// `UnixDatagram` requires its own bind address distinct from the peer
/// it `connect()`s to; colocate the agent's end next to the source socket.
fn ephemeral_bind_path(peer: &Path) -> PathBuf {
    let mut name = peer.file_name().map(|n| n.to_owned()).unwrap_or_default();
    name.push(format!(".agent-{}.sock", std::process::id()));
    peer.with_file_name(name)
}
