// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gRPC client side of the `MicroSegment` service (spec §6),
//! translating every transport failure to [`AgentError::NotConnected`]
//! per spec §7.

use std::time::Duration;

use msp_core::model::{ConnectionSummary, PolicyAction, PolicyRule, Workload};
use msp_proto::proto;
use tonic::transport::Channel;
use tonic::Request;

use crate::error::AgentError;

/// Outcome of a `Register` call (spec §6).
pub struct Registration {
    pub cluster_id: String,
    pub report_interval_s: u32,
}

/// Thin wrapper over the generated tonic client, applying a per-call
/// deadline (spec §5: 5 s per unary call) and flattening errors.
pub struct ControlClient {
    inner: proto::micro_segment_client::MicroSegmentClient<Channel>,
    deadline: Duration,
    agent_id: String,
}

impl ControlClient {
    pub async fn connect(addr: impl Into<String>, agent_id: String, deadline: Duration) -> Result<Self, AgentError> {
        let endpoint = tonic::transport::Endpoint::from_shared(format!("http://{}", addr.into()))
            .map_err(|_| AgentError::InvalidArgument)?
            .connect_timeout(deadline);
        let channel = endpoint.connect().await.map_err(|_| AgentError::NotConnected)?;
        Ok(Self { inner: proto::micro_segment_client::MicroSegmentClient::new(channel), deadline, agent_id })
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request.set_timeout(self.deadline);
        request
    }

    pub async fn register(&mut self, host_id: &str, host_name: &str, domain: &str, version: &str) -> Result<Registration, AgentError> {
        let req = self.request(proto::RegisterRequest {
            agent: Some(proto::AgentInfo {
                agent_id: self.agent_id.clone(),
                host_id: host_id.to_owned(),
                host_name: host_name.to_owned(),
                domain: domain.to_owned(),
                version: version.to_owned(),
            }),
        });
        let resp = self.inner.register(req).await?.into_inner();
        if resp.code != 0 {
            return Err(AgentError::InvalidArgument);
        }
        Ok(Registration { cluster_id: resp.cluster_id, report_interval_s: resp.report_interval_s })
    }

    pub async fn heartbeat(&mut self, connection_count: u32, workload_count: u32) -> Result<(), AgentError> {
        let req = self.request(proto::HeartbeatRequest {
            agent_id: self.agent_id.clone(),
            stats: Some(proto::AgentStats { cpu_millis: 0, mem_bytes: 0, connection_count, workload_count }),
        });
        let resp = self.inner.heartbeat(req).await?.into_inner();
        if resp.code != 0 {
            return Err(AgentError::UnknownAgent);
        }
        Ok(())
    }

    pub async fn report_connections(&mut self, batch: &[ConnectionSummary]) -> Result<(), AgentError> {
        let connections = batch.iter().map(connection_to_wire).collect();
        let req = self.request(proto::ReportConnectionsRequest { agent_id: self.agent_id.clone(), connections });
        let resp = self.inner.report_connections(req).await?.into_inner();
        if resp.code != 0 {
            return Err(AgentError::UnknownAgent);
        }
        Ok(())
    }

    pub async fn report_threats(&mut self, fingerprint_keys: &[(String, u8, u32, i64)]) -> Result<(), AgentError> {
        let threats = fingerprint_keys
            .iter()
            .map(|(key, severity, threat_id, reported_at)| proto::ThreatEventWire {
                fingerprint_key: key.clone(),
                severity: *severity as u32,
                threat_id: *threat_id,
                reported_at: *reported_at,
            })
            .collect();
        let req = self.request(proto::ReportThreatsRequest { agent_id: self.agent_id.clone(), threats });
        let resp = self.inner.report_threats(req).await?.into_inner();
        if resp.code != 0 {
            return Err(AgentError::UnknownAgent);
        }
        Ok(())
    }

    pub async fn report_workload(&mut self, event_type: &str, workload: &Workload) -> Result<(), AgentError> {
        let req = self.request(proto::ReportWorkloadRequest { event_type: event_type.to_owned(), workload: Some(workload_to_wire(workload)) });
        let resp = self.inner.report_workload(req).await?.into_inner();
        if resp.code != 0 {
            return Err(AgentError::InvalidArgument);
        }
        Ok(())
    }

    pub async fn get_policies(&mut self) -> Result<Vec<PolicyRule>, AgentError> {
        let req = self.request(proto::GetPoliciesRequest { agent_id: self.agent_id.clone(), filters: None });
        let resp = self.inner.get_policies(req).await?.into_inner();
        Ok(resp.rules.into_iter().map(rule_from_wire).collect())
    }
}

impl From<tonic::Status> for AgentError {
    fn from(status: tonic::Status) -> Self {
        AgentError::from(&status)
    }
}

impl From<&tonic::Status> for AgentError {
    fn from(status: &tonic::Status) -> Self {
        match status.code() {
            tonic::Code::InvalidArgument => AgentError::InvalidArgument,
            tonic::Code::FailedPrecondition => AgentError::UnknownAgent,
            _ => AgentError::NotConnected,
        }
    }
}

fn connection_to_wire(summary: &ConnectionSummary) -> proto::ConnectionSummaryWire {
    proto::ConnectionSummaryWire {
        client_wl: summary.client_wl.clone(),
        server_wl: summary.server_wl.clone(),
        external_peer: summary.external_peer.clone(),
        local_peer: summary.local_peer.clone(),
        ingress: summary.ingress,
        client_ip: String::new(),
        server_ip: String::new(),
        server_port: 0,
        ip_proto: 0,
        application: 0,
        bytes: summary.bytes,
        sessions: summary.sessions,
        violates: summary.violates,
        first_seen_at: summary.first_seen_at,
        last_seen_at: summary.last_seen_at,
        policy_action: summary.policy_action.to_wire() as u32,
        policy_id: summary.policy_id,
        severity: summary.severity as u32,
        threat_id: summary.threat_id,
        agent_id: summary.agent_id.clone(),
        host_id: summary.host_id.clone(),
    }
}

fn workload_to_wire(workload: &Workload) -> proto::WorkloadWire {
    let interfaces = workload
        .interfaces
        .iter()
        .map(|(name, addrs)| proto::InterfaceWire {
            name: name.clone(),
            addresses: addrs.iter().map(|a| proto::AddressWire { ip: a.ip.clone(), scope: a.scope.clone() }).collect(),
        })
        .collect();

    proto::WorkloadWire {
        id: workload.id.clone(),
        name: workload.name.clone(),
        host_id: workload.host_id.clone(),
        domain: workload.domain.clone(),
        service: workload.service.clone(),
        image: workload.image.clone(),
        policy_mode: match workload.policy_mode {
            msp_core::model::PolicyMode::Protect => "protect".to_owned(),
            msp_core::model::PolicyMode::Monitor => "monitor".to_owned(),
        },
        running: workload.running,
        interfaces,
    }
}

fn rule_from_wire(wire: proto::PolicyRuleWire) -> PolicyRule {
    PolicyRule {
        id: wire.id,
        from: wire.from,
        to: wire.to,
        ports: wire.ports,
        applications: wire.applications,
        action: PolicyAction::from_wire(wire.action as u8).unwrap_or(PolicyAction::Open),
        priority: wire.priority,
        disable: wire.disable,
        comment: wire.comment,
        created_at: wire.created_at,
        updated_at: wire.updated_at,
    }
}
