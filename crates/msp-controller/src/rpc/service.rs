// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `MicroSegment` trait implementation — the six unary RPC handlers
//! (spec §6), modeled directly on the teacher's
//! `transport/grpc/service.rs`.

use msp_proto::proto;
use tonic::{Request, Response, Status};

use super::convert::{agent_info_to_core, connection_from_wire, rule_to_wire, stats_from_wire, workload_from_wire};
use super::MspGrpc;
use crate::error::ControllerError;

#[tonic::async_trait]
impl proto::micro_segment_server::MicroSegment for MspGrpc {
    async fn register(&self, request: Request<proto::RegisterRequest>) -> Result<Response<proto::RegisterResponse>, Status> {
        let req = request.into_inner();
        let info = req.agent.ok_or_else(|| ControllerError::InvalidArgument.to_grpc_status("missing agent info"))?;
        let agent = agent_info_to_core(info);

        self.state.upsert_agent(agent.clone()).await;
        self.registry.register(agent).await;

        Ok(Response::new(proto::RegisterResponse {
            code: 0,
            message: String::new(),
            cluster_id: self.cluster_id.clone(),
            report_interval_s: self.report_interval_s,
        }))
    }

    async fn heartbeat(&self, request: Request<proto::HeartbeatRequest>) -> Result<Response<proto::HeartbeatResponse>, Status> {
        let req = request.into_inner();
        let stats = stats_from_wire(req.stats);

        if !self.registry.heartbeat(&req.agent_id, stats).await {
            return Ok(Response::new(proto::HeartbeatResponse { code: ControllerError::UnknownAgent.wire_code(), timestamp: now_ms() }));
        }

        Ok(Response::new(proto::HeartbeatResponse { code: 0, timestamp: now_ms() }))
    }

    async fn report_connections(
        &self,
        request: Request<proto::ReportConnectionsRequest>,
    ) -> Result<Response<proto::ReportConnectionsResponse>, Status> {
        let req = request.into_inner();

        if !self.registry.touch(&req.agent_id).await {
            return Ok(Response::new(proto::ReportConnectionsResponse {
                code: ControllerError::UnknownAgent.wire_code(),
                message: "agent must re-register".to_owned(),
                report_interval_s: self.report_interval_s,
            }));
        }

        let summaries = req.connections.into_iter().map(connection_from_wire).collect();
        self.state.apply_connections(summaries).await;

        Ok(Response::new(proto::ReportConnectionsResponse { code: 0, message: String::new(), report_interval_s: self.report_interval_s }))
    }

    async fn report_threats(&self, request: Request<proto::ReportThreatsRequest>) -> Result<Response<proto::ReportThreatsResponse>, Status> {
        let req = request.into_inner();

        if !self.registry.touch(&req.agent_id).await {
            return Ok(Response::new(proto::ReportThreatsResponse {
                code: ControllerError::UnknownAgent.wire_code(),
                message: "agent must re-register".to_owned(),
            }));
        }

        // Threat persistence is contract-only in this core: accept and
        // acknowledge. A future store could fold these into an incident log.
        for threat in &req.threats {
            tracing::info!(
                agent_id = %req.agent_id,
                fingerprint = %threat.fingerprint_key,
                severity = threat.severity,
                threat_id = threat.threat_id,
                "threat report received"
            );
        }

        Ok(Response::new(proto::ReportThreatsResponse { code: 0, message: String::new() }))
    }

    async fn report_workload(&self, request: Request<proto::ReportWorkloadRequest>) -> Result<Response<proto::ReportWorkloadResponse>, Status> {
        let req = request.into_inner();
        let Some(wire) = req.workload else {
            return Err(ControllerError::InvalidArgument.to_grpc_status("missing workload"));
        };
        let workload = workload_from_wire(wire);

        match req.event_type.as_str() {
            "add" | "update" => self.state.upsert_workload(workload).await,
            "delete" => {
                if self.state.delete_workload(&workload.id).await.is_err() {
                    tracing::debug!(workload_id = %workload.id, "delete_workload: already absent");
                }
            }
            other => {
                return Err(ControllerError::InvalidArgument.to_grpc_status(format!("unknown event_type: {other}")));
            }
        }

        Ok(Response::new(proto::ReportWorkloadResponse { code: 0, message: String::new() }))
    }

    async fn get_policies(&self, request: Request<proto::GetPoliciesRequest>) -> Result<Response<proto::GetPoliciesResponse>, Status> {
        let req = request.into_inner();
        self.registry.touch(&req.agent_id).await;

        let domain_filter = req.filters.map(|f| f.domain).filter(|d| !d.is_empty());
        let mut rules = self.state.policy.list_rules().await;

        if let Some(domain) = domain_filter {
            let mut kept = Vec::with_capacity(rules.len());
            for rule in rules {
                let to_domain = self.state.get_group(&rule.to).await.map(|g| g.domain);
                let from_domain = self.state.get_group(&rule.from).await.map(|g| g.domain);
                if to_domain.as_deref() == Some(domain.as_str()) || from_domain.as_deref() == Some(domain.as_str()) {
                    kept.push(rule);
                }
            }
            rules = kept;
        }

        Ok(Response::new(proto::GetPoliciesResponse { rules: rules.iter().map(rule_to_wire).collect() }))
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}
