// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod client;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod session;

use std::sync::Arc;

use msp_core::aggregate::{Aggregator, Observation, ThreatObservation};
use msp_core::model::PolicyAction;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use config::AgentConfig;
use dataplane::{DataPlaneChannel, DataPlaneEvent};
use session::Session;

/// Run the agent until `shutdown` fires: connect the data-plane channel,
/// wire the aggregator's callbacks through the session, and pump inbound
/// flow/threat records from C1 into C2 until cancellation.
pub async fn run(config: AgentConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let dataplane = Arc::new(DataPlaneChannel::connect(&config.dataplane_socket).await?);

    let session = Session::new(config.clone(), dataplane.clone());
    let on_connections = session.connections_callback();
    let on_threats = session.threats_callback();

    let aggregator = Aggregator::new(config.agent_id.clone(), config.host_id.clone(), on_connections, on_threats);
    aggregator.start();

    let handle = session.spawn();
    info!(agent_id = %config.agent_id, "agent session started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = dataplane.recv() => {
                match received {
                    Ok(DataPlaneEvent::Connection(obs)) => aggregator.observe(to_observation(obs)),
                    Ok(DataPlaneEvent::Threat(threat)) => aggregator.threat(to_threat_observation(threat, &config.agent_id, &config.host_id)),
                    Ok(DataPlaneEvent::Ignored) => {}
                    Err(e) => warn!(error = %e, "data-plane channel read failed"),
                }
            }
        }
    }

    handle.stop();
    aggregator.stop();
    info!("agent session stopped");
    Ok(())
}

fn to_observation(o: msp_proto::dataplane::FlowObservation) -> Observation {
    Observation {
        client_ip: o.client_ip,
        server_ip: o.server_ip,
        server_port: o.server_port,
        ip_proto: o.ip_proto,
        ingress: o.ingress,
        policy_id: o.policy_id,
        application: o.application,
        bytes: o.bytes,
        sessions: o.sessions,
        violates: o.violates,
        first_seen_at: o.first_seen_at,
        last_seen_at: o.last_seen_at,
        policy_action: PolicyAction::from_wire(o.policy_action).unwrap_or_else(|| {
            error!(value = o.policy_action, "unknown policy_action on wire, defaulting to open");
            PolicyAction::Open
        }),
        severity: o.severity,
        threat_id: o.threat_id,
        client_wl: o.client_wl,
        server_wl: o.server_wl,
        external_peer: o.external_peer,
        local_peer: o.local_peer,
    }
}

fn to_threat_observation(t: msp_proto::dataplane::ThreatEvent, agent_id: &str, host_id: &str) -> ThreatObservation {
    ThreatObservation {
        client_ip: t.client_ip,
        server_ip: t.server_ip,
        server_port: t.server_port,
        ip_proto: t.ip_proto,
        ingress: t.ingress,
        policy_id: t.policy_id,
        application: t.application,
        severity: t.severity,
        threat_id: t.threat_id,
        reported_at: t.reported_at,
        agent_id: agent_id.to_owned(),
        host_id: host_id.to_owned(),
    }
}
