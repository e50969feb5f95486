// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The micro-segmentation controller: the state store (C5), the agent
//! registry (C7), and the gRPC surface (§6) that fronts both.

pub mod config;
pub mod error;
pub mod http;
pub mod registry;
pub mod rpc;
pub mod store;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::http::HealthState;
use crate::registry::AgentRegistry;
use crate::rpc::MspGrpc;
use crate::store::ControllerState;

/// Run the controller until `shutdown` is cancelled.
pub async fn run(config: ControllerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let state = Arc::new(ControllerState::new());

    let on_join: registry::JoinCallback = Arc::new(|agent_id, host_id| {
        tracing::info!(agent_id = %agent_id, host_id = %host_id, "agent joined");
    });
    let on_leave: registry::LeaveCallback = Arc::new(|agent_id| {
        tracing::info!(agent_id = %agent_id, "agent went offline");
    });
    let registry = AgentRegistry::new(config.liveness_timeout(), on_join, on_leave);
    registry.spawn_liveness_sweep(config.liveness_sweep_interval());

    let health_state = HealthState::new(Arc::clone(&registry));
    let health_router = http::build_router(Arc::clone(&health_state));
    let health_addr = config.health_addr();
    let health_listener = TcpListener::bind(&health_addr).await?;
    let health_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, health_router).with_graceful_shutdown(health_shutdown.cancelled_owned()).await {
            tracing::error!(err = %e, "health server exited with error");
        }
    });

    let grpc_addr: std::net::SocketAddr = config.grpc_addr().parse()?;
    let grpc = MspGrpc::new(Arc::clone(&state), Arc::clone(&registry), config.cluster_id.clone(), config.report_interval_s);
    let router = grpc.into_router();

    health_state.mark_ready();
    tracing::info!(addr = %grpc_addr, "msp-controller listening");

    router.serve_with_shutdown(grpc_addr, shutdown.cancelled_owned()).await?;

    registry.stop();
    Ok(())
}
