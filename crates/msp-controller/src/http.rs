// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/healthz`/`/readyz` HTTP endpoints, in the teacher's `transport::http`
//! idiom.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::registry::AgentRegistry;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub agent_count: usize,
    pub online_agent_count: usize,
}

/// Shared state for the health router: a registry handle plus a
/// "serving" flag flipped once the gRPC listener is bound.
pub struct HealthState {
    registry: Arc<AgentRegistry>,
    ready: AtomicBool,
}

impl HealthState {
    pub fn new(registry: Arc<AgentRegistry>) -> Arc<Self> {
        Arc::new(Self { registry, ready: AtomicBool::new(false) })
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "running" })
}

async fn readyz(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let agents = state.registry.list().await;
    let online = agents.iter().filter(|a| a.is_online()).count();
    Json(ReadyResponse { ready: state.ready.load(Ordering::Acquire), agent_count: agents.len(), online_agent_count: online })
}

pub fn build_router(state: Arc<HealthState>) -> Router {
    Router::new().route("/healthz", get(healthz)).route("/readyz", get(readyz)).with_state(state)
}
