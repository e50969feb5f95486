// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gRPC transport implementing the `MicroSegment` service defined in
//! `msp.v1` (spec §6).

mod convert;
mod service;

use std::sync::Arc;

use msp_proto::proto;

use crate::registry::AgentRegistry;
use crate::store::ControllerState;

/// gRPC implementation of `msp.v1.MicroSegment` (component C7's RPC face).
pub struct MspGrpc {
    state: Arc<ControllerState>,
    registry: Arc<AgentRegistry>,
    cluster_id: String,
    report_interval_s: u32,
}

impl MspGrpc {
    pub fn new(state: Arc<ControllerState>, registry: Arc<AgentRegistry>, cluster_id: String, report_interval_s: u32) -> Self {
        Self { state, registry, cluster_id, report_interval_s }
    }

    /// Build a [`tonic`] router for this service.
    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder().add_service(proto::micro_segment_server::MicroSegmentServer::new(self))
    }
}
