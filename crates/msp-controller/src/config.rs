// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Configuration for the micro-segmentation controller.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "msp-controller")]
pub struct ControllerConfig {
    /// Host to bind the gRPC server on.
    #[arg(long, default_value = "0.0.0.0", env = "MSP_CONTROLLER_HOST")]
    pub host: String,

    /// Port for the gRPC control-plane server.
    #[arg(long, default_value_t = 18300, env = "MSP_CONTROLLER_GRPC_PORT")]
    pub grpc_port: u16,

    /// Port for the `/healthz`/`/readyz` HTTP endpoints.
    #[arg(long, default_value_t = 18301, env = "MSP_CONTROLLER_HEALTH_PORT")]
    pub health_port: u16,

    /// Opaque identifier handed to agents on `Register` (spec §6).
    #[arg(long, default_value = "micro-segment-cluster", env = "MSP_CONTROLLER_CLUSTER_ID")]
    pub cluster_id: String,

    /// `report_interval_s` advertised to agents (spec §6).
    #[arg(long, default_value_t = 5, env = "MSP_CONTROLLER_REPORT_INTERVAL_S")]
    pub report_interval_s: u32,

    /// Liveness sweep cadence in milliseconds (spec §4.7).
    #[arg(long, default_value_t = 30_000, env = "MSP_CONTROLLER_LIVENESS_SWEEP_MS")]
    pub liveness_sweep_ms: u64,

    /// Silence threshold before an agent is marked offline (spec §4.7).
    #[arg(long, default_value_t = 60_000, env = "MSP_CONTROLLER_LIVENESS_TIMEOUT_MS")]
    pub liveness_timeout_ms: u64,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "MSP_CONTROLLER_LOG_FORMAT")]
    pub log_format: String,

    /// Log level filter (passed through to `tracing_subscriber::EnvFilter`).
    #[arg(long, default_value = "info", env = "MSP_CONTROLLER_LOG_LEVEL")]
    pub log_level: String,
}

impl ControllerConfig {
    pub fn liveness_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_sweep_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }

    pub fn health_addr(&self) -> String {
        format!("{}:{}", self.host, self.health_port)
    }
}
