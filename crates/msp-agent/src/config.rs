// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Configuration for the per-host micro-segmentation agent.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "msp-agent")]
pub struct AgentConfig {
    /// Stable identifier for this agent instance.
    #[arg(long, env = "MSP_AGENT_ID")]
    pub agent_id: String,

    /// Identifier of the host this agent runs on.
    #[arg(long, env = "MSP_HOST_ID")]
    pub host_id: String,

    /// Human-readable host name, reported at `Register` time.
    #[arg(long, default_value = "", env = "MSP_HOST_NAME")]
    pub host_name: String,

    /// Policy domain this agent's workloads belong to.
    #[arg(long, default_value = "default", env = "MSP_DOMAIN")]
    pub domain: String,

    /// `host:port` of the controller's gRPC endpoint.
    #[arg(long, default_value = "127.0.0.1:18300", env = "MSP_CONTROLLER_ADDR")]
    pub controller_addr: String,

    /// Path to the local datagram socket shared with the packet-processing
    /// process (component C1).
    #[arg(long, default_value = "/run/msp/dataplane.sock", env = "MSP_DATAPLANE_SOCKET")]
    pub dataplane_socket: std::path::PathBuf,

    /// Heartbeat cadence in milliseconds (spec §4.3: 15 s).
    #[arg(long, default_value_t = 15_000, env = "MSP_HEARTBEAT_MS")]
    pub heartbeat_ms: u64,

    /// `GetPolicies` poll cadence in milliseconds (spec §4.3: 10 s).
    #[arg(long, default_value_t = 10_000, env = "MSP_POLICY_POLL_MS")]
    pub policy_poll_ms: u64,

    /// Per-RPC deadline in milliseconds (spec §5: 5 s per unary call).
    #[arg(long, default_value_t = 5_000, env = "MSP_RPC_DEADLINE_MS")]
    pub rpc_deadline_ms: u64,

    /// Initial backoff before a `Register` retry, doubled on each
    /// consecutive failure up to `max_backoff_ms` (spec §4.3).
    #[arg(long, default_value_t = 500, env = "MSP_REGISTER_BACKOFF_MS")]
    pub register_backoff_ms: u64,

    /// Cap on the `Register` retry backoff (spec §4.3: 30 s).
    #[arg(long, default_value_t = 30_000, env = "MSP_REGISTER_MAX_BACKOFF_MS")]
    pub register_max_backoff_ms: u64,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "MSP_AGENT_LOG_FORMAT")]
    pub log_format: String,

    /// Log level filter (passed through to `tracing_subscriber::EnvFilter`).
    #[arg(long, default_value = "info", env = "MSP_AGENT_LOG_LEVEL")]
    pub log_level: String,
}

impl AgentConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn policy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.policy_poll_ms)
    }

    pub fn rpc_deadline(&self) -> Duration {
        Duration::from_millis(self.rpc_deadline_ms)
    }

    pub fn register_backoff(&self) -> Duration {
        Duration::from_millis(self.register_backoff_ms)
    }

    pub fn register_max_backoff(&self) -> Duration {
        Duration::from_millis(self.register_max_backoff_ms)
    }
}
