// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent session state machine (component C3, spec §4.3).
//!
//! Modeled on the teacher's "channel + config" session idiom: a
//! [`watch`] channel publishes the current [`SessionPhase`] for
//! observability, an [`mpsc`] channel carries workload lifecycle events
//! in, and three periodic tasks run for the lifetime of a connected
//! session. A connection-lost signal (any RPC collapsing to
//! [`AgentError::NotConnected`]) drives the state machine back to
//! `Disconnected`, where it resumes with exponential backoff.

use std::sync::Arc;

use msp_core::model::{ConnectionSummary, PolicyRule, Workload};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ControlClient;
use crate::config::AgentConfig;
use crate::dataplane::DataPlaneChannel;
use crate::error::AgentError;

/// spec §4.3: `disconnected -> registering -> connected -> disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Registering,
    Connected,
}

/// The client slot shared between the state machine and the aggregator
/// callbacks: `None` whenever the session is not `Connected`.
pub type SharedClient = Arc<Mutex<Option<ControlClient>>>;

struct WorkloadEvent {
    event_type: &'static str,
    workload: Workload,
}

/// Handle returned to the binary entrypoint: observe the session phase,
/// forward workload lifecycle events, and request shutdown.
pub struct SessionHandle {
    phase_rx: watch::Receiver<SessionPhase>,
    workload_tx: mpsc::Sender<WorkloadEvent>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub fn phase(&self) -> SessionPhase {
        *self.phase_rx.borrow()
    }

    /// Forward a local container lifecycle event (spec §4.3: not batched).
    pub async fn report_workload(&self, event_type: &'static str, workload: Workload) {
        if self.workload_tx.send(WorkloadEvent { event_type, workload }).await.is_err() {
            warn!("workload event dropped: session task is gone");
        }
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// Owns the shared state a session's background tasks and the
/// aggregator's callbacks both need, before any of it starts running.
/// Built first so [`Session::connections_callback`]/[`threats_callback`]
/// can be wired into the [`msp_core::aggregate::Aggregator`] before
/// [`Session::spawn`] starts the periodic tasks.
pub struct Session {
    config: AgentConfig,
    client_slot: SharedClient,
    phase_tx: watch::Sender<SessionPhase>,
    phase_rx: watch::Receiver<SessionPhase>,
    lost_tx: mpsc::Sender<()>,
    lost_rx: mpsc::Receiver<()>,
    dataplane: Arc<DataPlaneChannel>,
}

impl Session {
    pub fn new(config: AgentConfig, dataplane: Arc<DataPlaneChannel>) -> Self {
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Disconnected);
        let (lost_tx, lost_rx) = mpsc::channel(8);
        Self { config, client_slot: Arc::new(Mutex::new(None)), phase_tx, phase_rx, lost_tx, lost_rx, dataplane }
    }

    pub fn connections_callback(
        &self,
    ) -> Arc<dyn Fn(Vec<(msp_core::model::FlowFingerprint, ConnectionSummary)>) + Send + Sync> {
        connections_callback(self.client_slot.clone(), self.phase_rx.clone(), self.lost_tx.clone())
    }

    pub fn threats_callback(&self) -> Arc<dyn Fn(Vec<msp_core::aggregate::ThreatObservation>) + Send + Sync> {
        threats_callback(self.client_slot.clone(), self.phase_rx.clone(), self.lost_tx.clone())
    }

    /// Start the state machine and its three periodic tasks (spec §4.3).
    pub fn spawn(self) -> SessionHandle {
        let (workload_tx, workload_rx) = mpsc::channel(256);
        let shutdown = CancellationToken::new();

        tokio::spawn(run_state_machine(self.config.clone(), self.phase_tx, self.client_slot.clone(), self.lost_rx, shutdown.clone()));
        tokio::spawn(heartbeat_loop(self.config.clone(), self.client_slot.clone(), self.phase_rx.clone(), self.lost_tx.clone(), shutdown.clone()));
        tokio::spawn(policy_poll_loop(self.config, self.client_slot.clone(), self.phase_rx.clone(), self.lost_tx.clone(), self.dataplane, shutdown.clone()));
        tokio::spawn(workload_forward_loop(self.client_slot, self.phase_rx.clone(), self.lost_tx, workload_rx, shutdown.clone()));

        SessionHandle { phase_rx: self.phase_rx, workload_tx, shutdown }
    }
}

async fn try_register(config: &AgentConfig, client_slot: &SharedClient) -> Result<(), AgentError> {
    let mut client = ControlClient::connect(config.controller_addr.clone(), config.agent_id.clone(), config.rpc_deadline()).await?;
    client.register(&config.host_id, &config.host_name, &config.domain, env!("CARGO_PKG_VERSION")).await?;
    *client_slot.lock().await = Some(client);
    Ok(())
}

async fn run_state_machine(
    config: AgentConfig,
    phase_tx: watch::Sender<SessionPhase>,
    client_slot: SharedClient,
    mut lost_rx: mpsc::Receiver<()>,
    shutdown: CancellationToken,
) {
    let mut backoff = config.register_backoff();
    loop {
        let _ = phase_tx.send(SessionPhase::Registering);
        match try_register(&config, &client_slot).await {
            Ok(()) => {
                info!(agent_id = %config.agent_id, "registered with controller");
                backoff = config.register_backoff();
                let _ = phase_tx.send(SessionPhase::Connected);
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = lost_rx.recv() => {
                        warn!("connection lost, returning to disconnected");
                        *client_slot.lock().await = None;
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, backoff_ms = backoff.as_millis(), "register failed, backing off");
                let _ = phase_tx.send(SessionPhase::Disconnected);
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = next_backoff(backoff, config.register_max_backoff());
            }
        }
    }
}

/// Double the backoff, capped (spec §4.3: exponential, capped at 30 s).
fn next_backoff(current: std::time::Duration, cap: std::time::Duration) -> std::time::Duration {
    (current * 2).min(cap)
}

fn is_connected(phase_rx: &watch::Receiver<SessionPhase>) -> bool {
    matches!(*phase_rx.borrow(), SessionPhase::Connected)
}

async fn signal_lost(lost_tx: &mpsc::Sender<()>) {
    let _ = lost_tx.try_send(());
}

async fn heartbeat_loop(
    config: AgentConfig,
    client_slot: SharedClient,
    phase_rx: watch::Receiver<SessionPhase>,
    lost_tx: mpsc::Sender<()>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.heartbeat_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                if !is_connected(&phase_rx) {
                    continue;
                }
                let mut guard = client_slot.lock().await;
                if let Some(client) = guard.as_mut() {
                    if let Err(e) = client.heartbeat(0, 0).await {
                        warn!(error = %e, "heartbeat failed");
                        signal_lost(&lost_tx).await;
                    }
                }
            }
        }
    }
}

/// Poll `GetPolicies` every `policy_poll_ms`; push to C1 only when the
/// returned rule set differs from the last-applied snapshot (spec §4.3).
async fn policy_poll_loop(
    config: AgentConfig,
    client_slot: SharedClient,
    phase_rx: watch::Receiver<SessionPhase>,
    lost_tx: mpsc::Sender<()>,
    dataplane: Arc<DataPlaneChannel>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.policy_poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_applied: Option<Vec<PolicyRule>> = None;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                if !is_connected(&phase_rx) {
                    continue;
                }
                let fetched = {
                    let mut guard = client_slot.lock().await;
                    match guard.as_mut() {
                        Some(client) => client.get_policies().await,
                        None => continue,
                    }
                };
                match fetched {
                    Ok(rules) => {
                        if last_applied.as_ref() != Some(&rules) {
                            if let Err(e) = dataplane.push_policy(&rules).await {
                                warn!(error = %e, "failed to push policy snapshot to data plane");
                            } else {
                                debug!(rule_count = rules.len(), "applied updated policy snapshot");
                                last_applied = Some(rules);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "get_policies failed");
                        signal_lost(&lost_tx).await;
                    }
                }
            }
        }
    }
}

async fn workload_forward_loop(
    client_slot: SharedClient,
    phase_rx: watch::Receiver<SessionPhase>,
    lost_tx: mpsc::Sender<()>,
    mut events: mpsc::Receiver<WorkloadEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            event = events.recv() => {
                let Some(event) = event else { return };
                if !is_connected(&phase_rx) {
                    warn!(workload_id = %event.workload.id, "dropping workload event: session not connected");
                    continue;
                }
                let mut guard = client_slot.lock().await;
                if let Some(client) = guard.as_mut() {
                    if let Err(e) = client.report_workload(event.event_type, &event.workload).await {
                        warn!(error = %e, "report_workload failed");
                        signal_lost(&lost_tx).await;
                    }
                }
            }
        }
    }
}

/// Build the aggregator's `on_connections` callback: reports a drained
/// batch through the shared client, firing outside the aggregator's
/// internal lock via `tokio::spawn` (spec §5).
pub fn connections_callback(
    client_slot: SharedClient,
    phase_rx: watch::Receiver<SessionPhase>,
    lost_tx: mpsc::Sender<()>,
) -> Arc<dyn Fn(Vec<(msp_core::model::FlowFingerprint, ConnectionSummary)>) + Send + Sync> {
    Arc::new(move |batch| {
        if !is_connected(&phase_rx) {
            return;
        }
        let client_slot = client_slot.clone();
        let lost_tx = lost_tx.clone();
        tokio::spawn(async move {
            let summaries: Vec<ConnectionSummary> = batch.into_iter().map(|(_, s)| s).collect();
            let mut guard = client_slot.lock().await;
            if let Some(client) = guard.as_mut() {
                if let Err(e) = client.report_connections(&summaries).await {
                    warn!(error = %e, "report_connections failed");
                    signal_lost(&lost_tx).await;
                }
            }
        });
    })
}

/// Build the aggregator's `on_threats` callback, mirroring
/// [`connections_callback`].
pub fn threats_callback(
    client_slot: SharedClient,
    phase_rx: watch::Receiver<SessionPhase>,
    lost_tx: mpsc::Sender<()>,
) -> Arc<dyn Fn(Vec<msp_core::aggregate::ThreatObservation>) + Send + Sync> {
    Arc::new(move |threats| {
        if !is_connected(&phase_rx) {
            return;
        }
        let client_slot = client_slot.clone();
        let lost_tx = lost_tx.clone();
        tokio::spawn(async move {
            let keys: Vec<(String, u8, u32, i64)> = threats
                .into_iter()
                .map(|t| {
                    let key = format!("{}-{}-{}-{}", t.client_ip, t.server_ip, t.server_port, t.ip_proto);
                    (key, t.severity, t.threat_id, t.reported_at)
                })
                .collect();
            let mut guard = client_slot.lock().await;
            if let Some(client) = guard.as_mut() {
                if let Err(e) = client.report_threats(&keys).await {
                    warn!(error = %e, "report_threats failed");
                    signal_lost(&lost_tx).await;
                }
            }
        });
    })
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
