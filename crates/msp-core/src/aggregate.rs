// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The connection aggregation engine (spec §4.2, component C2).
//!
//! Compresses an unbounded stream of per-flow observations into a bounded
//! set of [`ConnectionSummary`] values and hands them off to a callback on
//! a fixed cadence. Two locks are used, matching spec §5's "write-heavy
//! buffer, tick-heavy drain" separation: the observation/threat buffers
//! (appended to on every inbound message, never read except at tick time)
//! and the main map (mutated only by the tick loop).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::model::{ConnectionSummary, FlowFingerprint, PolicyAction};

/// Bound on the main connection map (spec §4.2).
pub const N_CONN: usize = 131_072;
/// Drain cadence (spec §4.2).
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);
/// Max summaries handed to a single `on_connections` invocation (spec §4.2).
pub const MAX_DRAIN: usize = 8_192;

/// A raw per-flow observation, pre-merge, pre-fingerprint.
///
/// Mirrors [`crate::model::ConnectionSummary`]'s fields but without
/// provenance — the aggregator stamps `agent_id`/`host_id` itself on
/// ingestion, per spec §4.2.
#[derive(Debug, Clone)]
pub struct Observation {
    pub client_ip: String,
    pub server_ip: String,
    pub server_port: u16,
    pub ip_proto: u8,
    pub ingress: bool,
    pub policy_id: u32,
    pub application: u32,
    pub bytes: u64,
    pub sessions: u64,
    pub violates: u64,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    pub policy_action: PolicyAction,
    pub severity: u8,
    pub threat_id: u32,
    pub client_wl: String,
    pub server_wl: String,
    pub external_peer: String,
    pub local_peer: String,
}

impl Observation {
    fn fingerprint(&self) -> FlowFingerprint {
        FlowFingerprint::new(
            self.client_ip.clone(),
            self.server_ip.clone(),
            self.server_port,
            self.ip_proto,
            self.ingress,
            self.policy_id,
            self.application,
        )
    }

    fn into_summary(self, agent_id: &str, host_id: &str) -> ConnectionSummary {
        ConnectionSummary {
            bytes: self.bytes,
            sessions: self.sessions,
            violates: self.violates,
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
            policy_action: self.policy_action,
            policy_id: self.policy_id,
            severity: self.severity,
            threat_id: self.threat_id,
            client_wl: self.client_wl,
            server_wl: self.server_wl,
            external_peer: self.external_peer,
            local_peer: self.local_peer,
            ingress: self.ingress,
            agent_id: agent_id.to_owned(),
            host_id: host_id.to_owned(),
        }
    }
}

/// A threat event keyed by the same fingerprint fields as its flow.
#[derive(Debug, Clone)]
pub struct ThreatObservation {
    pub client_ip: String,
    pub server_ip: String,
    pub server_port: u16,
    pub ip_proto: u8,
    pub ingress: bool,
    pub policy_id: u32,
    pub application: u32,
    pub severity: u8,
    pub threat_id: u32,
    pub reported_at: i64,
    pub agent_id: String,
    pub host_id: String,
}

/// Counters describing one tick's admission/drain behavior.
///
/// Ambient instrumentation, not a spec'd callback — surfaced via
/// `tracing` and [`Aggregator::metrics`] so operators can see the
/// admission-drop behavior that spec §7 calls out as a deliberate
/// "silent" design choice from the caller's perspective.
#[derive(Debug, Default)]
pub struct AggregatorMetrics {
    pub admitted: AtomicU64,
    pub dropped: AtomicU64,
    pub drained: AtomicU64,
    pub ticks: AtomicU64,
}

impl AggregatorMetrics {
    pub fn snapshot(&self) -> AggregatorMetricsSnapshot {
        AggregatorMetricsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorMetricsSnapshot {
    pub admitted: u64,
    pub dropped: u64,
    pub drained: u64,
    pub ticks: u64,
}

/// The aggregator's lifecycle phase (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorPhase {
    Idle,
    Running,
    Stopping,
}

const PHASE_IDLE: u32 = 0;
const PHASE_RUNNING: u32 = 1;
const PHASE_STOPPING: u32 = 2;

/// Callback invoked with a batch of drained connection summaries.
pub type ConnectionsCallback = Arc<dyn Fn(Vec<(FlowFingerprint, ConnectionSummary)>) + Send + Sync>;
/// Callback invoked with the drained threat buffer.
pub type ThreatsCallback = Arc<dyn Fn(Vec<ThreatObservation>) + Send + Sync>;

/// The bounded, callback-driven connection aggregator (component C2).
pub struct Aggregator {
    agent_id: String,
    host_id: String,
    obs_buffer: Mutex<Vec<Observation>>,
    threat_buffer: Mutex<Vec<ThreatObservation>>,
    main_map: RwLock<HashMap<FlowFingerprint, ConnectionSummary>>,
    phase: AtomicU32,
    shutdown: CancellationToken,
    on_connections: ConnectionsCallback,
    on_threats: ThreatsCallback,
    pub metrics: AggregatorMetrics,
}

impl Aggregator {
    pub fn new(
        agent_id: impl Into<String>,
        host_id: impl Into<String>,
        on_connections: ConnectionsCallback,
        on_threats: ThreatsCallback,
    ) -> Arc<Self> {
        Arc::new(Self {
            agent_id: agent_id.into(),
            host_id: host_id.into(),
            obs_buffer: Mutex::new(Vec::new()),
            threat_buffer: Mutex::new(Vec::new()),
            main_map: RwLock::new(HashMap::new()),
            phase: AtomicU32::new(PHASE_IDLE),
            shutdown: CancellationToken::new(),
            on_connections,
            on_threats,
            metrics: AggregatorMetrics::default(),
        })
    }

    pub fn phase(&self) -> AggregatorPhase {
        match self.phase.load(Ordering::Acquire) {
            PHASE_RUNNING => AggregatorPhase::Running,
            PHASE_STOPPING => AggregatorPhase::Stopping,
            _ => AggregatorPhase::Idle,
        }
    }

    /// Buffer an inbound flow observation. Non-blocking with respect to
    /// the main map: this only ever touches the observation buffer's own
    /// lock (spec §4.2, §5).
    pub fn observe(&self, obs: Observation) {
        self.obs_buffer.lock().push(obs);
    }

    /// Buffer an inbound threat event.
    pub fn threat(&self, threat: ThreatObservation) {
        self.threat_buffer.lock().push(threat);
    }

    /// Current size of the main map. Exposed for tests and operational
    /// introspection; not part of the spec'd public contract.
    pub async fn len(&self) -> usize {
        self.main_map.read().await.len()
    }

    /// Start the tick loop (`idle -> running`). Spawns a background task
    /// that owns the loop for the lifetime of the returned `Arc`.
    pub fn start(self: &Arc<Self>) {
        if self
            .phase
            .compare_exchange(PHASE_IDLE, PHASE_RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(TICK_INTERVAL);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so the first real flush
            // happens after a full interval, matching the spec's cadence.
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = this.shutdown.cancelled() => break,
                    _ = timer.tick() => {}
                }

                if this.phase.load(Ordering::Acquire) != PHASE_RUNNING {
                    break;
                }

                this.flush().await;
            }

            this.phase.store(PHASE_IDLE, Ordering::Release);
        });
    }

    /// Signal termination (`running -> stopping`). The tick loop exits at
    /// its next wakeup without performing an extra flush (spec §4.2).
    pub fn stop(&self) {
        self.phase.store(PHASE_STOPPING, Ordering::Release);
        self.shutdown.cancel();
    }

    /// Run one flush cycle: drain threats, apply buffered observations,
    /// then drain up to [`MAX_DRAIN`] summaries to `on_connections`.
    ///
    /// Exposed directly so tests can drive ticks deterministically instead
    /// of waiting on the real timer.
    pub async fn flush(&self) {
        self.metrics.ticks.fetch_add(1, Ordering::Relaxed);

        // (a) drain threat buffer
        let threats = std::mem::take(&mut *self.threat_buffer.lock());
        if !threats.is_empty() {
            (self.on_threats)(threats);
        }

        // (b) apply observation buffer to main map
        let pending = std::mem::take(&mut *self.obs_buffer.lock());
        if !pending.is_empty() {
            let mut map = self.main_map.write().await;
            for obs in pending {
                self.admit(&mut map, obs);
            }
        }

        // (c) drain up to MAX_DRAIN entries
        let batch = {
            let mut map = self.main_map.write().await;
            if map.is_empty() {
                Vec::new()
            } else {
                let keys: Vec<FlowFingerprint> = map.keys().take(MAX_DRAIN).cloned().collect();
                let mut batch = Vec::with_capacity(keys.len());
                for k in keys {
                    if let Some(v) = map.remove(&k) {
                        batch.push((k, v));
                    }
                }
                batch
            }
        };

        if !batch.is_empty() {
            self.metrics.drained.fetch_add(batch.len() as u64, Ordering::Relaxed);
            (self.on_connections)(batch);
        }
    }

    /// Apply admission + merge for a single observation (spec §4.2).
    fn admit(&self, map: &mut HashMap<FlowFingerprint, ConnectionSummary>, obs: Observation) {
        let fp = obs.fingerprint();

        if let Some(existing) = map.get_mut(&fp) {
            let incoming = obs.into_summary(&self.agent_id, &self.host_id);
            existing.merge(&incoming);
            self.metrics.admitted.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if map.len() < N_CONN {
            map.insert(fp, obs.into_summary(&self.agent_id, &self.host_id));
            self.metrics.admitted.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if obs.policy_action > PolicyAction::Allow {
            // Priority admission for security-relevant flows, even over
            // capacity (spec §4.2).
            map.insert(fp, obs.into_summary(&self.agent_id, &self.host_id));
            self.metrics.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                client_ip = %fp.client_ip,
                server_ip = %fp.server_ip,
                "aggregator at capacity, dropping low-priority observation"
            );
        }
    }
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
