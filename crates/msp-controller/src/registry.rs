// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent registry (spec §4.7, component C7): tracks per-agent
//! liveness and fires join/leave callbacks, modeled directly on the
//! teacher's `upstream::health` liveness sweep and `SessionEntry`'s
//! `AtomicU32` failure-counter shape.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use msp_core::model::Agent;

/// Stats an agent reports on each heartbeat (spec §6 `AgentStats`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentStats {
    pub cpu_millis: u64,
    pub mem_bytes: u64,
    pub connection_count: u32,
    pub workload_count: u32,
}

/// Per-agent registry entry (spec §4.7: `{info, last_seen, online, stats}`).
pub struct AgentEntry {
    pub info: Agent,
    last_seen: RwLock<Instant>,
    online: AtomicBool,
    stats: RwLock<AgentStats>,
}

impl AgentEntry {
    fn new(info: Agent) -> Self {
        Self { info, last_seen: RwLock::new(Instant::now()), online: AtomicBool::new(true), stats: RwLock::new(AgentStats::default()) }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub async fn stats(&self) -> AgentStats {
        *self.stats.read().await
    }
}

/// Callback invoked (off the registry lock) when an agent transitions
/// to online, and when it is marked offline by the liveness sweep.
pub type JoinCallback = Arc<dyn Fn(String, String) + Send + Sync>;
pub type LeaveCallback = Arc<dyn Fn(String) + Send + Sync>;

/// The agent registry (component C7).
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<AgentEntry>>>,
    liveness_timeout: Duration,
    shutdown: CancellationToken,
    on_join: JoinCallback,
    on_leave: LeaveCallback,
}

impl AgentRegistry {
    pub fn new(liveness_timeout: Duration, on_join: JoinCallback, on_leave: LeaveCallback) -> Arc<Self> {
        Arc::new(Self {
            agents: RwLock::new(HashMap::new()),
            liveness_timeout,
            shutdown: CancellationToken::new(),
            on_join,
            on_leave,
        })
    }

    /// `Register(info)` (spec §4.7): upsert, mark online, fire `on_join`.
    pub async fn register(&self, info: Agent) {
        let agent_id = info.id.clone();
        let host_id = info.host_id.clone();

        let mut agents = self.agents.write().await;
        match agents.get(&agent_id) {
            Some(existing) => {
                existing.online.store(true, Ordering::Release);
                *existing.last_seen.write().await = Instant::now();
            }
            None => {
                agents.insert(agent_id.clone(), Arc::new(AgentEntry::new(info)));
            }
        }
        drop(agents);

        let on_join = Arc::clone(&self.on_join);
        tokio::spawn(async move { on_join(agent_id, host_id) });
    }

    /// `Heartbeat(agent_id, stats)` (spec §4.7). Returns `false` if the
    /// agent is unknown and must re-register.
    pub async fn heartbeat(&self, agent_id: &str, stats: AgentStats) -> bool {
        let agents = self.agents.read().await;
        let Some(entry) = agents.get(agent_id) else {
            return false;
        };
        entry.online.store(true, Ordering::Release);
        *entry.last_seen.write().await = Instant::now();
        *entry.stats.write().await = stats;
        true
    }

    /// Touch `last_seen` for an agent known to have just communicated
    /// (spec §4.7: `ReportConnections`/`ReportThreats`/`ReportWorkload`
    /// touch `last_seen`). Returns `false` if the agent is unknown.
    pub async fn touch(&self, agent_id: &str) -> bool {
        let agents = self.agents.read().await;
        let Some(entry) = agents.get(agent_id) else {
            return false;
        };
        *entry.last_seen.write().await = Instant::now();
        true
    }

    pub async fn get(&self, agent_id: &str) -> Option<Arc<AgentEntry>> {
        self.agents.read().await.get(agent_id).cloned()
    }

    pub async fn list(&self) -> Vec<Arc<AgentEntry>> {
        self.agents.read().await.values().cloned().collect()
    }

    /// Spawn the background liveness sweep. Entries never get garbage
    /// collected, only flipped offline (spec §4.7).
    pub fn spawn_liveness_sweep(self: &Arc<Self>, interval: Duration) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = this.shutdown.cancelled() => break,
                    _ = timer.tick() => {}
                }

                let entries: Vec<Arc<AgentEntry>> = {
                    let agents = this.agents.read().await;
                    agents.values().cloned().collect()
                };

                for entry in &entries {
                    if !entry.is_online() {
                        continue;
                    }
                    let last_seen = *entry.last_seen.read().await;
                    if last_seen.elapsed() > this.liveness_timeout {
                        entry.online.store(false, Ordering::Release);
                        tracing::warn!(
                            agent_id = %entry.info.id,
                            silent_for = ?last_seen.elapsed(),
                            "marking agent offline after liveness timeout"
                        );
                        let on_leave = Arc::clone(&this.on_leave);
                        let agent_id = entry.info.id.clone();
                        tokio::spawn(async move { on_leave(agent_id) });
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
