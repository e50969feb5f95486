// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin translation between wire (`msp_proto::proto`) and core
//! (`msp_core::model`) types, in the teacher's `convert.rs` idiom.

use msp_core::model::{Agent, ConnectionSummary, InterfaceAddress, PolicyAction, PolicyMode, PolicyRule, Workload};
use msp_proto::proto;

use crate::registry::AgentStats;

pub fn agent_info_to_core(info: proto::AgentInfo) -> Agent {
    Agent { id: info.agent_id, name: info.host_name.clone(), host_id: info.host_id, domain: info.domain, version: info.version }
}

pub fn stats_from_wire(stats: Option<proto::AgentStats>) -> AgentStats {
    let s = stats.unwrap_or_default();
    AgentStats { cpu_millis: s.cpu_millis, mem_bytes: s.mem_bytes, connection_count: s.connection_count, workload_count: s.workload_count }
}

pub fn connection_from_wire(wire: proto::ConnectionSummaryWire) -> ConnectionSummary {
    ConnectionSummary {
        bytes: wire.bytes,
        sessions: wire.sessions,
        violates: wire.violates,
        first_seen_at: wire.first_seen_at,
        last_seen_at: wire.last_seen_at,
        policy_action: PolicyAction::from_wire(wire.policy_action as u8).unwrap_or(PolicyAction::Open),
        policy_id: wire.policy_id,
        severity: wire.severity as u8,
        threat_id: wire.threat_id,
        client_wl: wire.client_wl,
        server_wl: wire.server_wl,
        external_peer: wire.external_peer,
        local_peer: wire.local_peer,
        ingress: wire.ingress,
        agent_id: wire.agent_id,
        host_id: wire.host_id,
    }
}

pub fn workload_from_wire(wire: proto::WorkloadWire) -> Workload {
    let mut interfaces = std::collections::HashMap::new();
    for iface in wire.interfaces {
        let addrs = iface.addresses.into_iter().map(|a| InterfaceAddress { ip: a.ip, scope: a.scope }).collect();
        interfaces.insert(iface.name, addrs);
    }

    Workload {
        id: wire.id,
        name: wire.name,
        host_id: wire.host_id,
        domain: wire.domain,
        service: wire.service,
        image: wire.image,
        policy_mode: if wire.policy_mode == "protect" { PolicyMode::Protect } else { PolicyMode::Monitor },
        running: wire.running,
        interfaces,
    }
}

pub fn rule_to_wire(rule: &PolicyRule) -> proto::PolicyRuleWire {
    proto::PolicyRuleWire {
        id: rule.id,
        from: rule.from.clone(),
        to: rule.to.clone(),
        ports: rule.ports.clone(),
        applications: rule.applications.clone(),
        action: rule.action.to_wire() as u32,
        priority: rule.priority,
        disable: rule.disable,
        comment: rule.comment.clone(),
        created_at: rule.created_at,
        updated_at: rule.updated_at,
    }
}
