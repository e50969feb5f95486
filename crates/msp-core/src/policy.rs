// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The policy engine (spec §4.4, component C4): rule storage, evaluation
//! order, the match predicate, and per-group default actions.

pub mod portspec;

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::model::{PolicyAction, PolicyMode, PolicyRule, ANY_GROUP};
use portspec::PortSpec;

/// The result of evaluating `(from, to, port, proto, app)` against the
/// rule set (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub rule_id: u32,
    pub action: PolicyAction,
}

/// The policy engine: a prioritized rule set plus per-group modes.
///
/// Held behind one `RwLock` (spec §4.5 puts the actual storage in the
/// state store; this type is the pure evaluation logic the store
/// delegates to — grounded the same way the teacher splits `MuxState`
/// data from the behavior that acts on it).
pub struct PolicyEngine {
    rules: RwLock<HashMap<u32, PolicyRule>>,
    group_modes: RwLock<HashMap<String, PolicyMode>>,
    /// Secondary index for impact analysis on group changes (spec §4.5).
    group_index: RwLock<HashMap<String, std::collections::HashSet<u32>>>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            group_modes: RwLock::new(HashMap::new()),
            group_index: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_rule(&self, rule: PolicyRule) -> Result<(), CoreError> {
        PortSpec::parse(&rule.ports).ok_or(CoreError::InvalidArgument)?;

        let mut rules = self.rules.write().await;
        let mut index = self.group_index.write().await;
        index.entry(rule.from.clone()).or_default().insert(rule.id);
        index.entry(rule.to.clone()).or_default().insert(rule.id);
        rules.insert(rule.id, rule);
        Ok(())
    }

    pub async fn update_rule(&self, rule: PolicyRule) -> Result<(), CoreError> {
        PortSpec::parse(&rule.ports).ok_or(CoreError::InvalidArgument)?;

        let mut rules = self.rules.write().await;
        if !rules.contains_key(&rule.id) {
            return Err(CoreError::NotFound);
        }
        let mut index = self.group_index.write().await;
        if let Some(old) = rules.get(&rule.id) {
            if let Some(set) = index.get_mut(&old.from) {
                set.remove(&rule.id);
            }
            if let Some(set) = index.get_mut(&old.to) {
                set.remove(&rule.id);
            }
        }
        index.entry(rule.from.clone()).or_default().insert(rule.id);
        index.entry(rule.to.clone()).or_default().insert(rule.id);
        rules.insert(rule.id, rule);
        Ok(())
    }

    pub async fn delete_rule(&self, id: u32) -> Result<(), CoreError> {
        let mut rules = self.rules.write().await;
        let removed = rules.remove(&id).ok_or(CoreError::NotFound)?;
        let mut index = self.group_index.write().await;
        if let Some(set) = index.get_mut(&removed.from) {
            set.remove(&id);
        }
        if let Some(set) = index.get_mut(&removed.to) {
            set.remove(&id);
        }
        Ok(())
    }

    pub async fn get_rule(&self, id: u32) -> Result<PolicyRule, CoreError> {
        self.rules.read().await.get(&id).cloned().ok_or(CoreError::NotFound)
    }

    /// Rules sorted ascending by `priority`, ties broken ascending by
    /// `id` (spec §4.4). This is a snapshot — no torn reads (spec §5).
    pub async fn list_rules(&self) -> Vec<PolicyRule> {
        let rules = self.rules.read().await;
        let mut list: Vec<PolicyRule> = rules.values().cloned().collect();
        list.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        list
    }

    /// Rule ids touching a given group, for impact analysis (spec §4.5).
    pub async fn rules_for_group(&self, group: &str) -> Vec<u32> {
        self.group_index.read().await.get(group).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    pub async fn set_group_mode(&self, name: impl Into<String>, mode: PolicyMode) {
        self.group_modes.write().await.insert(name.into(), mode);
    }

    pub async fn get_group_mode(&self, name: &str) -> PolicyMode {
        self.group_modes.read().await.get(name).copied().unwrap_or(PolicyMode::Monitor)
    }

    /// Evaluate `(from, to, port, proto, app)` against the rule set (spec
    /// §4.4). Returns the first matching enabled rule in evaluation
    /// order, or `(0, default_action(to))` if none match.
    pub async fn evaluate(&self, from: &str, to: &str, port: u16, proto: u8, app: u32) -> MatchResult {
        for rule in self.list_rules().await {
            if rule.disable {
                continue;
            }
            if Self::matches(&rule, from, to, port, proto, app) {
                return MatchResult { rule_id: rule.id, action: rule.action };
            }
        }

        let mode = self.get_group_mode(to).await;
        MatchResult { rule_id: 0, action: mode.default_action() }
    }

    fn matches(rule: &PolicyRule, from: &str, to: &str, port: u16, proto: u8, app: u32) -> bool {
        let from_ok = rule.from == from || rule.from == ANY_GROUP;
        let to_ok = rule.to == to || rule.to == ANY_GROUP;
        if !from_ok || !to_ok {
            return false;
        }

        let ports_ok = match PortSpec::parse(&rule.ports) {
            Some(spec) => spec.matches(port, proto),
            None => false,
        };
        if !ports_ok {
            return false;
        }

        rule.applications.is_empty() || rule.applications.contains(&0) || rule.applications.contains(&app)
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
