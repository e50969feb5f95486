// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn summary(bytes: u64, sessions: u64, violates: u64, seen: i64, severity: u8, threat_id: u32) -> ConnectionSummary {
    ConnectionSummary {
        bytes,
        sessions,
        violates,
        first_seen_at: seen,
        last_seen_at: seen,
        policy_action: PolicyAction::Allow,
        policy_id: 1,
        severity,
        threat_id,
        client_wl: "web".to_owned(),
        server_wl: "db".to_owned(),
        external_peer: String::new(),
        local_peer: String::new(),
        ingress: false,
        agent_id: "a1".to_owned(),
        host_id: "h1".to_owned(),
    }
}

#[test]
fn fingerprint_excludes_client_port_and_splits_by_protocol() {
    let tcp = FlowFingerprint::new("10.0.0.1", "10.0.0.2", 3306, PROTO_TCP, false, 1, 0);
    assert_eq!(tcp.server_port, Some(3306));

    let icmp = FlowFingerprint::new("10.0.0.1", "10.0.0.2", 3306, 1, false, 1, 0);
    assert_eq!(icmp.server_port, None, "non-TCP/UDP fingerprints drop the port entirely");
}

#[test]
fn merge_sums_counters_additively() {
    let mut acc = summary(100, 1, 0, 10, 0, 0);
    acc.merge(&summary(200, 1, 1, 20, 0, 0));
    acc.merge(&summary(50, 1, 0, 5, 0, 0));

    assert_eq!(acc.bytes, 350);
    assert_eq!(acc.sessions, 3);
    assert_eq!(acc.violates, 1);
}

#[test]
fn merge_is_last_seen_wins_for_classification() {
    let mut acc = summary(0, 0, 0, 10, 0, 0);
    acc.policy_action = PolicyAction::Allow;
    acc.policy_id = 1;

    let mut later = summary(0, 0, 0, 20, 0, 0);
    later.policy_action = PolicyAction::Deny;
    later.policy_id = 2;
    acc.merge(&later);

    assert_eq!(acc.policy_action, PolicyAction::Deny);
    assert_eq!(acc.policy_id, 2);
    assert_eq!(acc.last_seen_at, 20);

    // An earlier-timestamped merge must not roll back the classification.
    let mut earlier = summary(0, 0, 0, 5, 0, 0);
    earlier.policy_action = PolicyAction::Open;
    earlier.policy_id = 9;
    acc.merge(&earlier);
    assert_eq!(acc.policy_action, PolicyAction::Deny);
    assert_eq!(acc.last_seen_at, 20);
}

#[test]
fn merge_never_overwrites_first_seen_at() {
    let mut acc = summary(0, 0, 0, 10, 0, 0);
    acc.merge(&summary(0, 0, 0, 3, 0, 0));
    acc.merge(&summary(0, 0, 0, 100, 0, 0));
    assert_eq!(acc.first_seen_at, 3);
}

#[test]
fn severity_is_monotone_max_paired_with_its_threat_id() {
    let mut acc = summary(0, 0, 0, 1, 2, 42);
    acc.merge(&summary(0, 0, 0, 2, 1, 99));
    // Lower severity does not replace the higher one or its threat id.
    assert_eq!(acc.severity, 2);
    assert_eq!(acc.threat_id, 42);

    acc.merge(&summary(0, 0, 0, 3, 4, 7));
    assert_eq!(acc.severity, 4);
    assert_eq!(acc.threat_id, 7);
}

proptest! {
    /// Spec §8.1: merge outcome for `bytes`/`sessions`/`violates` is
    /// order-independent — it equals the arithmetic sum regardless of the
    /// order observations are applied in.
    #[test]
    fn merge_commutes_over_counters(
        values in proptest::collection::vec((0u64..10_000, 0u64..100, 0u64..10, 0i64..1_000_000, 0u8..5, 0u32..100), 1..20),
    ) {
        let make = |(b, s, v, t, sev, tid): (u64, u64, u64, i64, u8, u32)| summary(b, s, v, t, sev, tid);

        let forward: Vec<_> = values.iter().cloned().map(make).collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let empty_acc = || {
            let mut s = summary(0, 0, 0, i64::MAX, 0, 0);
            s.last_seen_at = i64::MIN;
            s
        };

        let mut acc_forward = empty_acc();
        for s in &forward {
            acc_forward.merge(s);
        }

        let mut acc_reversed = empty_acc();
        for s in &reversed {
            acc_reversed.merge(s);
        }

        let expected_bytes: u64 = values.iter().map(|v| v.0).sum();
        let expected_sessions: u64 = values.iter().map(|v| v.1).sum();
        let expected_violates: u64 = values.iter().map(|v| v.2).sum();

        prop_assert_eq!(acc_forward.bytes, expected_bytes);
        prop_assert_eq!(acc_forward.sessions, expected_sessions);
        prop_assert_eq!(acc_forward.violates, expected_violates);
        prop_assert_eq!(acc_forward.bytes, acc_reversed.bytes);
        prop_assert_eq!(acc_forward.sessions, acc_reversed.sessions);
        prop_assert_eq!(acc_forward.violates, acc_reversed.violates);

        let expected_last = values.iter().map(|v| v.3).max().unwrap();
        let expected_first = values.iter().map(|v| v.3).min().unwrap();
        prop_assert_eq!(acc_forward.last_seen_at, expected_last);
        prop_assert_eq!(acc_forward.first_seen_at, expected_first);

        let expected_severity = values.iter().map(|v| v.4).max().unwrap();
        prop_assert_eq!(acc_forward.severity, expected_severity);
    }
}
