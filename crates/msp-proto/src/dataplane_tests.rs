// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_observation() -> FlowObservation {
    FlowObservation {
        client_ip: "10.0.0.1".to_owned(),
        server_ip: "10.0.0.2".to_owned(),
        server_port: 3306,
        ip_proto: 6,
        ingress: false,
        policy_id: 1,
        application: 0,
        bytes: 100,
        sessions: 1,
        violates: 0,
        first_seen_at: 1000,
        last_seen_at: 1000,
        policy_action: 1,
        severity: 0,
        threat_id: 0,
        client_wl: "web".to_owned(),
        server_wl: "db".to_owned(),
        external_peer: String::new(),
        local_peer: String::new(),
    }
}

#[test]
fn round_trips_connection_message() {
    let msg = DataPlaneMessage::Connection(sample_observation());
    let encoded = msg.encode().expect("encodes under the datagram cap");
    let decoded = DataPlaneMessage::decode(&encoded).expect("decodes");
    match decoded {
        DataPlaneMessage::Connection(obs) => assert_eq!(obs.bytes, 100),
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn tag_is_the_wire_discriminant() {
    let msg = DataPlaneMessage::DelMac { mac: "aa:bb:cc:dd:ee:ff".to_owned() };
    let encoded = msg.encode().expect("encodes");
    let text = String::from_utf8(encoded).expect("utf8");
    assert!(text.contains("\"type\":\"del_mac\""));
}

#[test]
fn oversized_payload_is_rejected_before_send() {
    let msg = DataPlaneMessage::ConfigSubnets {
        subnets: vec!["10.0.0.0/8".to_owned(); MAX_DATAGRAM_BYTES],
    };
    assert!(msg.encode().is_none());
}
