// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire contracts shared by `msp-controller` and `msp-agent`.
//!
//! Two independent wire formats live here:
//! - the `msp.v1` gRPC service (generated by `tonic-prost-build` from
//!   `proto/msp/v1/msp.proto`), used for the agent↔controller RPC surface;
//! - the data-plane datagram record (`dataplane` module), a hand-rolled
//!   self-describing text record used for the agent↔data-plane-source
//!   channel, which has no protobuf schema per the source spec.

pub mod dataplane;

/// Generated protobuf types for the `msp.v1` package.
pub mod proto {
    tonic::include_proto!("msp.v1");
}
