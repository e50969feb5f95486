// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error codes surfaced by the controller, shared across its gRPC and
/// HTTP-adjacent surfaces (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerError {
    NotFound,
    InvalidArgument,
    UnknownAgent,
    Internal,
}

impl ControllerError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::UnknownAgent => "UNKNOWN_AGENT",
            Self::Internal => "INTERNAL",
        }
    }

    /// Wire code carried in RPC responses (spec §6: `0` is success,
    /// nonzero is reserved for `UnknownAgent` and `InvalidArgument`).
    pub fn wire_code(&self) -> u32 {
        match self {
            Self::UnknownAgent => 1,
            Self::InvalidArgument => 2,
            Self::NotFound => 3,
            Self::Internal => 4,
        }
    }

    pub fn to_grpc_status(&self, message: impl Into<String>) -> tonic::Status {
        let code = match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::InvalidArgument => tonic::Code::InvalidArgument,
            Self::UnknownAgent => tonic::Code::FailedPrecondition,
            Self::Internal => tonic::Code::Internal,
        };
        tonic::Status::new(code, message)
    }
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ControllerError {}

impl From<msp_core::CoreError> for ControllerError {
    fn from(e: msp_core::CoreError) -> Self {
        match e {
            msp_core::CoreError::NotFound => Self::NotFound,
            msp_core::CoreError::InvalidArgument => Self::InvalidArgument,
            msp_core::CoreError::UnknownAgent => Self::UnknownAgent,
            msp_core::CoreError::NotConnected | msp_core::CoreError::Capacity => Self::Internal,
        }
    }
}
