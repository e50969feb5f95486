// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Error kinds surfaced on the agent side (spec §7). Transport failures
/// of any kind collapse to `NotConnected`, driving the session state
/// machine back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentError {
    NotConnected,
    InvalidArgument,
    UnknownAgent,
}

impl AgentError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::UnknownAgent => "UNKNOWN_AGENT",
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for AgentError {}

/// Collapse any `tonic` transport failure to `NotConnected` (spec §7).
/// `code = 1` on the wire is the controller's `UnknownAgent` signal and
/// is preserved rather than flattened, since it drives re-registration
/// instead of a bare retry.
impl From<tonic::Status> for AgentError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::InvalidArgument => Self::InvalidArgument,
            tonic::Code::FailedPrecondition => Self::UnknownAgent,
            _ => Self::NotConnected,
        }
    }
}

impl From<msp_core::CoreError> for AgentError {
    fn from(e: msp_core::CoreError) -> Self {
        match e {
            msp_core::CoreError::InvalidArgument => Self::InvalidArgument,
            msp_core::CoreError::UnknownAgent => Self::UnknownAgent,
            _ => Self::NotConnected,
        }
    }
}
