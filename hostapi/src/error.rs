//! Host-side error type for the switchboard dispatcher.
//!
//! `HostError` covers failures of the host's own backends (a resource store
//! that cannot be read, for example). They are never the guest's fault, so
//! the dispatcher does not turn them into a callee status: they abort the
//! top-level call and surface as `SandboxError::HostError`.

use std::fmt;

use switchboard_primitives::ErrorCode;

/// Host-side error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A backend could not serve a request.
    Internal(String),
}

impl HostError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The status reported for this failure. Host failures are always
    /// `ERR_INTERNAL`.
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "internal host error: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}
