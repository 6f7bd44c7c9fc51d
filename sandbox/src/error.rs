//! Sandbox error types.

use switchboard_hostapi::HostError;
use switchboard_primitives::{AbiError, ErrorCode, ModuleId};

/// Top-level error type for the sandbox crate.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module validation failed (missing exports, bad imports, etc.).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A host backend failed while serving a guest. Aborts the whole
    /// top-level call.
    #[error("host error: {0}")]
    HostError(#[from] HostError),

    #[error("module {0} is not deployed")]
    ModuleNotFound(ModuleId),

    #[error("module {0} is already deployed")]
    AlreadyDeployed(ModuleId),

    #[error("function '{0}' not found")]
    FunctionNotFound(String),

    /// The configured depth does not leave room for the call.
    #[error("call depth {0} exceeded")]
    CallDepthExceeded(usize),

    /// Entry point declared an output longer than the argument buffer.
    #[error("declared return length {0} exceeds the argument buffer")]
    ReturnTooLarge(usize),

    /// Points exhausted during execution.
    #[error("out of points")]
    OutOfPoints,

    /// WASM guest trapped.
    #[error("guest trapped: {0}")]
    GuestTrapped(String),

    /// Guest aborted through the `panic` import.
    #[error("guest panicked: {0}")]
    GuestPanic(String),

    /// A host primitive was handed a range outside the guest's linear
    /// memory. Aborts the whole top-level call.
    #[error("memory access out of bounds: offset {offset}, len {len}, memory size {mem_len}")]
    MemoryAccessOutOfBounds { offset: u64, len: u64, mem_len: usize },

    /// Argument or return encoding failed.
    #[error("abi error: {0}")]
    Abi(#[from] AbiError),
}

impl SandboxError {
    /// The status a guest would observe for this failure.
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            Self::ModuleNotFound(_) => ErrorCode::ModuleNotFound,
            Self::FunctionNotFound(_) => ErrorCode::FunctionNotFound,
            Self::OutOfPoints => ErrorCode::OutOfPoints,
            Self::CallDepthExceeded(_) => ErrorCode::CallDepthExceeded,
            Self::GuestTrapped(_) | Self::GuestPanic(_) => ErrorCode::CalleeFailed,
            Self::ReturnTooLarge(_) => ErrorCode::ReturnTooLarge,
            Self::HostError(e) => e.to_error_code(),
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this failure aborts a call tree at any depth rather than
    /// being reported to the caller as a status.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MemoryAccessOutOfBounds { .. } | Self::HostError(_))
    }
}

/// Trap raised inside a host primitive on an out-of-bounds guest range.
///
/// Never converted to a status; nested dispatch re-raises it so the
/// top-level call fails with `SandboxError::MemoryAccessOutOfBounds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("memory access out of bounds: offset {offset}, len {len}, memory size {mem_len}")]
pub struct MemoryFault {
    pub offset: u64,
    pub len: u64,
    pub mem_len: usize,
}

impl From<MemoryFault> for SandboxError {
    fn from(fault: MemoryFault) -> Self {
        Self::MemoryAccessOutOfBounds {
            offset: fault.offset,
            len: fault.len,
            mem_len: fault.mem_len,
        }
    }
}

/// Trap raised when a frame cannot pay for a host primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("points exhausted: needed {needed}, remaining {remaining}")]
pub struct PointsExhausted {
    pub needed: u64,
    pub remaining: u64,
}

/// Trap raised by the `panic` import, carrying the guest's message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("guest panicked: {0}")]
pub struct GuestPanic(pub String);
