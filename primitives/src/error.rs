//! Status codes returned across the host boundary, and codec errors.

use core::fmt;

/// Status codes returned by the cross-call host function.
///
/// `0` = OK, non-zero = the call did not complete and the caller's
/// argument buffer must not be trusted. These repr values are part of the
/// ABI and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    ModuleNotFound = 1,
    FunctionNotFound = 2,
    OutOfPoints = 3,
    CallDepthExceeded = 4,
    CalleeFailed = 5,
    ReturnTooLarge = 6,
    Internal = 10,
}

impl ErrorCode {
    /// Convert from an i32 status returned by a host function.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::ModuleNotFound),
            2 => Some(Self::FunctionNotFound),
            3 => Some(Self::OutOfPoints),
            4 => Some(Self::CallDepthExceeded),
            5 => Some(Self::CalleeFailed),
            6 => Some(Self::ReturnTooLarge),
            10 => Some(Self::Internal),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::ModuleNotFound => write!(f, "ERR_MODULE_NOT_FOUND"),
            Self::FunctionNotFound => write!(f, "ERR_FUNCTION_NOT_FOUND"),
            Self::OutOfPoints => write!(f, "ERR_OUT_OF_POINTS"),
            Self::CallDepthExceeded => write!(f, "ERR_CALL_DEPTH_EXCEEDED"),
            Self::CalleeFailed => write!(f, "ERR_CALLEE_FAILED"),
            Self::ReturnTooLarge => write!(f, "ERR_RETURN_TOO_LARGE"),
            Self::Internal => write!(f, "ERR_INTERNAL"),
        }
    }
}

/// Argument-buffer encoding and decoding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiError {
    /// Encoding would write past the end of the buffer.
    BufferOverflow { needed: usize, capacity: usize },
    /// Decoding ran past the declared input length.
    UnexpectedEnd { needed: usize, available: usize },
    /// Decoding finished with unread input left over.
    TrailingBytes { remaining: usize },
    /// A declared length exceeds the buffer capacity.
    LengthOutOfRange { len: usize, capacity: usize },
    /// A byte that is not a valid encoding of the expected type.
    InvalidValue,
}

impl fmt::Display for AbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferOverflow { needed, capacity } => {
                write!(f, "buffer overflow: need {} bytes, capacity {}", needed, capacity)
            }
            Self::UnexpectedEnd { needed, available } => {
                write!(f, "unexpected end of input: need {} bytes, {} available", needed, available)
            }
            Self::TrailingBytes { remaining } => {
                write!(f, "{} trailing bytes after decoding", remaining)
            }
            Self::LengthOutOfRange { len, capacity } => {
                write!(f, "length {} exceeds buffer capacity {}", len, capacity)
            }
            Self::InvalidValue => write!(f, "invalid encoded value"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AbiError {}
