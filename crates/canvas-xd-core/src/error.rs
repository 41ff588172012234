//! Shared error type across canvas-xd crates.

use thiserror::Error;

/// Stable error codes (surfaced in logs and host error payloads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Caller passed an argument the API cannot work with.
    IllegalArgument,
    /// Malformed message or configuration.
    BadRequest,
    /// Origin could not be derived or is not acceptable.
    InvalidOrigin,
    /// Every sequence number is bound to a live call.
    RegistryFull,
    /// Call cancelled by its owner.
    Cancelled,
    /// Call dropped before any response arrived.
    Abandoned,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in payloads and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::IllegalArgument => "ILLEGAL_ARGUMENT",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::InvalidOrigin => "INVALID_ORIGIN",
            ErrorCode::RegistryFull => "REGISTRY_FULL",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Abandoned => "ABANDONED",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, XdError>;

/// Unified error type used by core and bridge.
#[derive(Debug, Error)]
pub enum XdError {
    #[error("illegal argument: {0}")]
    IllegalArgument(&'static str),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid origin: {0}")]
    InvalidOrigin(String),
    #[error("correlation registry full ({0} calls in flight)")]
    RegistryFull(usize),
    #[error("call cancelled")]
    Cancelled,
    #[error("call abandoned before a response arrived")]
    Abandoned,
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl XdError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            XdError::IllegalArgument(_) => ErrorCode::IllegalArgument,
            XdError::BadRequest(_) => ErrorCode::BadRequest,
            XdError::InvalidOrigin(_) => ErrorCode::InvalidOrigin,
            XdError::RegistryFull(_) => ErrorCode::RegistryFull,
            XdError::Cancelled => ErrorCode::Cancelled,
            XdError::Abandoned => ErrorCode::Abandoned,
            XdError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            XdError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Caller-misuse errors are programming errors and must not be retried.
    pub fn is_caller_misuse(&self) -> bool {
        matches!(self, XdError::IllegalArgument(_) | XdError::RegistryFull(_))
    }
}
