//! Error types for capkit

use thiserror::Error;

use crate::state::SessionState;

/// Result type alias for capkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for capkit
///
/// Every variant maps to one [`ErrorKind`]. Variants carrying a `String`
/// hold a human-readable diagnostic; the kind alone is enough to react.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A parameter failed validation before any driver call
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    /// Backend initialisation failed
    #[error("Backend initialisation failed: {0}")]
    InitFailed(String),

    /// Opening the capture device failed
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    /// Compiling or installing a filter failed
    #[error("Failed to set filter: {0}")]
    SetFilterFailed(String),

    /// The capture loop could not be started
    #[error("Failed to start capture: {0}")]
    StartFailed(String),

    /// The capture loop could not be stopped
    #[error("Failed to stop capture: {0}")]
    StopFailed(String),

    /// Pausing the capture failed
    #[error("Failed to pause capture: {0}")]
    PauseFailed(String),

    /// Resuming the capture failed
    #[error("Failed to resume capture: {0}")]
    ResumeFailed(String),

    /// Reading driver counters failed
    #[error("Failed to read statistics: {0}")]
    GetStatsFailed(String),

    /// Device enumeration failed
    #[error("Failed to enumerate devices: {0}")]
    GetDevicesFailed(String),

    /// The backend does not implement an optional capability
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Driver-specific failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Allocation failure reported by a driver
    #[error("Out of memory")]
    OutOfMemory,

    /// A driver operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),

    /// The requested operation is not allowed in the current lifecycle state
    #[error("Operation '{operation}' not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A backend with the same type tag is already registered
    #[error("Backend already registered: {0}")]
    AlreadyRegistered(String),

    /// No backend, device or option exists under the requested name
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Fieldless classification of [`Error`] for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParam,
    InitFailed,
    OpenFailed,
    SetFilterFailed,
    StartFailed,
    StopFailed,
    PauseFailed,
    ResumeFailed,
    GetStatsFailed,
    GetDevicesFailed,
    NotSupported,
    Backend,
    OutOfMemory,
    Timeout,
    Internal,
    InvalidState,
    AlreadyRegistered,
    NotFound,
}

impl Error {
    /// Create an invalid parameter error
    pub fn invalid_param<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::InvalidParam {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-supported error for the named operation
    pub fn not_supported<S: Into<String>>(operation: S) -> Self {
        Error::NotSupported(operation.into())
    }

    /// Create a backend error with a custom message
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Error::Backend(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Error::InvalidState { operation, state }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParam { .. } => ErrorKind::InvalidParam,
            Error::InitFailed(_) => ErrorKind::InitFailed,
            Error::OpenFailed(_) => ErrorKind::OpenFailed,
            Error::SetFilterFailed(_) => ErrorKind::SetFilterFailed,
            Error::StartFailed(_) => ErrorKind::StartFailed,
            Error::StopFailed(_) => ErrorKind::StopFailed,
            Error::PauseFailed(_) => ErrorKind::PauseFailed,
            Error::ResumeFailed(_) => ErrorKind::ResumeFailed,
            Error::GetStatsFailed(_) => ErrorKind::GetStatsFailed,
            Error::GetDevicesFailed(_) => ErrorKind::GetDevicesFailed,
            Error::NotSupported(_) => ErrorKind::NotSupported,
            Error::Backend(_) => ErrorKind::Backend,
            Error::OutOfMemory => ErrorKind::OutOfMemory,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Internal(_) => ErrorKind::Internal,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            Error::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// True for the benign "capability missing" outcome
    pub fn is_not_supported(&self) -> bool {
        self.kind() == ErrorKind::NotSupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::invalid_param("device", "empty").kind(),
            ErrorKind::InvalidParam
        );
        assert_eq!(Error::not_supported("pause").kind(), ErrorKind::NotSupported);
        assert_eq!(Error::backend("boom").kind(), ErrorKind::Backend);
        assert_eq!(
            Error::invalid_state("start", SessionState::Closed).kind(),
            ErrorKind::InvalidState
        );
        assert!(Error::not_supported("resume").is_not_supported());
        assert!(!Error::OutOfMemory.is_not_supported());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::invalid_param("snaplen", "must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'snaplen': must be positive"
        );

        let err = Error::invalid_state("pause", SessionState::Open);
        assert_eq!(err.to_string(), "Operation 'pause' not allowed in state Open");
    }
}
