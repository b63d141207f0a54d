//! Error types for the optimizer.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.

use std::io;
use serde::Serialize;
use thiserror::Error;

use crate::codec::EngineFault;
use crate::worker::WorkerError;

/// Argument errors detected before any work is scheduled.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum PreconditionError {
    /// An argument has the wrong shape (e.g. an empty input)
    #[error("{0}")]
    TypeError(String),
    /// An argument is well-formed but out of the accepted range
    #[error("{0}")]
    RangeError(String),
}

/// Main error type of an optimization run.
///
/// Engine faults are classified into the first four variants; everything a
/// caller can act on is distinguishable without parsing messages.
#[derive(Error, Debug)]
pub enum OptimizeError {
    /// The input is not a decodable JPEG
    #[error("Invalid image data")]
    InvalidImage(#[source] EngineFault),

    /// The fixed output target cannot hold the result
    #[error("Buffer too small")]
    BufferTooSmall,

    /// Growing the output buffer failed
    #[error("Allocation failed")]
    AllocationFailure,

    /// Any other engine fault, with the engine's own message
    #[error("{0}")]
    EngineDiagnostic(String),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// File IO error
    #[error("IO error: {0}")]
    IO(String),
}

/// Convenience result type for optimizer operations.
pub type OptimizeResult<T> = Result<T, OptimizeError>;

impl OptimizeError {
    /// Whether the input itself was rejected. Such failures never succeed on
    /// retry.
    pub fn is_invalid_image(&self) -> bool {
        matches!(self, Self::InvalidImage(_))
    }

    pub fn diagnostic<T: Into<String>>(msg: T) -> Self {
        Self::EngineDiagnostic(msg.into())
    }

    pub fn io<T: Into<String>>(msg: T) -> Self {
        Self::IO(msg.into())
    }
}

// Helper methods for precondition error creation
impl PreconditionError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::TypeError(msg) | Self::RangeError(msg) => msg,
        }
    }
}

// Convert std::io::Error to OptimizeError
impl From<io::Error> for OptimizeError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_messages() {
        assert_eq!(
            OptimizeError::InvalidImage(EngineFault::NoImage).to_string(),
            "Invalid image data"
        );
        assert_eq!(OptimizeError::BufferTooSmall.to_string(), "Buffer too small");
        assert_eq!(OptimizeError::AllocationFailure.to_string(), "Allocation failed");
        assert_eq!(
            OptimizeError::diagnostic("Bogus marker length").to_string(),
            "Bogus marker length"
        );
    }

    #[test]
    fn test_only_invalid_image_is_flagged() {
        assert!(OptimizeError::InvalidImage(EngineFault::NoSoi(0, 0)).is_invalid_image());
        assert!(!OptimizeError::BufferTooSmall.is_invalid_image());
        assert!(!OptimizeError::from(PreconditionError::type_error("x")).is_invalid_image());
    }

    #[test]
    fn test_precondition_serializes_kind() {
        let err = PreconditionError::range_error("Input and output buffer cannot be the same");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "RangeError");
        assert_eq!(json["message"], "Input and output buffer cannot be the same");
        assert_eq!(err.message(), "Input and output buffer cannot be the same");
    }
}
