//! Error types for the CrewSync engine.

use crate::ResourceName;
use thiserror::Error;

/// All possible errors from the CrewSync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("unknown resource: {0}")]
    UnknownResource(ResourceName),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing record key '{field}' for {resource}")]
    MissingKey {
        resource: ResourceName,
        field: String,
    },

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
