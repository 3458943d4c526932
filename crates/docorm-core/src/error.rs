//! Core error types.

use thiserror::Error;

/// Errors raised by cascades, operation frames and the catalog.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested operation has no implementation for this input.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// An argument does not fit the entity metadata.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine reached a state it cannot continue from.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Create an unknown entity error.
    pub fn unknown_entity(entity: &str) -> Self {
        Error::InvalidArgument(format!("unknown entity '{}'", entity))
    }

    /// Create an error for a record whose slot disagrees with its metadata.
    pub fn slot_mismatch(entity: &str, property: &str, expected: &str) -> Self {
        Error::IllegalState(format!(
            "property '{}' of entity '{}' does not hold {}",
            property, entity, expected
        ))
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
