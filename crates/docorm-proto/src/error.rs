//! Errors raised while binding values into a compiled query.

use thiserror::Error;

/// Binding-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The number of supplied values does not match the number of bindings.
    #[error("binding count mismatch: expected {expected}, got {actual}")]
    BindingCount { expected: usize, actual: usize },

    /// A binding could not be resolved to a value.
    #[error("unresolved binding '{key}': {reason}")]
    Unresolved { key: String, reason: String },
}
