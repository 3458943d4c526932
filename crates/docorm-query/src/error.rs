//! Error types for criterion compilation.

use thiserror::Error;

/// Error during compilation of a criterion tree.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CompileError {
    /// The error message.
    pub message: String,
    /// Error kind for programmatic handling.
    pub kind: CompileErrorKind,
}

/// Kinds of compilation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// The criterion has no document form.
    UnsupportedOperation,
    /// The criterion refers to something the entity model cannot satisfy.
    InvalidArgument,
    /// The entity model is inconsistent with what the criterion needs.
    IllegalState,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(message: impl Into<String>, kind: CompileErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(message, CompileErrorKind::InvalidArgument)
    }

    /// Create an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(message, CompileErrorKind::IllegalState)
    }

    /// Create an error for a criterion variant with no document handler.
    pub fn unsupported(variant: &str) -> Self {
        Self::new(
            format!(
                "Queries of type {} are not supported by this implementation",
                variant
            ),
            CompileErrorKind::UnsupportedOperation,
        )
    }

    /// Create an unknown property error. `criterion` is `None` when the
    /// property was named by a sort order.
    pub fn unknown_property(criterion: Option<&str>, name: &str) -> Self {
        let message = match criterion {
            Some(criterion) => format!(
                "Cannot use [{}] criterion on non-existent property path: {}",
                criterion, name
            ),
            None => format!("Cannot order on non-existent property path: {}", name),
        };
        Self::invalid_argument(message)
    }

    /// Create an error for an association path that was not declared joined.
    pub fn not_joined(path: &str) -> Self {
        Self::invalid_argument(format!("Property is not joined at path: {}", path))
    }

    /// Create an error for a join inside an update or delete statement.
    pub fn join_not_allowed() -> Self {
        Self::invalid_argument("Joins cannot be used in a DELETE or UPDATE operation")
    }

    /// Create an unknown entity error.
    pub fn unknown_entity(entity: &str) -> Self {
        Self::invalid_argument(format!("unknown entity '{}'", entity))
    }
}

impl From<docorm_core::Error> for CompileError {
    fn from(err: docorm_core::Error) -> Self {
        let kind = match &err {
            docorm_core::Error::UnsupportedOperation(_) => CompileErrorKind::UnsupportedOperation,
            docorm_core::Error::IllegalState(_) | docorm_core::Error::Storage(_) => {
                CompileErrorKind::IllegalState
            }
            docorm_core::Error::InvalidArgument(_) => CompileErrorKind::InvalidArgument,
        };
        Self::new(err.to_string(), kind)
    }
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_property_messages() {
        let err = CompileError::unknown_property(Some("Equals"), "nme");
        assert_eq!(
            err.to_string(),
            "Cannot use [Equals] criterion on non-existent property path: nme"
        );
        assert_eq!(err.kind, CompileErrorKind::InvalidArgument);

        let err = CompileError::unknown_property(None, "nme");
        assert_eq!(
            err.to_string(),
            "Cannot order on non-existent property path: nme"
        );
    }

    #[test]
    fn test_unsupported_names_variant() {
        let err = CompileError::unsupported("Like");
        assert!(err.message.contains("Like"));
        assert_eq!(err.kind, CompileErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_from_core_error_keeps_kind() {
        let err: CompileError = docorm_core::Error::IllegalState("x".into()).into();
        assert_eq!(err.kind, CompileErrorKind::IllegalState);
    }
}
