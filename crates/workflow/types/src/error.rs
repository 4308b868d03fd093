//! The error taxonomy shared by every layer of the engine.
//!
//! Six categories, not a type hierarchy: every failure in the core maps to
//! exactly one of these, and the HTTP surface maps each to a status code.

use thiserror::Error;

/// A core-level failure, classified by the six categories the design
/// documents as a taxonomy rather than a nominal hierarchy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Malformed body, missing required query, wrong status value.
    #[error("input error: {0}")]
    InputError(String),

    /// Unknown instance/task/form.
    #[error("not found: {0}")]
    NotFound(String),

    /// User not applicant / not assignee of task.
    #[error("forbidden: {0}")]
    AuthzError(String),

    /// Not editable at this node/status; task not pending; no matching
    /// edge; node/instance mismatch.
    #[error("invalid state: {0}")]
    StateError(String),

    /// Required field missing; non-editable field in patch; expression
    /// invalid.
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// Transaction failure, constraint violation.
    #[error("storage error: {0}")]
    StorageError(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    /// Short, stable tag for logging and for the HTTP surface's error code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputError(_) => "input_error",
            Self::NotFound(_) => "not_found",
            Self::AuthzError(_) => "authz_error",
            Self::StateError(_) => "state_error",
            Self::ValidationError(_) => "validation_error",
            Self::StorageError(_) => "storage_error",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::StateError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn authz(msg: impl Into<String>) -> Self {
        Self::AuthzError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_per_variant() {
        assert_eq!(WorkflowError::validation("x").kind(), "validation_error");
        assert_eq!(WorkflowError::state("x").kind(), "state_error");
        assert_eq!(WorkflowError::not_found("x").kind(), "not_found");
        assert_eq!(WorkflowError::authz("x").kind(), "authz_error");
    }

    #[test]
    fn display_includes_message() {
        let e = WorkflowError::ValidationError("missing required field: reason".into());
        assert_eq!(e.to_string(), "validation failed: missing required field: reason");
    }
}
