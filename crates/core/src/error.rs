//! Core error types for hive operations.
//!
//! Business-rule failures are explicit variants so the HTTP layer can map
//! each of them onto a status code; store and serialization failures are
//! opaque and surface as internal errors.

use thiserror::Error;

/// Core error type for hive operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Input errors
    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // Authorization errors
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    // Economic errors
    #[error("insufficient credits: {available} available, {requested} requested")]
    InsufficientCredits { available: u64, requested: u64 },

    // State errors
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    // Infrastructure errors
    #[error("store operation '{operation}' failed: {reason}")]
    Store { operation: String, reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl Error {
    /// Create a validation error not tied to a specific field.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Create a validation error for a named request field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Create a "required field" validation error.
    pub fn missing_field(field: &str) -> Self {
        Self::invalid_field(field, format!("{field} required"))
    }

    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an unauthorized error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Create a store failure.
    pub fn store(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state transition error.
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether the error is caused by the caller rather than the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store { .. } | Self::Serialization { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = Error::missing_field("soul_id");
        assert_eq!(err.to_string(), "soul_id required");
        assert!(matches!(err, Error::Validation { field: Some(ref f), .. } if f == "soul_id"));
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("agent", "a1");
        assert_eq!(err.to_string(), "agent not found: a1");
    }

    #[test]
    fn test_insufficient_credits_display() {
        let err = Error::InsufficientCredits {
            available: 100,
            requested: 1000,
        };
        assert!(err.to_string().contains("100 available"));
        assert!(err.to_string().contains("1000 requested"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::validation("bad").is_client_error());
        assert!(Error::conflict("busy").is_client_error());
        assert!(!Error::store("get", "io").is_client_error());
    }

    #[test]
    fn test_from_serde_error() {
        let parse: std::result::Result<u32, _> = serde_json::from_str::<u32>("nope");
        if let Err(e) = parse {
            let err: Error = e.into();
            assert!(matches!(err, Error::Serialization { .. }));
        }
    }
}
