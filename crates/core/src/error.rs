//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// illegal lifecycle transitions, missing records, conflicts). Infrastructure
/// concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive quantity, overpayment).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is illegal for the entity's current status
    /// (e.g. editing a paid invoice).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity is missing or soft-deleted.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A conflict occurred (stale version, duplicate unique key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(DomainError::not_found("client").to_string(), "client not found");
    }

    #[test]
    fn invalid_state_keeps_message() {
        let err = DomainError::invalid_state("cannot update a paid invoice");
        assert_eq!(err.to_string(), "invalid state: cannot update a paid invoice");
    }
}
