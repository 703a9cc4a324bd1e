//! Service-layer error: everything a service call can fail with.

use thiserror::Error;

use orbit_auth::AuthzError;
use orbit_core::DomainError;

use crate::pdf::PdfError;
use crate::repository::RepositoryError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Only surfaced by explicit rendering; sending tolerates PDF failures.
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Optimistic concurrency failure; the caller may reload and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::Repository(RepositoryError::Conflict(_))
                | ServiceError::Domain(DomainError::Conflict(_))
        )
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, ServiceError::Repository(RepositoryError::Duplicate(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::NotFound(_)))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            ServiceError::Authz(AuthzError::Forbidden(_) | AuthzError::NotOwner(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(ServiceError::from(RepositoryError::Conflict("v".into())).is_conflict());
        assert!(ServiceError::from(DomainError::conflict("v")).is_conflict());
        assert!(ServiceError::from(RepositoryError::Duplicate("INV".into())).is_duplicate());
        assert!(ServiceError::from(DomainError::not_found("invoice")).is_not_found());
        assert!(ServiceError::from(AuthzError::Forbidden("payments.write".into())).is_forbidden());
        assert!(!ServiceError::from(DomainError::validation("x")).is_conflict());
    }

    #[test]
    fn messages_pass_through() {
        let err = ServiceError::from(DomainError::not_found("invoice"));
        assert_eq!(err.to_string(), "invoice not found");
    }
}
