use chrono::{DateTime, Utc};
use thiserror::Error;

use orbit_core::{AggregateRoot, ExpectedVersion};

/// Storage-level failures, independent of any backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The stored version moved since the aggregate was loaded.
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    /// A unique business key (invoice or ticket number) is already taken.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// An aggregate that can be kept in a [`Repository`].
pub trait Stored: AggregateRoot<Id: Ord + Send + Sync> + Clone + Send + Sync + 'static {
    /// Entity name used in `NotFound` errors and logs.
    const ENTITY: &'static str;

    /// Business key that must be unique across all records of this type.
    fn unique_key(&self) -> Option<String> {
        None
    }

    /// Ordering key for "newest first" listings (creation time).
    fn sort_key(&self) -> Option<DateTime<Utc>>;
}

/// Versioned record storage keyed by typed id.
///
/// Implementations must:
/// - reject `save` when `expected` does not match the stored version
///   (absent records count as version 0)
/// - reject `save` when another record already holds the same unique key
/// - reject `delete` of an existing record whose version does not match
pub trait Repository<A: Stored>: Send + Sync {
    fn get(&self, id: &A::Id) -> Result<Option<A>, RepositoryError>;

    fn save(&self, aggregate: &A, expected: ExpectedVersion) -> Result<(), RepositoryError>;

    /// Hard delete. Returns whether a record was removed.
    fn delete(&self, id: &A::Id, expected: ExpectedVersion) -> Result<bool, RepositoryError>;

    fn list(&self) -> Result<Vec<A>, RepositoryError>;
}
