use std::collections::HashMap;
use std::sync::RwLock;

use orbit_core::ExpectedVersion;

use super::r#trait::{Repository, RepositoryError, Stored};

/// In-memory versioned record store.
///
/// Intended for tests/dev. Not optimized for performance: unique-key checks
/// scan every record.
#[derive(Debug)]
pub struct InMemoryRepository<A: Stored> {
    records: RwLock<HashMap<A::Id, A>>,
}

impl<A: Stored> InMemoryRepository<A> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: Stored> Default for InMemoryRepository<A> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("lock poisoned".to_string())
}

impl<A: Stored> Repository<A> for InMemoryRepository<A> {
    fn get(&self, id: &A::Id) -> Result<Option<A>, RepositoryError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(id).cloned())
    }

    fn save(&self, aggregate: &A, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;

        let current = records.get(aggregate.id()).map(|a| a.version()).unwrap_or(0);
        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "{} {:?}: expected {expected:?}, found {current}",
                A::ENTITY,
                aggregate.id()
            )));
        }

        if let Some(key) = aggregate.unique_key() {
            let taken = records
                .values()
                .any(|other| other.id() != aggregate.id() && other.unique_key().as_deref() == Some(key.as_str()));
            if taken {
                return Err(RepositoryError::Duplicate(format!("{} {key}", A::ENTITY)));
            }
        }

        records.insert(aggregate.id().clone(), aggregate.clone());
        Ok(())
    }

    fn delete(&self, id: &A::Id, expected: ExpectedVersion) -> Result<bool, RepositoryError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;

        let Some(current) = records.get(id).map(|a| a.version()) else {
            return Ok(false);
        };
        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "{} {id:?}: delete expected {expected:?}, found {current}",
                A::ENTITY
            )));
        }
        Ok(records.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<A>, RepositoryError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.values().cloned().collect())
    }
}
