//! Command execution pipeline (application-level orchestration).
//!
//! Every mutating service call runs the same steps:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate from its repository (or start from `empty`)
//!   ↓
//! 2. Handle the command (pure decision logic, produces events)
//!   ↓
//! 3. Apply the events (state evolution, audit entries)
//!   ↓
//! 4. Save with an exact expected version (optimistic concurrency)
//!   ↓
//! 5. Invalidate the affected cache namespaces
//! ```
//!
//! A command that decides no events (for example marking an invoice overdue
//! that is not past due) stops after step 2: nothing is saved or invalidated.

use std::sync::Arc;

use orbit_core::{Aggregate, DomainError, DomainEvent, ExpectedVersion};

use crate::cache::{CacheInvalidator, CacheNamespace};
use crate::error::ServiceError;
use crate::repository::{Repository, Stored};

/// Outcome of a dispatched command.
#[derive(Debug, Clone)]
pub struct Dispatched<A: Aggregate> {
    pub aggregate: A,
    pub events: Vec<A::Event>,
}

impl<A: Aggregate> Dispatched<A> {
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    cache: Arc<dyn CacheInvalidator>,
}

impl CommandDispatcher {
    pub fn new(cache: Arc<dyn CacheInvalidator>) -> Self {
        Self { cache }
    }

    /// Run a creation command against a fresh aggregate.
    ///
    /// The save expects version 0, so an id collision surfaces as a conflict
    /// instead of overwriting the existing record.
    pub fn create<A, R>(
        &self,
        repo: &R,
        empty: A,
        command: A::Command,
        namespaces: &[CacheNamespace],
    ) -> Result<Dispatched<A>, ServiceError>
    where
        A: Stored + Aggregate<Error = DomainError>,
        R: Repository<A> + ?Sized,
    {
        self.execute(repo, empty, command, namespaces)
    }

    /// Load an existing aggregate and run a command against it.
    ///
    /// Missing records are `NotFound` with the entity name.
    pub fn update<A, R>(
        &self,
        repo: &R,
        id: &A::Id,
        command: A::Command,
        namespaces: &[CacheNamespace],
    ) -> Result<Dispatched<A>, ServiceError>
    where
        A: Stored + Aggregate<Error = DomainError>,
        R: Repository<A> + ?Sized,
    {
        let aggregate = repo.get(id)?.ok_or(DomainError::NotFound(A::ENTITY))?;
        self.execute(repo, aggregate, command, namespaces)
    }

    /// Steps 2 to 5 for an already loaded aggregate.
    pub fn execute<A, R>(
        &self,
        repo: &R,
        mut aggregate: A,
        command: A::Command,
        namespaces: &[CacheNamespace],
    ) -> Result<Dispatched<A>, ServiceError>
    where
        A: Stored + Aggregate<Error = DomainError>,
        R: Repository<A> + ?Sized,
    {
        let expected = ExpectedVersion::Exact(aggregate.version());

        let events = aggregate.execute(&command)?;
        if events.is_empty() {
            return Ok(Dispatched { aggregate, events });
        }

        repo.save(&aggregate, expected)?;

        for event in &events {
            tracing::info!(
                entity = A::ENTITY,
                id = ?aggregate.id(),
                event_type = event.event_type(),
                version = aggregate.version(),
                "event committed"
            );
        }

        self.invalidate(namespaces);
        Ok(Dispatched { aggregate, events })
    }

    pub fn invalidate(&self, namespaces: &[CacheNamespace]) {
        for namespace in namespaces {
            self.cache.invalidate(*namespace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RecordingCacheInvalidator;
    use crate::repository::InMemoryRepository;
    use chrono::{TimeZone, Utc};
    use orbit_core::{Actor, AggregateRoot, ClientId, UserId};
    use orbit_parties::{
        Client, ClientChanges, ClientCommand, ClientStatus, RegisterClient, UpdateClient,
    };

    fn actor() -> Actor {
        Actor::new(UserId::new(), "Ops")
    }

    fn setup() -> (CommandDispatcher, Arc<RecordingCacheInvalidator>, InMemoryRepository<Client>) {
        let cache = Arc::new(RecordingCacheInvalidator::new());
        (CommandDispatcher::new(cache.clone()), cache, InMemoryRepository::new())
    }

    fn register(dispatcher: &CommandDispatcher, repo: &InMemoryRepository<Client>) -> Client {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let cmd = RegisterClient::new("Acme", actor(), at);
        dispatcher
            .create(repo, Client::empty(cmd.client_id), ClientCommand::RegisterClient(cmd), &[CacheNamespace::Clients])
            .unwrap()
            .aggregate
    }

    #[test]
    fn create_persists_and_invalidates() {
        let (dispatcher, cache, repo) = setup();
        let client = register(&dispatcher, &repo);

        assert_eq!(repo.get(client.id()).unwrap().as_ref(), Some(&client));
        assert_eq!(client.version(), 1);
        assert_eq!(cache.invalidated(), vec![CacheNamespace::Clients]);
    }

    #[test]
    fn update_of_missing_record_is_not_found() {
        let (dispatcher, cache, repo) = setup();
        let cmd = ClientCommand::UpdateClient(UpdateClient {
            changes: ClientChanges {
                status: Some(ClientStatus::Inactive),
                ..Default::default()
            },
            actor: actor(),
            occurred_at: Utc::now(),
        });

        let err = dispatcher
            .update(&repo, &ClientId::new(), cmd, &[CacheNamespace::Clients])
            .unwrap_err();
        assert_eq!(err, ServiceError::Domain(DomainError::NotFound("client")));
        assert!(cache.invalidated().is_empty());
    }

    #[test]
    fn domain_rejection_leaves_store_untouched() {
        let (dispatcher, cache, repo) = setup();
        let client = register(&dispatcher, &repo);
        cache.clear();

        let empty_update = ClientCommand::UpdateClient(UpdateClient {
            changes: ClientChanges::default(),
            actor: actor(),
            occurred_at: Utc::now(),
        });
        let err = dispatcher
            .update(&repo, client.id(), empty_update, &[CacheNamespace::Clients])
            .unwrap_err();

        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        assert_eq!(repo.get(client.id()).unwrap().unwrap().version(), 1);
        assert!(cache.invalidated().is_empty());
    }

    #[test]
    fn stale_aggregate_is_a_conflict() {
        let (dispatcher, _cache, repo) = setup();
        let stale = register(&dispatcher, &repo);

        let rename = |name: &str| {
            ClientCommand::UpdateClient(UpdateClient {
                changes: ClientChanges {
                    company_name: Some(name.to_string()),
                    ..Default::default()
                },
                actor: actor(),
                occurred_at: Utc::now(),
            })
        };

        dispatcher
            .update(&repo, stale.id(), rename("Acme Ltd"), &[])
            .unwrap();
        let err = dispatcher
            .execute(&repo, stale, rename("Acme Inc"), &[])
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
