//! Record storage boundary.
//!
//! Repositories hold the latest state of each aggregate under optimistic
//! concurrency control. Backends other than the in-memory one live outside
//! this workspace and only need to implement the traits below.

pub mod in_memory;
pub mod query;
pub mod records;
pub mod r#trait;

use std::sync::Arc;

pub use in_memory::InMemoryRepository;
pub use query::{InvoiceFilter, Page, PageRequest, paginate};
pub use records::{
    ClientRepository, InvoiceRepository, LeadRepository, ProjectRepository, TaskRepository,
    TicketRepository,
};
pub use r#trait::{Repository, RepositoryError, Stored};

/// One repository per aggregate, shared by every service.
#[derive(Clone)]
pub struct Repositories {
    pub invoices: Arc<dyn InvoiceRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub leads: Arc<dyn LeadRepository>,
    pub tickets: Arc<dyn TicketRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            invoices: Arc::new(InMemoryRepository::new()),
            projects: Arc::new(InMemoryRepository::new()),
            tasks: Arc::new(InMemoryRepository::new()),
            clients: Arc::new(InMemoryRepository::new()),
            leads: Arc::new(InMemoryRepository::new()),
            tickets: Arc::new(InMemoryRepository::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use orbit_core::{Actor, Aggregate, AggregateRoot, ExpectedVersion, UserId};
    use orbit_parties::{Client, ClientCommand, RegisterClient};

    fn client(name: &str, minute: u32) -> Client {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap();
        let cmd = RegisterClient::new(name, Actor::new(UserId::new(), "Ops"), at);
        let mut client = Client::empty(cmd.client_id);
        client.execute(&ClientCommand::RegisterClient(cmd)).unwrap();
        client
    }

    #[test]
    fn save_checks_the_expected_version() {
        let repo = InMemoryRepository::<Client>::new();
        let c = client("Acme", 0);

        repo.save(&c, ExpectedVersion::Exact(0)).unwrap();
        let err = repo.save(&c, ExpectedVersion::Exact(0)).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        repo.save(&c, ExpectedVersion::Exact(c.version())).unwrap();
        repo.save(&c, ExpectedVersion::Any).unwrap();
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn get_delete_and_list() {
        let repo = InMemoryRepository::<Client>::new();
        let c = client("Acme", 0);
        repo.save(&c, ExpectedVersion::Any).unwrap();

        assert_eq!(repo.get(c.id()).unwrap().as_ref(), Some(&c));
        assert_eq!(repo.list().unwrap().len(), 1);
        assert!(repo.delete(c.id(), ExpectedVersion::Any).unwrap());
        assert!(!repo.delete(c.id(), ExpectedVersion::Any).unwrap());
        assert!(repo.get(c.id()).unwrap().is_none());
        assert!(repo.is_empty());
    }

    #[test]
    fn delete_checks_the_expected_version() {
        let repo = InMemoryRepository::<Client>::new();
        let c = client("Acme", 0);
        repo.save(&c, ExpectedVersion::Any).unwrap();

        let err = repo.delete(c.id(), ExpectedVersion::Exact(c.version() + 1)).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.len(), 1);

        assert!(repo.delete(c.id(), ExpectedVersion::Exact(c.version())).unwrap());
        assert!(repo.is_empty());
    }

    #[test]
    fn paginate_orders_newest_first_and_counts_pages() {
        let clients: Vec<Client> = (0..5).map(|m| client(&format!("C{m}"), m)).collect();

        let first = paginate(clients.clone(), PageRequest::new(1, 2).unwrap());
        assert_eq!(first.total, 5);
        assert_eq!(first.pages, 3);
        let names: Vec<&str> = first.items.iter().map(|c| c.company_name()).collect();
        assert_eq!(names, ["C4", "C3"]);

        let last = paginate(clients.clone(), PageRequest::new(3, 2).unwrap());
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].company_name(), "C0");

        let beyond = paginate(clients, PageRequest::new(9, 2).unwrap());
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[test]
    fn empty_listing_has_zero_pages() {
        let page = paginate(Vec::<Client>::new(), PageRequest::default());
        assert_eq!((page.total, page.pages), (0, 0));
    }
}
