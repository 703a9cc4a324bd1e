//! Storage bindings for the CRM aggregates and their lookup queries.

use chrono::{DateTime, Utc};

use orbit_core::{ClientId, ProjectId, SoftDelete, UserId};
use orbit_invoicing::Invoice;
use orbit_parties::{Client, Lead};
use orbit_projects::{Project, Task};
use orbit_support::Ticket;

use super::in_memory::InMemoryRepository;
use super::query::{InvoiceFilter, Page, PageRequest, paginate};
use super::r#trait::{Repository, RepositoryError, Stored};

impl Stored for Invoice {
    const ENTITY: &'static str = "invoice";

    fn unique_key(&self) -> Option<String> {
        Some(self.invoice_number().to_string())
    }

    fn sort_key(&self) -> Option<DateTime<Utc>> {
        self.created_at()
    }
}

impl Stored for Project {
    const ENTITY: &'static str = "project";

    fn sort_key(&self) -> Option<DateTime<Utc>> {
        self.created_at()
    }
}

impl Stored for Task {
    const ENTITY: &'static str = "task";

    fn sort_key(&self) -> Option<DateTime<Utc>> {
        self.created_at()
    }
}

impl Stored for Client {
    const ENTITY: &'static str = "client";

    fn sort_key(&self) -> Option<DateTime<Utc>> {
        self.created_at()
    }
}

impl Stored for Lead {
    const ENTITY: &'static str = "lead";

    fn sort_key(&self) -> Option<DateTime<Utc>> {
        self.created_at()
    }
}

impl Stored for Ticket {
    const ENTITY: &'static str = "ticket";

    fn unique_key(&self) -> Option<String> {
        Some(self.ticket_number().to_string())
    }

    fn sort_key(&self) -> Option<DateTime<Utc>> {
        self.created_at()
    }
}

pub trait InvoiceRepository: Repository<Invoice> {
    fn find_by_number(&self, number: &str) -> Result<Option<Invoice>, RepositoryError> {
        Ok(self.list()?.into_iter().find(|i| i.invoice_number() == number))
    }

    /// Filtered, newest-first page of invoices.
    fn query(&self, filter: &InvoiceFilter, page: PageRequest) -> Result<Page<Invoice>, RepositoryError> {
        let matching = self.list()?.into_iter().filter(|i| filter.matches(i)).collect();
        Ok(paginate(matching, page))
    }
}

pub trait ProjectRepository: Repository<Project> {
    fn list_for_client(&self, client_id: ClientId) -> Result<Vec<Project>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.client_id() == Some(client_id))
            .collect())
    }
}

pub trait TaskRepository: Repository<Task> {
    /// All tasks of a project, soft-deleted ones included.
    fn list_for_project(&self, project_id: ProjectId) -> Result<Vec<Task>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|t| t.project_id() == Some(project_id))
            .collect())
    }
}

pub trait ClientRepository: Repository<Client> {
    /// The client, unless it is missing or soft-deleted.
    fn get_active(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        Ok(self.get(id)?.filter(|c| c.is_active()))
    }
}

pub trait LeadRepository: Repository<Lead> {
    fn list_assigned_to(&self, user_id: UserId) -> Result<Vec<Lead>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|l| l.assigned_to() == Some(user_id))
            .collect())
    }
}

pub trait TicketRepository: Repository<Ticket> {
    fn find_by_number(&self, number: &str) -> Result<Option<Ticket>, RepositoryError> {
        Ok(self.list()?.into_iter().find(|t| t.ticket_number() == number))
    }
}

impl InvoiceRepository for InMemoryRepository<Invoice> {}
impl ProjectRepository for InMemoryRepository<Project> {}
impl TaskRepository for InMemoryRepository<Task> {}
impl ClientRepository for InMemoryRepository<Client> {}
impl LeadRepository for InMemoryRepository<Lead> {}
impl TicketRepository for InMemoryRepository<Ticket> {}
