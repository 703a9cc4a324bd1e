//! Support ticket operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use orbit_auth::permissions::{TICKETS_READ, TICKETS_UPDATE, TICKETS_WRITE};
use orbit_core::{ClientId, CommentId, DomainError, Priority, TicketId, UserId};
use orbit_support::{
    AddComment, OpenTicket, Ticket, TicketChanges, TicketCommand, TicketNumberGenerator,
    TicketStatus, UpdateTicket,
};

use crate::cache::CacheNamespace;
use crate::clock::Clock;
use crate::command_dispatcher::CommandDispatcher;
use crate::config::PaginationSettings;
use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{ClientRepository, Page, PageRequest, TicketRepository, paginate};
use crate::state::AppState;

const AFFECTED: &[CacheNamespace] = &[CacheNamespace::Tickets];

const NUMBER_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub client_id: Option<ClientId>,
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub category: Option<String>,
    pub channel: Option<String>,
    pub assigned_to: Option<UserId>,
}

impl TicketDraft {
    pub fn new(subject: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            client_id: None,
            subject: subject.into(),
            description: description.into(),
            priority: Priority::default(),
            category: None,
            channel: None,
            assigned_to: None,
        }
    }
}

#[derive(Clone)]
pub struct TicketService {
    tickets: Arc<dyn TicketRepository>,
    clients: Arc<dyn ClientRepository>,
    numbers: Arc<dyn TicketNumberGenerator>,
    clock: Arc<dyn Clock>,
    dispatcher: CommandDispatcher,
    pagination: PaginationSettings,
}

impl TicketService {
    pub fn new(state: &AppState) -> Self {
        Self {
            tickets: state.repos.tickets.clone(),
            clients: state.repos.clients.clone(),
            numbers: state.ticket_numbers.clone(),
            clock: state.clock.clone(),
            dispatcher: state.dispatcher(),
            pagination: state.settings.pagination.clone(),
        }
    }

    /// Open a ticket; the SLA due time follows from its priority.
    #[tracing::instrument(skip_all, fields(priority = ?draft.priority))]
    pub fn open(&self, ctx: &RequestContext, draft: TicketDraft) -> ServiceResult<Ticket> {
        ctx.require(&TICKETS_WRITE)?;
        if let Some(client_id) = draft.client_id {
            if self.clients.get_active(&client_id)?.is_none() {
                return Err(DomainError::not_found("client").into());
            }
        }

        let now = self.clock.now();
        for attempt in 1..=NUMBER_ATTEMPTS {
            let ticket_id = TicketId::new();
            let cmd = TicketCommand::OpenTicket(OpenTicket {
                ticket_id,
                ticket_number: self.numbers.next_number(),
                client_id: draft.client_id,
                subject: draft.subject.clone(),
                description: draft.description.clone(),
                priority: draft.priority,
                category: draft.category.clone(),
                channel: draft.channel.clone(),
                assigned_to: draft.assigned_to,
                actor: ctx.actor().clone(),
                occurred_at: now,
            });

            match self.dispatcher.create(&*self.tickets, Ticket::empty(ticket_id), cmd, AFFECTED) {
                Ok(done) => {
                    tracing::info!(ticket_number = done.aggregate.ticket_number(), "ticket opened");
                    return Ok(done.aggregate);
                }
                Err(err) if err.is_duplicate() => {
                    tracing::debug!(attempt, "ticket number collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }

        Err(DomainError::conflict("could not allocate a unique ticket number").into())
    }

    pub fn get(&self, ctx: &RequestContext, id: TicketId) -> ServiceResult<Ticket> {
        ctx.require(&TICKETS_READ)?;
        self.tickets
            .get(&id)?
            .ok_or_else(|| ServiceError::from(DomainError::not_found("ticket")))
    }

    pub fn find_by_number(&self, ctx: &RequestContext, number: &str) -> ServiceResult<Ticket> {
        ctx.require(&TICKETS_READ)?;
        self.tickets
            .find_by_number(number)?
            .ok_or_else(|| ServiceError::from(DomainError::not_found("ticket")))
    }

    pub fn list(
        &self,
        ctx: &RequestContext,
        status: Option<TicketStatus>,
        priority: Option<Priority>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ServiceResult<Page<Ticket>> {
        ctx.require(&TICKETS_READ)?;
        let request = PageRequest::bounded(
            page.unwrap_or(1),
            page_size.unwrap_or(self.pagination.default_page_size),
            self.pagination.max_page_size,
        )?;
        let matching = self
            .tickets
            .list()?
            .into_iter()
            .filter(|t| status.is_none_or(|s| s == t.status()))
            .filter(|t| priority.is_none_or(|p| p == t.priority()))
            .collect();
        Ok(paginate(matching, request))
    }

    /// Unfinished tickets whose SLA due time has passed, most overdue first.
    pub fn sla_breached(&self, ctx: &RequestContext) -> ServiceResult<Vec<Ticket>> {
        ctx.require(&TICKETS_READ)?;
        let now = self.clock.now();
        let mut breached: Vec<Ticket> = self
            .tickets
            .list()?
            .into_iter()
            .filter(|t| t.is_sla_breached(now))
            .collect();
        breached.sort_by_key(|t| t.sla_due_at());
        Ok(breached)
    }

    #[tracing::instrument(skip_all, fields(ticket_id = %id))]
    pub fn update(&self, ctx: &RequestContext, id: TicketId, changes: TicketChanges) -> ServiceResult<Ticket> {
        ctx.require(&TICKETS_UPDATE)?;
        let cmd = TicketCommand::UpdateTicket(UpdateTicket {
            changes,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.tickets, &id, cmd, AFFECTED)?.aggregate)
    }

    #[tracing::instrument(skip_all, fields(ticket_id = %id, internal = is_internal))]
    pub fn comment(
        &self,
        ctx: &RequestContext,
        id: TicketId,
        comment: impl Into<String>,
        is_internal: bool,
    ) -> ServiceResult<Ticket> {
        ctx.require(&TICKETS_UPDATE)?;
        let cmd = TicketCommand::AddComment(AddComment {
            comment_id: CommentId::new(),
            comment: comment.into(),
            is_internal,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.tickets, &id, cmd, AFFECTED)?.aggregate)
    }
}
