//! Client register operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use orbit_auth::permissions::{CLIENTS_READ, CLIENTS_WRITE};
use orbit_core::{ClientId, DomainError, Money, SoftDelete, UserId};
use orbit_parties::{
    Client, ClientChanges, ClientCommand, ClientStatus, ContactInfo, DeleteClient,
    RegisterClient, UpdateClient,
};

use crate::cache::CacheNamespace;
use crate::clock::Clock;
use crate::command_dispatcher::CommandDispatcher;
use crate::config::PaginationSettings;
use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{ClientRepository, Page, PageRequest, paginate};
use crate::state::AppState;

const AFFECTED: &[CacheNamespace] = &[CacheNamespace::Clients];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientDraft {
    pub company_name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub primary_contact: ContactInfo,
    pub account_manager_id: Option<UserId>,
    pub payment_terms: Option<String>,
    pub credit_limit: Option<Money>,
    pub tax_id: Option<String>,
}

impl ClientDraft {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct ClientService {
    clients: Arc<dyn ClientRepository>,
    clock: Arc<dyn Clock>,
    dispatcher: CommandDispatcher,
    pagination: PaginationSettings,
}

impl ClientService {
    pub fn new(state: &AppState) -> Self {
        Self {
            clients: state.repos.clients.clone(),
            clock: state.clock.clone(),
            dispatcher: state.dispatcher(),
            pagination: state.settings.pagination.clone(),
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn register(&self, ctx: &RequestContext, draft: ClientDraft) -> ServiceResult<Client> {
        ctx.require(&CLIENTS_WRITE)?;
        let mut cmd = RegisterClient::new(draft.company_name, ctx.actor().clone(), self.clock.now());
        cmd.industry = draft.industry;
        cmd.website = draft.website;
        cmd.primary_contact = draft.primary_contact;
        cmd.account_manager_id = draft.account_manager_id;
        cmd.payment_terms = draft.payment_terms;
        cmd.credit_limit = draft.credit_limit;
        cmd.tax_id = draft.tax_id;

        let client_id = cmd.client_id;
        let client = self
            .dispatcher
            .create(&*self.clients, Client::empty(client_id), ClientCommand::RegisterClient(cmd), AFFECTED)?
            .aggregate;
        tracing::info!(client_id = %client_id, "client registered");
        Ok(client)
    }

    pub fn get(&self, ctx: &RequestContext, id: ClientId) -> ServiceResult<Client> {
        ctx.require(&CLIENTS_READ)?;
        self.clients
            .get_active(&id)?
            .ok_or_else(|| ServiceError::from(DomainError::not_found("client")))
    }

    /// Active clients, newest first.
    pub fn list(
        &self,
        ctx: &RequestContext,
        status: Option<ClientStatus>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ServiceResult<Page<Client>> {
        ctx.require(&CLIENTS_READ)?;
        let request = PageRequest::bounded(
            page.unwrap_or(1),
            page_size.unwrap_or(self.pagination.default_page_size),
            self.pagination.max_page_size,
        )?;
        let matching = self
            .clients
            .list()?
            .into_iter()
            .filter(|c| c.is_active())
            .filter(|c| status.is_none_or(|s| s == c.status()))
            .collect();
        Ok(paginate(matching, request))
    }

    #[tracing::instrument(skip_all, fields(client_id = %id))]
    pub fn update(&self, ctx: &RequestContext, id: ClientId, changes: ClientChanges) -> ServiceResult<Client> {
        ctx.require(&CLIENTS_WRITE)?;
        let cmd = ClientCommand::UpdateClient(UpdateClient {
            changes,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.clients, &id, cmd, AFFECTED)?.aggregate)
    }

    /// Soft delete.
    #[tracing::instrument(skip_all, fields(client_id = %id))]
    pub fn delete(&self, ctx: &RequestContext, id: ClientId) -> ServiceResult<Client> {
        ctx.require(&CLIENTS_WRITE)?;
        let cmd = ClientCommand::DeleteClient(DeleteClient {
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.clients, &id, cmd, AFFECTED)?.aggregate)
    }
}
