//! Lead pipeline operations and lead to client conversion.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orbit_auth::permissions::{LEADS_CONVERT, LEADS_DELETE, LEADS_READ, LEADS_WRITE};
use orbit_auth::{AuthzError, Role};
use orbit_core::{
    Aggregate, AggregateRoot, ClientId, DomainError, ExpectedVersion, LeadId, Money, SoftDelete, UserId,
};
use orbit_parties::{
    Client, ClientCommand, ConvertLead, CreateLead, DeleteLead, Lead, LeadChanges, LeadCommand,
    LeadEvent, LeadStage, LeadStatus, UpdateLead,
};

use crate::cache::CacheNamespace;
use crate::clock::Clock;
use crate::command_dispatcher::CommandDispatcher;
use crate::config::PaginationSettings;
use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{ClientRepository, LeadRepository, Page, PageRequest, paginate};
use crate::state::AppState;

const AFFECTED: &[CacheNamespace] = &[CacheNamespace::Leads, CacheNamespace::Reports];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeadDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub score: u8,
    pub estimated_value: Option<Money>,
    pub expected_close_date: Option<NaiveDate>,
    pub assigned_to: Option<UserId>,
    pub notes: Option<String>,
}

impl LeadDraft {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }
}

/// Result of converting a lead.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub lead: Lead,
    pub client: Client,
}

/// The user whose leads a sales-only caller is limited to.
///
/// Admins and managers see the whole pipeline.
pub(crate) fn sales_scope(ctx: &RequestContext) -> Option<UserId> {
    let unrestricted = ctx.has_role(&Role::ADMIN) || ctx.has_role(&Role::MANAGER);
    (ctx.has_role(&Role::SALES) && !unrestricted).then(|| ctx.user_id())
}

/// Sales-only callers may only change leads assigned to them.
fn ensure_owner(ctx: &RequestContext, lead: &Lead) -> Result<(), AuthzError> {
    match sales_scope(ctx) {
        Some(owner) if lead.assigned_to() != Some(owner) => Err(AuthzError::NotOwner("lead".to_string())),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct LeadService {
    leads: Arc<dyn LeadRepository>,
    clients: Arc<dyn ClientRepository>,
    clock: Arc<dyn Clock>,
    dispatcher: CommandDispatcher,
    pagination: PaginationSettings,
}

impl LeadService {
    pub fn new(state: &AppState) -> Self {
        Self {
            leads: state.repos.leads.clone(),
            clients: state.repos.clients.clone(),
            clock: state.clock.clone(),
            dispatcher: state.dispatcher(),
            pagination: state.settings.pagination.clone(),
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn create(&self, ctx: &RequestContext, draft: LeadDraft) -> ServiceResult<Lead> {
        ctx.require(&LEADS_WRITE)?;
        let mut cmd = CreateLead::new(draft.first_name, draft.last_name, ctx.actor().clone(), self.clock.now());
        cmd.email = draft.email;
        cmd.phone = draft.phone;
        cmd.company = draft.company;
        cmd.job_title = draft.job_title;
        cmd.source = draft.source;
        cmd.score = draft.score;
        cmd.estimated_value = draft.estimated_value;
        cmd.expected_close_date = draft.expected_close_date;
        cmd.notes = draft.notes;
        // sales users own the leads they enter unless told otherwise
        cmd.assigned_to = draft.assigned_to.or_else(|| sales_scope(ctx));

        let lead_id = cmd.lead_id;
        Ok(self
            .dispatcher
            .create(&*self.leads, Lead::empty(lead_id), LeadCommand::CreateLead(cmd), AFFECTED)?
            .aggregate)
    }

    pub fn get(&self, ctx: &RequestContext, id: LeadId) -> ServiceResult<Lead> {
        ctx.require(&LEADS_READ)?;
        let lead = self.load_active(id)?;
        if let Some(owner) = sales_scope(ctx) {
            if lead.assigned_to() != Some(owner) {
                return Err(DomainError::not_found("lead").into());
            }
        }
        Ok(lead)
    }

    /// Active leads, newest first. Sales users only see leads assigned to them.
    pub fn list(
        &self,
        ctx: &RequestContext,
        status: Option<LeadStatus>,
        stage: Option<LeadStage>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ServiceResult<Page<Lead>> {
        ctx.require(&LEADS_READ)?;
        let request = PageRequest::bounded(
            page.unwrap_or(1),
            page_size.unwrap_or(self.pagination.default_page_size),
            self.pagination.max_page_size,
        )?;

        let matching = self
            .visible(ctx)?
            .into_iter()
            .filter(|l| status.is_none_or(|s| s == l.status()))
            .filter(|l| stage.is_none_or(|s| s == l.stage()))
            .collect();
        Ok(paginate(matching, request))
    }

    /// Active leads the caller may see.
    pub fn visible(&self, ctx: &RequestContext) -> ServiceResult<Vec<Lead>> {
        ctx.require(&LEADS_READ)?;
        let leads = match sales_scope(ctx) {
            Some(owner) => self.leads.list_assigned_to(owner)?,
            None => self.leads.list()?,
        };
        Ok(leads.into_iter().filter(|l| l.is_active()).collect())
    }

    #[tracing::instrument(skip_all, fields(lead_id = %id))]
    pub fn update(&self, ctx: &RequestContext, id: LeadId, changes: LeadChanges) -> ServiceResult<Lead> {
        ctx.require(&LEADS_WRITE)?;
        let lead = self.load_active(id)?;
        ensure_owner(ctx, &lead)?;

        let cmd = LeadCommand::UpdateLead(UpdateLead {
            changes,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.execute(&*self.leads, lead, cmd, AFFECTED)?.aggregate)
    }

    /// Soft delete. Admins and managers only.
    #[tracing::instrument(skip_all, fields(lead_id = %id))]
    pub fn delete(&self, ctx: &RequestContext, id: LeadId) -> ServiceResult<Lead> {
        ctx.require(&LEADS_DELETE)?;
        let cmd = LeadCommand::DeleteLead(DeleteLead {
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.leads, &id, cmd, AFFECTED)?.aggregate)
    }

    /// Convert a lead into a new active client.
    ///
    /// The client is created first; if the lead cannot then be saved the
    /// client is removed again so no half-converted state survives.
    #[tracing::instrument(skip_all, fields(lead_id = %id))]
    pub fn convert(&self, ctx: &RequestContext, id: LeadId) -> ServiceResult<Conversion> {
        ctx.require(&LEADS_CONVERT)?;
        let lead = self.load_active(id)?;
        ensure_owner(ctx, &lead)?;

        let client_id = ClientId::new();
        let cmd = LeadCommand::ConvertLead(ConvertLead {
            client_id,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        let registration = lead
            .handle(&cmd)?
            .into_iter()
            .find_map(|event| match event {
                LeadEvent::LeadConverted(converted) => Some(converted.client),
                _ => None,
            })
            .ok_or_else(|| DomainError::invalid_state("lead conversion produced no client"))?;

        let client = self
            .dispatcher
            .create(
                &*self.clients,
                Client::empty(client_id),
                ClientCommand::RegisterClient(registration),
                &[CacheNamespace::Clients],
            )?
            .aggregate;

        let lead = match self.dispatcher.execute(&*self.leads, lead, cmd, AFFECTED) {
            Ok(done) => done.aggregate,
            Err(err) => {
                tracing::warn!(client_id = %client_id, error = %err, "lead conversion failed, removing client");
                self.clients.delete(&client_id, ExpectedVersion::Exact(client.version()))?;
                self.dispatcher.invalidate(&[CacheNamespace::Clients]);
                return Err(err);
            }
        };

        tracing::info!(lead_id = %id, client_id = %client_id, "lead converted");
        Ok(Conversion { lead, client })
    }

    fn load_active(&self, id: LeadId) -> ServiceResult<Lead> {
        self.leads
            .get(&id)?
            .filter(|l| l.is_active())
            .ok_or_else(|| ServiceError::from(DomainError::not_found("lead")))
    }
}
