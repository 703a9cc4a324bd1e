use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use orbit_core::audit::{self, AuditEntry};
use orbit_core::money;
use orbit_core::{
    Actor, Aggregate, AggregateRoot, ClientId, DomainError, DomainEvent, LeadId, Metadata, Money,
    SoftDelete, UserId,
};

use crate::client::{ClientStatus, ContactInfo, RegisterClient};

const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

/// Sales pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStage {
    #[default]
    Prospect,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl LeadStage {
    pub const ALL: [LeadStage; 6] = [
        LeadStage::Prospect,
        LeadStage::Qualified,
        LeadStage::Proposal,
        LeadStage::Negotiation,
        LeadStage::ClosedWon,
        LeadStage::ClosedLost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LeadStage::Prospect => "prospect",
            LeadStage::Qualified => "qualified",
            LeadStage::Proposal => "proposal",
            LeadStage::Negotiation => "negotiation",
            LeadStage::ClosedWon => "closed_won",
            LeadStage::ClosedLost => "closed_lost",
        }
    }
}

/// Aggregate root: Lead (a potential customer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    id: LeadId,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
    source: Option<String>,
    status: LeadStatus,
    stage: LeadStage,
    score: u8,
    estimated_value: Option<Money>,
    expected_close_date: Option<NaiveDate>,
    assigned_to: Option<UserId>,
    converted_to_client_id: Option<ClientId>,
    notes: Option<String>,
    metadata: Metadata,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Lead {
    pub fn empty(id: LeadId) -> Self {
        Self {
            id,
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            phone: None,
            company: None,
            job_title: None,
            source: None,
            status: LeadStatus::New,
            stage: LeadStage::Prospect,
            score: 0,
            estimated_value: None,
            expected_close_date: None,
            assigned_to: None,
            converted_to_client_id: None,
            notes: None,
            metadata: Metadata::new(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn status(&self) -> LeadStatus {
        self.status
    }

    pub fn stage(&self) -> LeadStage {
        self.stage
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn estimated_value(&self) -> Option<Money> {
        self.estimated_value
    }

    pub fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }

    pub fn converted_to_client_id(&self) -> Option<ClientId> {
        self.converted_to_client_id
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted_at.is_some() {
            return Err(DomainError::not_found("lead"));
        }
        Ok(())
    }

    /// Client registration derived from this lead.
    ///
    /// Company falls back to the lead's full name; the account manager falls
    /// back to the converting user. Lead metadata is carried over together
    /// with the lead notes and a `conversion_log` object.
    fn client_registration(&self, client_id: ClientId, actor: &Actor, at: DateTime<Utc>) -> RegisterClient {
        let mut metadata = self.metadata.clone();
        if let Some(notes) = &self.notes {
            metadata = metadata.with("notes", json!(notes));
        }
        metadata = metadata.with(
            "conversion_log",
            json!({
                "converted_at": at,
                "converted_by": actor.id,
                "from_lead_id": self.id,
                "original_source": self.source,
            }),
        );

        RegisterClient {
            client_id,
            company_name: self.company.clone().unwrap_or_else(|| self.full_name()),
            industry: None,
            website: None,
            primary_contact: ContactInfo {
                name: Some(self.full_name()),
                email: self.email.clone(),
                phone: self.phone.clone(),
            },
            account_manager_id: Some(self.assigned_to.unwrap_or(actor.id)),
            status: ClientStatus::Active,
            payment_terms: None,
            credit_limit: None,
            tax_id: None,
            metadata,
            actor: actor.clone(),
            occurred_at: at,
        }
    }
}

impl AggregateRoot for Lead {
    type Id = LeadId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl SoftDelete for Lead {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLead {
    pub lead_id: LeadId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: Option<String>,
    pub score: u8,
    pub estimated_value: Option<Money>,
    pub expected_close_date: Option<NaiveDate>,
    pub assigned_to: Option<UserId>,
    pub notes: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl CreateLead {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lead_id: LeadId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            company: None,
            job_title: None,
            source: None,
            score: 0,
            estimated_value: None,
            expected_close_date: None,
            assigned_to: None,
            notes: None,
            actor,
            occurred_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadChanges {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<LeadStatus>,
    pub stage: Option<LeadStage>,
    pub score: Option<u8>,
    pub estimated_value: Option<Money>,
    pub expected_close_date: Option<NaiveDate>,
    pub assigned_to: Option<UserId>,
    pub notes: Option<String>,
}

impl LeadChanges {
    pub fn field_names(&self) -> Vec<String> {
        [
            ("email", self.email.is_some()),
            ("phone", self.phone.is_some()),
            ("company", self.company.is_some()),
            ("status", self.status.is_some()),
            ("stage", self.stage.is_some()),
            ("score", self.score.is_some()),
            ("estimated_value", self.estimated_value.is_some()),
            ("expected_close_date", self.expected_close_date.is_some()),
            ("assigned_to", self.assigned_to.is_some()),
            ("notes", self.notes.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then(|| name.to_string()))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLead {
    pub changes: LeadChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLead {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConvertLead. `client_id` is the id of the client to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertLead {
    pub client_id: ClientId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadCommand {
    CreateLead(CreateLead),
    UpdateLead(UpdateLead),
    DeleteLead(DeleteLead),
    ConvertLead(ConvertLead),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadCreated {
    pub lead: CreateLead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadUpdated {
    pub changes: LeadChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadDeleted {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LeadConverted. Carries the registration for the new client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadConverted {
    pub client: RegisterClient,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeadEvent {
    LeadCreated(LeadCreated),
    LeadUpdated(LeadUpdated),
    LeadDeleted(LeadDeleted),
    LeadConverted(LeadConverted),
}

impl DomainEvent for LeadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LeadEvent::LeadCreated(_) => "parties.lead.created",
            LeadEvent::LeadUpdated(_) => "parties.lead.updated",
            LeadEvent::LeadDeleted(_) => "parties.lead.deleted",
            LeadEvent::LeadConverted(_) => "parties.lead.converted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LeadEvent::LeadCreated(e) => e.lead.occurred_at,
            LeadEvent::LeadUpdated(e) => e.occurred_at,
            LeadEvent::LeadDeleted(e) => e.occurred_at,
            LeadEvent::LeadConverted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Lead {
    type Command = LeadCommand;
    type Event = LeadEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LeadEvent::LeadCreated(LeadCreated { lead: l }) => {
                self.id = l.lead_id;
                self.first_name = l.first_name.clone();
                self.last_name = l.last_name.clone();
                self.email = l.email.clone();
                self.phone = l.phone.clone();
                self.company = l.company.clone();
                self.job_title = l.job_title.clone();
                self.source = l.source.clone();
                self.score = l.score;
                self.estimated_value = l.estimated_value;
                self.expected_close_date = l.expected_close_date;
                self.assigned_to = l.assigned_to;
                self.notes = l.notes.clone();
                self.status = LeadStatus::New;
                self.stage = LeadStage::Prospect;
                self.created_at = Some(l.occurred_at);
                self.created = true;
                self.metadata = audit::record(&self.metadata, "created", &l.actor, l.occurred_at, None);
            }
            LeadEvent::LeadUpdated(e) => {
                let c = &e.changes;
                if c.email.is_some() {
                    self.email = c.email.clone();
                }
                if c.phone.is_some() {
                    self.phone = c.phone.clone();
                }
                if c.company.is_some() {
                    self.company = c.company.clone();
                }
                if let Some(status) = c.status {
                    self.status = status;
                }
                if let Some(stage) = c.stage {
                    self.stage = stage;
                }
                if let Some(score) = c.score {
                    self.score = score;
                }
                if c.estimated_value.is_some() {
                    self.estimated_value = c.estimated_value;
                }
                if c.expected_close_date.is_some() {
                    self.expected_close_date = c.expected_close_date;
                }
                if c.assigned_to.is_some() {
                    self.assigned_to = c.assigned_to;
                }
                if c.notes.is_some() {
                    self.notes = c.notes.clone();
                }
                self.metadata = audit::record(
                    &self.metadata,
                    "updated",
                    &e.actor,
                    e.occurred_at,
                    Some(c.field_names()),
                );
            }
            LeadEvent::LeadDeleted(e) => {
                self.deleted_at = Some(e.occurred_at);
                self.metadata = audit::record(&self.metadata, "deleted", &e.actor, e.occurred_at, None);
            }
            LeadEvent::LeadConverted(e) => {
                self.status = LeadStatus::Converted;
                self.stage = LeadStage::ClosedWon;
                self.converted_to_client_id = Some(e.client.client_id);
                let entry = AuditEntry::new("converted", &e.actor, e.occurred_at)
                    .with_detail(json!({ "client_id": e.client.client_id }));
                self.metadata = audit::append(&self.metadata, entry);
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LeadCommand::CreateLead(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("lead already exists"));
                }
                if cmd.first_name.trim().is_empty() || cmd.last_name.trim().is_empty() {
                    return Err(DomainError::validation("lead first and last name are required"));
                }
                validate_score(cmd.score)?;
                if let Some(value) = cmd.estimated_value {
                    money::ensure_non_negative("estimated_value", value)?;
                }
                Ok(vec![LeadEvent::LeadCreated(LeadCreated { lead: cmd.clone() })])
            }
            LeadCommand::UpdateLead(cmd) => {
                self.ensure_live()?;
                let c = &cmd.changes;
                if c.field_names().is_empty() {
                    return Err(DomainError::validation("no fields to update"));
                }
                if c.status == Some(LeadStatus::Converted) {
                    return Err(DomainError::validation("use lead conversion to mark a lead converted"));
                }
                if let Some(score) = c.score {
                    validate_score(score)?;
                }
                if let Some(value) = c.estimated_value {
                    money::ensure_non_negative("estimated_value", value)?;
                }
                Ok(vec![LeadEvent::LeadUpdated(LeadUpdated {
                    changes: c.clone(),
                    actor: cmd.actor.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            LeadCommand::DeleteLead(cmd) => {
                self.ensure_live()?;
                Ok(vec![LeadEvent::LeadDeleted(LeadDeleted {
                    actor: cmd.actor.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            LeadCommand::ConvertLead(cmd) => {
                self.ensure_live()?;
                if self.status == LeadStatus::Converted {
                    return Err(DomainError::invalid_state("lead is already converted"));
                }
                Ok(vec![LeadEvent::LeadConverted(LeadConverted {
                    client: self.client_registration(cmd.client_id, &cmd.actor, cmd.occurred_at),
                    actor: cmd.actor.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

fn validate_score(score: u8) -> Result<(), DomainError> {
    if score > MAX_SCORE {
        return Err(DomainError::validation("lead score must be between 0 and 100"));
    }
    Ok(())
}
