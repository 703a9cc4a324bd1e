use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orbit_core::audit;
use orbit_core::money;
use orbit_core::{
    Actor, Aggregate, AggregateRoot, ClientId, DomainError, DomainEvent, Metadata, Money,
    SoftDelete, UserId,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
    Churned,
}

/// Primary contact person of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Aggregate root: Client (a converted customer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    id: ClientId,
    company_name: String,
    industry: Option<String>,
    website: Option<String>,
    primary_contact: ContactInfo,
    account_manager_id: Option<UserId>,
    status: ClientStatus,
    payment_terms: Option<String>,
    credit_limit: Option<Money>,
    tax_id: Option<String>,
    metadata: Metadata,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Client {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ClientId) -> Self {
        Self {
            id,
            company_name: String::new(),
            industry: None,
            website: None,
            primary_contact: ContactInfo::default(),
            account_manager_id: None,
            status: ClientStatus::Active,
            payment_terms: None,
            credit_limit: None,
            tax_id: None,
            metadata: Metadata::new(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn industry(&self) -> Option<&str> {
        self.industry.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    pub fn primary_contact(&self) -> &ContactInfo {
        &self.primary_contact
    }

    pub fn account_manager_id(&self) -> Option<UserId> {
        self.account_manager_id
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }

    pub fn payment_terms(&self) -> Option<&str> {
        self.payment_terms.as_deref()
    }

    pub fn credit_limit(&self) -> Option<Money> {
        self.credit_limit
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Whether invoices and projects may reference this client.
    pub fn can_be_billed(&self) -> bool {
        self.created && self.deleted_at.is_none()
    }
}

impl AggregateRoot for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl SoftDelete for Client {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// Command: RegisterClient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterClient {
    pub client_id: ClientId,
    pub company_name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub primary_contact: ContactInfo,
    pub account_manager_id: Option<UserId>,
    pub status: ClientStatus,
    pub payment_terms: Option<String>,
    pub credit_limit: Option<Money>,
    pub tax_id: Option<String>,
    /// Initial metadata (lead conversion carries the lead's metadata over).
    pub metadata: Metadata,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl RegisterClient {
    pub fn new(company_name: impl Into<String>, actor: Actor, occurred_at: DateTime<Utc>) -> Self {
        Self {
            client_id: ClientId::new(),
            company_name: company_name.into(),
            industry: None,
            website: None,
            primary_contact: ContactInfo::default(),
            account_manager_id: None,
            status: ClientStatus::Active,
            payment_terms: None,
            credit_limit: None,
            tax_id: None,
            metadata: Metadata::new(),
            actor,
            occurred_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientChanges {
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub primary_contact: Option<ContactInfo>,
    pub account_manager_id: Option<UserId>,
    pub status: Option<ClientStatus>,
    pub payment_terms: Option<String>,
    pub credit_limit: Option<Money>,
    pub tax_id: Option<String>,
}

impl ClientChanges {
    pub fn field_names(&self) -> Vec<String> {
        [
            ("company_name", self.company_name.is_some()),
            ("industry", self.industry.is_some()),
            ("website", self.website.is_some()),
            ("primary_contact", self.primary_contact.is_some()),
            ("account_manager_id", self.account_manager_id.is_some()),
            ("status", self.status.is_some()),
            ("payment_terms", self.payment_terms.is_some()),
            ("credit_limit", self.credit_limit.is_some()),
            ("tax_id", self.tax_id.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then(|| name.to_string()))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateClient {
    pub changes: ClientChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteClient {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientCommand {
    RegisterClient(RegisterClient),
    UpdateClient(UpdateClient),
    DeleteClient(DeleteClient),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRegistered {
    pub client: RegisterClient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUpdated {
    pub changes: ClientChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDeleted {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    ClientRegistered(ClientRegistered),
    ClientUpdated(ClientUpdated),
    ClientDeleted(ClientDeleted),
}

impl DomainEvent for ClientEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::ClientRegistered(_) => "parties.client.registered",
            ClientEvent::ClientUpdated(_) => "parties.client.updated",
            ClientEvent::ClientDeleted(_) => "parties.client.deleted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ClientEvent::ClientRegistered(e) => e.client.occurred_at,
            ClientEvent::ClientUpdated(e) => e.occurred_at,
            ClientEvent::ClientDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Client {
    type Command = ClientCommand;
    type Event = ClientEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ClientEvent::ClientRegistered(ClientRegistered { client: c }) => {
                self.id = c.client_id;
                self.company_name = c.company_name.clone();
                self.industry = c.industry.clone();
                self.website = c.website.clone();
                self.primary_contact = c.primary_contact.clone();
                self.account_manager_id = c.account_manager_id;
                self.status = c.status;
                self.payment_terms = c.payment_terms.clone();
                self.credit_limit = c.credit_limit;
                self.tax_id = c.tax_id.clone();
                self.created_at = Some(c.occurred_at);
                self.created = true;
                self.metadata = audit::record(&c.metadata, "created", &c.actor, c.occurred_at, None);
            }
            ClientEvent::ClientUpdated(e) => {
                let c = &e.changes;
                if let Some(name) = &c.company_name {
                    self.company_name = name.clone();
                }
                if c.industry.is_some() {
                    self.industry = c.industry.clone();
                }
                if c.website.is_some() {
                    self.website = c.website.clone();
                }
                if let Some(contact) = &c.primary_contact {
                    self.primary_contact = contact.clone();
                }
                if c.account_manager_id.is_some() {
                    self.account_manager_id = c.account_manager_id;
                }
                if let Some(status) = c.status {
                    self.status = status;
                }
                if c.payment_terms.is_some() {
                    self.payment_terms = c.payment_terms.clone();
                }
                if c.credit_limit.is_some() {
                    self.credit_limit = c.credit_limit;
                }
                if c.tax_id.is_some() {
                    self.tax_id = c.tax_id.clone();
                }
                self.metadata = audit::record(
                    &self.metadata,
                    "updated",
                    &e.actor,
                    e.occurred_at,
                    Some(c.field_names()),
                );
            }
            ClientEvent::ClientDeleted(e) => {
                self.deleted_at = Some(e.occurred_at);
                self.metadata = audit::record(&self.metadata, "deleted", &e.actor, e.occurred_at, None);
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ClientCommand::RegisterClient(cmd) => self.handle_register(cmd),
            ClientCommand::UpdateClient(cmd) => self.handle_update(cmd),
            ClientCommand::DeleteClient(cmd) => self.handle_delete(cmd),
        }
    }
}

fn validate_company_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("company_name must not be empty"));
    }
    Ok(())
}

impl Client {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.can_be_billed() {
            return Err(DomainError::not_found("client"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterClient) -> Result<Vec<ClientEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("client already exists"));
        }
        validate_company_name(&cmd.company_name)?;
        if let Some(limit) = cmd.credit_limit {
            money::ensure_non_negative("credit_limit", limit)?;
        }
        Ok(vec![ClientEvent::ClientRegistered(ClientRegistered { client: cmd.clone() })])
    }

    fn handle_update(&self, cmd: &UpdateClient) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_live()?;
        let c = &cmd.changes;
        if c.field_names().is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }
        if let Some(name) = &c.company_name {
            validate_company_name(name)?;
        }
        if let Some(limit) = c.credit_limit {
            money::ensure_non_negative("credit_limit", limit)?;
        }
        Ok(vec![ClientEvent::ClientUpdated(ClientUpdated {
            changes: c.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteClient) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_live()?;
        Ok(vec![ClientEvent::ClientDeleted(ClientDeleted {
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
