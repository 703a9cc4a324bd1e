use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orbit_core::audit;
use orbit_core::{
    Actor, Aggregate, AggregateRoot, ClientId, CommentId, DomainError, DomainEvent, Metadata,
    Priority, TicketId, UserId,
};

use crate::sla::sla_due_at;

const MAX_SUBJECT_LEN: usize = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    WaitingCustomer,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// Resolved or closed tickets no longer run against their SLA.
    pub fn is_finished(self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketComment {
    pub id: CommentId,
    pub user_id: UserId,
    pub comment: String,
    /// Internal notes are hidden from the customer.
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate root: Ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    ticket_number: String,
    client_id: Option<ClientId>,
    subject: String,
    description: String,
    status: TicketStatus,
    priority: Priority,
    category: Option<String>,
    channel: Option<String>,
    assigned_to: Option<UserId>,
    created_by: Option<UserId>,
    sla_due_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    comments: Vec<TicketComment>,
    metadata: Metadata,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Ticket {
    pub fn empty(id: TicketId) -> Self {
        Self {
            id,
            ticket_number: String::new(),
            client_id: None,
            subject: String::new(),
            description: String::new(),
            status: TicketStatus::Open,
            priority: Priority::Medium,
            category: None,
            channel: None,
            assigned_to: None,
            created_by: None,
            sla_due_at: None,
            resolved_at: None,
            closed_at: None,
            comments: Vec::new(),
            metadata: Metadata::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn ticket_number(&self) -> &str {
        &self.ticket_number
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn sla_due_at(&self) -> Option<DateTime<Utc>> {
        self.sla_due_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn comments(&self) -> &[TicketComment] {
        &self.comments
    }

    /// Comments visible to the customer.
    pub fn public_comments(&self) -> impl Iterator<Item = &TicketComment> {
        self.comments.iter().filter(|c| !c.is_internal)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_sla_breached(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_finished() && self.sla_due_at.is_some_and(|due| now > due)
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("ticket"));
        }
        Ok(())
    }
}

impl AggregateRoot for Ticket {
    type Id = TicketId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTicket {
    pub ticket_id: TicketId,
    pub ticket_number: String,
    pub client_id: Option<ClientId>,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub category: Option<String>,
    pub channel: Option<String>,
    pub assigned_to: Option<UserId>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketChanges {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub assigned_to: Option<UserId>,
}

impl TicketChanges {
    pub fn field_names(&self) -> Vec<String> {
        [
            ("subject", self.subject.is_some()),
            ("description", self.description.is_some()),
            ("status", self.status.is_some()),
            ("priority", self.priority.is_some()),
            ("category", self.category.is_some()),
            ("assigned_to", self.assigned_to.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then(|| name.to_string()))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTicket {
    pub changes: TicketChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddComment {
    pub comment_id: CommentId,
    pub comment: String,
    pub is_internal: bool,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCommand {
    OpenTicket(OpenTicket),
    UpdateTicket(UpdateTicket),
    AddComment(AddComment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketOpened {
    pub ticket: OpenTicket,
    pub sla_due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUpdated {
    pub changes: TicketChanges,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAdded {
    pub comment: TicketComment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    TicketOpened(TicketOpened),
    TicketUpdated(TicketUpdated),
    CommentAdded(CommentAdded),
}

impl DomainEvent for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::TicketOpened(_) => "support.ticket.opened",
            TicketEvent::TicketUpdated(_) => "support.ticket.updated",
            TicketEvent::CommentAdded(_) => "support.ticket.comment_added",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TicketEvent::TicketOpened(e) => e.ticket.occurred_at,
            TicketEvent::TicketUpdated(e) => e.occurred_at,
            TicketEvent::CommentAdded(e) => e.comment.created_at,
        }
    }
}

impl Aggregate for Ticket {
    type Command = TicketCommand;
    type Event = TicketEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TicketEvent::TicketOpened(e) => {
                let t = &e.ticket;
                self.id = t.ticket_id;
                self.ticket_number = t.ticket_number.clone();
                self.client_id = t.client_id;
                self.subject = t.subject.clone();
                self.description = t.description.clone();
                self.priority = t.priority;
                self.category = t.category.clone();
                self.channel = t.channel.clone();
                self.assigned_to = t.assigned_to;
                self.created_by = Some(t.actor.id);
                self.status = TicketStatus::Open;
                self.sla_due_at = Some(e.sla_due_at);
                self.created_at = Some(t.occurred_at);
                self.created = true;
                self.metadata = audit::record(&self.metadata, "created", &t.actor, t.occurred_at, None);
            }
            TicketEvent::TicketUpdated(e) => {
                let c = &e.changes;
                if let Some(subject) = &c.subject {
                    self.subject = subject.clone();
                }
                if let Some(description) = &c.description {
                    self.description = description.clone();
                }
                if let Some(status) = c.status {
                    self.status = status;
                }
                if let Some(priority) = c.priority {
                    self.priority = priority;
                }
                if c.category.is_some() {
                    self.category = c.category.clone();
                }
                if c.assigned_to.is_some() {
                    self.assigned_to = c.assigned_to;
                }
                if e.resolved_at.is_some() {
                    self.resolved_at = e.resolved_at;
                }
                if e.closed_at.is_some() {
                    self.closed_at = e.closed_at;
                }
                self.metadata = audit::record(
                    &self.metadata,
                    "updated",
                    &e.actor,
                    e.occurred_at,
                    Some(c.field_names()),
                );
            }
            TicketEvent::CommentAdded(e) => {
                self.comments.push(e.comment.clone());
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TicketCommand::OpenTicket(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("ticket already exists"));
                }
                validate_subject(&cmd.subject)?;
                if cmd.description.trim().is_empty() {
                    return Err(DomainError::validation("ticket description must not be empty"));
                }
                Ok(vec![TicketEvent::TicketOpened(TicketOpened {
                    ticket: cmd.clone(),
                    sla_due_at: sla_due_at(cmd.priority, cmd.occurred_at),
                })])
            }
            TicketCommand::UpdateTicket(cmd) => {
                self.ensure_created()?;
                let c = &cmd.changes;
                if c.field_names().is_empty() {
                    return Err(DomainError::validation("no fields to update"));
                }
                if let Some(subject) = &c.subject {
                    validate_subject(subject)?;
                }
                let resolves = c.status == Some(TicketStatus::Resolved) && self.resolved_at.is_none();
                let closes = c.status == Some(TicketStatus::Closed) && self.closed_at.is_none();
                Ok(vec![TicketEvent::TicketUpdated(TicketUpdated {
                    changes: c.clone(),
                    resolved_at: resolves.then_some(cmd.occurred_at),
                    closed_at: closes.then_some(cmd.occurred_at),
                    actor: cmd.actor.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            TicketCommand::AddComment(cmd) => {
                self.ensure_created()?;
                if cmd.comment.trim().is_empty() {
                    return Err(DomainError::validation("comment must not be empty"));
                }
                Ok(vec![TicketEvent::CommentAdded(CommentAdded {
                    comment: TicketComment {
                        id: cmd.comment_id,
                        user_id: cmd.actor.id,
                        comment: cmd.comment.clone(),
                        is_internal: cmd.is_internal,
                        created_at: cmd.occurred_at,
                    },
                })])
            }
        }
    }
}

fn validate_subject(subject: &str) -> Result<(), DomainError> {
    if subject.trim().is_empty() {
        return Err(DomainError::validation("ticket subject must not be empty"));
    }
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(DomainError::validation("ticket subject is too long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn actor() -> Actor {
        Actor::new(UserId::new(), "Sue Support")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn opened(priority: Priority) -> Ticket {
        let cmd = OpenTicket {
            ticket_id: TicketId::new(),
            ticket_number: "TKT-0000BEEF".to_string(),
            client_id: None,
            subject: "Invoice PDF is blank".to_string(),
            description: "The attachment has no pages.".to_string(),
            priority,
            category: Some("bug".to_string()),
            channel: Some("email".to_string()),
            assigned_to: None,
            actor: actor(),
            occurred_at: t0(),
        };
        let mut ticket = Ticket::empty(cmd.ticket_id);
        ticket.execute(&TicketCommand::OpenTicket(cmd)).unwrap();
        ticket
    }

    fn set_status(ticket: &mut Ticket, status: TicketStatus, at: DateTime<Utc>) {
        ticket
            .execute(&TicketCommand::UpdateTicket(UpdateTicket {
                changes: TicketChanges { status: Some(status), ..Default::default() },
                actor: actor(),
                occurred_at: at,
            }))
            .unwrap();
    }

    #[test]
    fn open_sets_sla_from_priority() {
        let ticket = opened(Priority::Critical);
        assert_eq!(ticket.sla_due_at(), Some(t0() + Duration::hours(4)));
        assert_eq!(ticket.status(), TicketStatus::Open);
        assert_eq!(ticket.metadata().audit_log()[0].action, "created");
    }

    #[test]
    fn sla_breach_stops_once_resolved() {
        let mut ticket = opened(Priority::High);
        let late = t0() + Duration::hours(25);
        assert!(!ticket.is_sla_breached(t0() + Duration::hours(24)));
        assert!(ticket.is_sla_breached(late));

        set_status(&mut ticket, TicketStatus::Resolved, late);
        assert!(!ticket.is_sla_breached(late + Duration::hours(1)));
    }

    #[test]
    fn resolved_and_closed_timestamps_are_set_once() {
        let mut ticket = opened(Priority::Low);
        let r1 = t0() + Duration::hours(1);
        set_status(&mut ticket, TicketStatus::Resolved, r1);
        set_status(&mut ticket, TicketStatus::InProgress, r1 + Duration::hours(1));
        set_status(&mut ticket, TicketStatus::Resolved, r1 + Duration::hours(2));
        assert_eq!(ticket.resolved_at(), Some(r1));
        assert_eq!(ticket.closed_at(), None);

        let c1 = r1 + Duration::hours(3);
        set_status(&mut ticket, TicketStatus::Closed, c1);
        assert_eq!(ticket.closed_at(), Some(c1));

        let last = ticket.metadata().audit_log().pop().unwrap();
        assert_eq!(last.changes, Some(vec!["status".to_string()]));
    }

    #[test]
    fn comments_are_appended_with_visibility() {
        let mut ticket = opened(Priority::Medium);
        for (text, internal) in [("Looking into it", false), ("Renderer timeout in logs", true)] {
            ticket
                .execute(&TicketCommand::AddComment(AddComment {
                    comment_id: CommentId::new(),
                    comment: text.to_string(),
                    is_internal: internal,
                    actor: actor(),
                    occurred_at: t0(),
                }))
                .unwrap();
        }
        assert_eq!(ticket.comments().len(), 2);
        assert_eq!(ticket.public_comments().count(), 1);
    }

    #[test]
    fn rejects_blank_subject_and_comment() {
        let ticket = opened(Priority::Medium);
        let err = ticket
            .handle(&TicketCommand::AddComment(AddComment {
                comment_id: CommentId::new(),
                comment: " ".to_string(),
                is_internal: false,
                actor: actor(),
                occurred_at: t0(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = ticket
            .handle(&TicketCommand::UpdateTicket(UpdateTicket {
                changes: TicketChanges { subject: Some(String::new()), ..Default::default() },
                actor: actor(),
                occurred_at: t0(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
