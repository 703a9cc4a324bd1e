use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use orbit_core::audit::{self, AuditEntry};
use orbit_core::money::{self, DEFAULT_CURRENCY};
use orbit_core::{
    Actor, Aggregate, AggregateRoot, ClientId, DomainError, DomainEvent, InvoiceId,
    InvoiceItemId, Metadata, Money, PaymentId, ProjectId, UserId,
};

use crate::InvoiceStatus;

const MAX_TAX_RATE: Decimal = Decimal::ONE_HUNDRED;

/// Persisted invoice line. `amount` is always `quantity * unit_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    /// Percentage in `[0, 100]`. Informational; tax is charged via `tax_amount`.
    pub tax_rate: Decimal,
    pub amount: Money,
}

/// Line item as submitted on invoice creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub id: InvoiceItemId,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub tax_rate: Decimal,
}

impl NewInvoiceItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Money) -> Self {
        Self {
            id: InvoiceItemId::new(),
            description: description.into(),
            quantity,
            unit_price,
            tax_rate: Decimal::ZERO,
        }
    }

    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("item quantity must be positive"));
        }
        money::ensure_non_negative("item unit_price", self.unit_price)?;
        if self.tax_rate < Decimal::ZERO || self.tax_rate > MAX_TAX_RATE {
            return Err(DomainError::validation("item tax_rate must be between 0 and 100"));
        }
        Ok(())
    }
}

/// A payment applied to an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub amount: Money,
    pub currency: String,
    pub method: Option<String>,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate root: Invoice.
///
/// Holds its items and payments. `amount_paid` is the running sum of
/// `payments` and never exceeds `total_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    invoice_number: String,
    client_id: Option<ClientId>,
    project_id: Option<ProjectId>,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    status: InvoiceStatus,
    subtotal: Money,
    tax_amount: Money,
    discount_amount: Money,
    total_amount: Money,
    amount_paid: Money,
    currency: String,
    payment_terms: Option<String>,
    notes: Option<String>,
    created_by: Option<UserId>,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    items: Vec<InvoiceItem>,
    payments: Vec<Payment>,
    metadata: Metadata,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            invoice_number: String::new(),
            client_id: None,
            project_id: None,
            issue_date: None,
            due_date: None,
            status: InvoiceStatus::Draft,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            currency: DEFAULT_CURRENCY.to_string(),
            payment_terms: None,
            notes: None,
            created_by: None,
            approved_by: None,
            approved_at: None,
            items: Vec::new(),
            payments: Vec::new(),
            metadata: Metadata::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn payment_terms(&self) -> Option<&str> {
        self.payment_terms.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
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

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn remaining_balance(&self) -> Money {
        self.total_amount - self.amount_paid
    }

    /// Whether the invoice would be flagged by [`MarkOverdue`] on `today`.
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Sent && self.due_date.is_some_and(|due| due < today)
    }

    /// Only drafts and cancelled invoices may be hard-deleted.
    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("invoice"));
        }
        if !self.status.is_deletable() {
            return Err(DomainError::invalid_state(format!(
                "cannot delete a {} invoice",
                self.status
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub client_id: ClientId,
    pub project_id: Option<ProjectId>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<NewInvoiceItem>,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub currency: String,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceChanges {
    pub project_id: Option<ProjectId>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_amount: Option<Money>,
    pub discount_amount: Option<Money>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
}

impl InvoiceChanges {
    /// Names of the fields this update sets, in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        let fields = [
            ("project_id", self.project_id.is_some()),
            ("issue_date", self.issue_date.is_some()),
            ("due_date", self.due_date.is_some()),
            ("tax_amount", self.tax_amount.is_some()),
            ("discount_amount", self.discount_amount.is_some()),
            ("payment_terms", self.payment_terms.is_some()),
            ("notes", self.notes.is_some()),
        ];
        fields
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }
}

/// Command: UpdateInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub changes: InvoiceChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveInvoice {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendInvoice {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkOverdue. System-triggered, no actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOverdue {
    pub today: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub payment_id: PaymentId,
    pub amount: Money,
    /// Defaults to the invoice currency.
    pub currency: Option<String>,
    pub method: Option<String>,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub reason: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    UpdateInvoice(UpdateInvoice),
    ApproveInvoice(ApproveInvoice),
    SendInvoice(SendInvoice),
    MarkOverdue(MarkOverdue),
    RecordPayment(RecordPayment),
    CancelInvoice(CancelInvoice),
}

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub client_id: ClientId,
    pub project_id: Option<ProjectId>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub currency: String,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceUpdated. Carries the recomputed total and resulting status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceUpdated {
    pub changes: InvoiceChanges,
    pub total_amount: Money,
    pub status: InvoiceStatus,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceApproved {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSent {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceMarkedOverdue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMarkedOverdue {
    pub today: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub payment: Payment,
    pub new_amount_paid: Money,
    /// `true` when this payment covers the remaining balance.
    pub settled: bool,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub reason: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    InvoiceUpdated(InvoiceUpdated),
    InvoiceApproved(InvoiceApproved),
    InvoiceSent(InvoiceSent),
    InvoiceMarkedOverdue(InvoiceMarkedOverdue),
    PaymentRecorded(PaymentRecorded),
    InvoiceCancelled(InvoiceCancelled),
}

impl DomainEvent for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "invoicing.invoice.created",
            InvoiceEvent::InvoiceUpdated(_) => "invoicing.invoice.updated",
            InvoiceEvent::InvoiceApproved(_) => "invoicing.invoice.approved",
            InvoiceEvent::InvoiceSent(_) => "invoicing.invoice.sent",
            InvoiceEvent::InvoiceMarkedOverdue(_) => "invoicing.invoice.marked_overdue",
            InvoiceEvent::PaymentRecorded(_) => "invoicing.invoice.payment_recorded",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::InvoiceUpdated(e) => e.occurred_at,
            InvoiceEvent::InvoiceApproved(e) => e.occurred_at,
            InvoiceEvent::InvoiceSent(e) => e.occurred_at,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.occurred_at,
            InvoiceEvent::PaymentRecorded(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.invoice_number = e.invoice_number.clone();
                self.client_id = Some(e.client_id);
                self.project_id = e.project_id;
                self.issue_date = Some(e.issue_date);
                self.due_date = Some(e.due_date);
                self.items = e.items.clone();
                self.subtotal = e.subtotal;
                self.tax_amount = e.tax_amount;
                self.discount_amount = e.discount_amount;
                self.total_amount = e.total_amount;
                self.amount_paid = Decimal::ZERO;
                self.currency = e.currency.clone();
                self.payment_terms = e.payment_terms.clone();
                self.notes = e.notes.clone();
                self.created_by = Some(e.actor.id);
                self.status = InvoiceStatus::Draft;
                self.created_at = Some(e.occurred_at);
                self.created = true;
                self.metadata = audit::record(&self.metadata, "created", &e.actor, e.occurred_at, None);
            }
            InvoiceEvent::InvoiceUpdated(e) => {
                let c = &e.changes;
                if let Some(project_id) = c.project_id {
                    self.project_id = Some(project_id);
                }
                if let Some(issue_date) = c.issue_date {
                    self.issue_date = Some(issue_date);
                }
                if let Some(due_date) = c.due_date {
                    self.due_date = Some(due_date);
                }
                if let Some(tax) = c.tax_amount {
                    self.tax_amount = tax;
                }
                if let Some(discount) = c.discount_amount {
                    self.discount_amount = discount;
                }
                if let Some(terms) = &c.payment_terms {
                    self.payment_terms = Some(terms.clone());
                }
                if let Some(notes) = &c.notes {
                    self.notes = Some(notes.clone());
                }
                self.total_amount = e.total_amount;
                self.status = e.status;
                self.metadata = audit::record(
                    &self.metadata,
                    "updated",
                    &e.actor,
                    e.occurred_at,
                    Some(c.field_names()),
                );
            }
            InvoiceEvent::InvoiceApproved(e) => {
                self.status = InvoiceStatus::Approved;
                self.approved_by = Some(e.actor.id);
                self.approved_at = Some(e.occurred_at);
                self.metadata = audit::record(&self.metadata, "approved", &e.actor, e.occurred_at, None);
            }
            InvoiceEvent::InvoiceSent(e) => {
                self.status = InvoiceStatus::Sent;
                self.metadata = audit::record(&self.metadata, "sent", &e.actor, e.occurred_at, None);
            }
            InvoiceEvent::InvoiceMarkedOverdue(_) => {
                self.status = InvoiceStatus::Overdue;
            }
            InvoiceEvent::PaymentRecorded(e) => {
                self.payments.push(e.payment.clone());
                self.amount_paid = e.new_amount_paid;
                if e.settled {
                    self.status = InvoiceStatus::Paid;
                }
                let entry = AuditEntry::new("payment_recorded", &e.actor, e.occurred_at).with_detail(json!({
                    "payment_id": e.payment.id,
                    "amount": e.payment.amount,
                    "amount_paid": e.new_amount_paid,
                }));
                self.metadata = audit::append(&self.metadata, entry);
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                self.status = InvoiceStatus::Cancelled;
                let mut entry = AuditEntry::new("cancelled", &e.actor, e.occurred_at);
                if let Some(reason) = &e.reason {
                    entry = entry.with_detail(json!({ "reason": reason }));
                }
                self.metadata = audit::append(&self.metadata, entry);
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::UpdateInvoice(cmd) => self.handle_update(cmd),
            InvoiceCommand::ApproveInvoice(cmd) => self.handle_approve(cmd),
            InvoiceCommand::SendInvoice(cmd) => self.handle_send(cmd),
            InvoiceCommand::MarkOverdue(cmd) => self.handle_mark_overdue(cmd),
            InvoiceCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
        }
    }
}

/// `subtotal + tax - discount`, rejecting non-positive or overflowing totals.
fn compute_total(subtotal: Money, tax: Money, discount: Money) -> Result<Money, DomainError> {
    money::ensure_non_negative("tax_amount", tax)?;
    money::ensure_non_negative("discount_amount", discount)?;
    let total = subtotal
        .checked_add(tax)
        .and_then(|t| t.checked_sub(discount))
        .ok_or_else(|| DomainError::validation("invoice total overflow"))?;
    money::ensure_positive("total_amount", total)?;
    Ok(total)
}

fn ensure_dates(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), DomainError> {
    if due_date < issue_date {
        return Err(DomainError::validation("due_date must not be before issue_date"));
    }
    Ok(())
}

impl Invoice {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("invoice"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation("invoice needs at least one item"));
        }
        money::ensure_currency(&cmd.currency)?;
        ensure_dates(cmd.issue_date, cmd.due_date)?;

        let mut items = Vec::with_capacity(cmd.items.len());
        let mut subtotal = Decimal::ZERO;
        for item in &cmd.items {
            item.validate()?;
            let amount = item
                .quantity
                .checked_mul(item.unit_price)
                .ok_or_else(|| DomainError::validation("item amount overflow"))?;
            subtotal = subtotal
                .checked_add(amount)
                .ok_or_else(|| DomainError::validation("invoice subtotal overflow"))?;
            items.push(InvoiceItem {
                id: item.id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                tax_rate: item.tax_rate,
                amount,
            });
        }
        let total_amount = compute_total(subtotal, cmd.tax_amount, cmd.discount_amount)?;

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            invoice_id: cmd.invoice_id,
            invoice_number: cmd.invoice_number.clone(),
            client_id: cmd.client_id,
            project_id: cmd.project_id,
            issue_date: cmd.issue_date,
            due_date: cmd.due_date,
            items,
            subtotal,
            tax_amount: cmd.tax_amount,
            discount_amount: cmd.discount_amount,
            total_amount,
            currency: cmd.currency.clone(),
            payment_terms: cmd.payment_terms.clone(),
            notes: cmd.notes.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        if self.status == InvoiceStatus::Paid {
            return Err(DomainError::invalid_state("cannot edit a paid invoice"));
        }
        let c = &cmd.changes;
        if c.is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }

        if let (Some(issue), Some(due)) = (c.issue_date.or(self.issue_date), c.due_date.or(self.due_date)) {
            ensure_dates(issue, due)?;
        }

        let tax = c.tax_amount.unwrap_or(self.tax_amount);
        let discount = c.discount_amount.unwrap_or(self.discount_amount);
        let total_amount = compute_total(self.subtotal, tax, discount)?;
        if total_amount < self.amount_paid {
            return Err(DomainError::validation(format!(
                "total_amount {total_amount} would fall below amount_paid {}",
                self.amount_paid
            )));
        }

        let status = if self.amount_paid > Decimal::ZERO && self.amount_paid >= total_amount {
            InvoiceStatus::Paid
        } else {
            self.status
        };

        Ok(vec![InvoiceEvent::InvoiceUpdated(InvoiceUpdated {
            changes: c.clone(),
            total_amount,
            status,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::invalid_state(format!(
                "only draft invoices can be approved (status: {})",
                self.status
            )));
        }
        Ok(vec![InvoiceEvent::InvoiceApproved(InvoiceApproved {
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_send(&self, cmd: &SendInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        if !matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Approved) {
            return Err(DomainError::invalid_state(format!(
                "cannot send a {} invoice",
                self.status
            )));
        }
        Ok(vec![InvoiceEvent::InvoiceSent(InvoiceSent {
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    /// No events when the invoice is not a sent invoice past its due date.
    fn handle_mark_overdue(&self, cmd: &MarkOverdue) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        if !self.is_past_due(cmd.today) {
            return Ok(Vec::new());
        }
        Ok(vec![InvoiceEvent::InvoiceMarkedOverdue(InvoiceMarkedOverdue {
            today: cmd.today,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::invalid_state("cannot record a payment on a cancelled invoice"));
        }
        money::ensure_positive("payment amount", cmd.amount)?;

        let remaining = self.remaining_balance();
        if cmd.amount > remaining {
            return Err(DomainError::validation(format!(
                "payment {} exceeds remaining balance {remaining}",
                cmd.amount
            )));
        }

        let currency = cmd.currency.clone().unwrap_or_else(|| self.currency.clone());
        money::ensure_currency(&currency)?;
        if currency != self.currency {
            return Err(DomainError::validation(format!(
                "payment currency {currency} does not match invoice currency {}",
                self.currency
            )));
        }

        let client_id = self.client_id.ok_or_else(|| DomainError::not_found("client"))?;
        let new_amount_paid = self.amount_paid + cmd.amount;

        Ok(vec![InvoiceEvent::PaymentRecorded(PaymentRecorded {
            payment: Payment {
                id: cmd.payment_id,
                invoice_id: self.id,
                client_id,
                amount: cmd.amount,
                currency,
                method: cmd.method.clone(),
                payment_date: cmd.payment_date,
                reference_number: cmd.reference_number.clone(),
                notes: cmd.notes.clone(),
                created_by: Some(cmd.actor.id),
                created_at: cmd.occurred_at,
            },
            new_amount_paid,
            settled: new_amount_paid >= self.total_amount,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        if !self.status.can_transition_to(InvoiceStatus::Cancelled) {
            return Err(DomainError::invalid_state(format!(
                "cannot cancel a {} invoice",
                self.status
            )));
        }
        if !self.payments.is_empty() {
            return Err(DomainError::invalid_state(
                "cannot cancel an invoice with recorded payments",
            ));
        }
        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            reason: cmd.reason.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn actor() -> Actor {
        Actor::new(UserId::new(), "Fiona Finance")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    fn create_cmd(items: Vec<NewInvoiceItem>, tax: Money, discount: Money) -> CreateInvoice {
        CreateInvoice {
            invoice_id: InvoiceId::new(),
            invoice_number: "INV-202604-00000A".to_string(),
            client_id: ClientId::new(),
            project_id: None,
            issue_date: day(1),
            due_date: day(30),
            items,
            tax_amount: tax,
            discount_amount: discount,
            currency: "USD".to_string(),
            payment_terms: Some("net 30".to_string()),
            notes: None,
            actor: actor(),
            occurred_at: t0(),
        }
    }

    /// Invoice with one 2 x 100.00 line, 16.00 tax, 6.00 discount (total 210.00).
    fn created_invoice() -> Invoice {
        let cmd = create_cmd(vec![NewInvoiceItem::new("Design work", dec!(2), dec!(100.00))], dec!(16.00), dec!(6.00));
        let mut invoice = Invoice::empty(cmd.invoice_id);
        invoice.execute(&InvoiceCommand::CreateInvoice(cmd)).unwrap();
        invoice
    }

    fn pay(amount: Money) -> InvoiceCommand {
        InvoiceCommand::RecordPayment(RecordPayment {
            payment_id: PaymentId::new(),
            amount,
            currency: None,
            method: Some("bank_transfer".to_string()),
            payment_date: day(5),
            reference_number: None,
            notes: None,
            actor: actor(),
            occurred_at: t0(),
        })
    }

    fn send() -> InvoiceCommand {
        InvoiceCommand::SendInvoice(SendInvoice { actor: actor(), occurred_at: t0() })
    }

    fn update(changes: InvoiceChanges) -> InvoiceCommand {
        InvoiceCommand::UpdateInvoice(UpdateInvoice { changes, actor: actor(), occurred_at: t0() })
    }

    fn cancel() -> InvoiceCommand {
        InvoiceCommand::CancelInvoice(CancelInvoice { reason: None, actor: actor(), occurred_at: t0() })
    }

    #[test]
    fn create_computes_totals_and_starts_as_draft() {
        let invoice = created_invoice();

        assert_eq!(invoice.status(), InvoiceStatus::Draft);
        assert_eq!(invoice.subtotal(), dec!(200.00));
        assert_eq!(invoice.total_amount(), dec!(210.00));
        assert_eq!(invoice.amount_paid(), Decimal::ZERO);
        assert_eq!(invoice.items()[0].amount, dec!(200.00));
        assert_eq!(invoice.version(), 1);

        let log = invoice.metadata().audit_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "created");
        assert_eq!(log[0].actor_name, "Fiona Finance");
    }

    #[test]
    fn create_rejects_invalid_input() {
        let cases = [
            create_cmd(vec![], Decimal::ZERO, Decimal::ZERO),
            create_cmd(vec![NewInvoiceItem::new("x", dec!(0), dec!(1))], Decimal::ZERO, Decimal::ZERO),
            create_cmd(vec![NewInvoiceItem::new("x", dec!(1), dec!(-1))], Decimal::ZERO, Decimal::ZERO),
            create_cmd(
                vec![NewInvoiceItem::new("x", dec!(1), dec!(1)).with_tax_rate(dec!(100.01))],
                Decimal::ZERO,
                Decimal::ZERO,
            ),
            create_cmd(vec![NewInvoiceItem::new("x", dec!(1), dec!(1))], dec!(-1), Decimal::ZERO),
            create_cmd(vec![NewInvoiceItem::new("x", dec!(1), dec!(1))], Decimal::ZERO, dec!(-1)),
            create_cmd(vec![NewInvoiceItem::new("x", dec!(1), dec!(10))], Decimal::ZERO, dec!(10)),
            CreateInvoice {
                due_date: day(1),
                issue_date: day(2),
                ..create_cmd(vec![NewInvoiceItem::new("x", dec!(1), dec!(1))], Decimal::ZERO, Decimal::ZERO)
            },
        ];

        for cmd in cases {
            let invoice = Invoice::empty(cmd.invoice_id);
            let err = invoice.handle(&InvoiceCommand::CreateInvoice(cmd.clone())).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{cmd:?} -> {err:?}");
        }
    }

    #[test]
    fn commands_on_missing_invoice_are_not_found() {
        let invoice = Invoice::empty(InvoiceId::new());
        assert_eq!(invoice.handle(&send()).unwrap_err(), DomainError::NotFound("invoice"));
        assert_eq!(invoice.ensure_deletable().unwrap_err(), DomainError::NotFound("invoice"));
    }

    #[test]
    fn partial_then_full_payment_settles_the_invoice() {
        let mut invoice = created_invoice();
        invoice.execute(&send()).unwrap();

        invoice.execute(&pay(dec!(60.00))).unwrap();
        assert_eq!(invoice.amount_paid(), dec!(60.00));
        assert_eq!(invoice.status(), InvoiceStatus::Sent);
        assert_eq!(invoice.remaining_balance(), dec!(150.00));

        invoice.execute(&pay(dec!(150.00))).unwrap();
        assert_eq!(invoice.amount_paid(), dec!(210.00));
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.payments().len(), 2);

        let actions: Vec<String> = invoice.metadata().audit_log().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, ["created", "sent", "payment_recorded", "payment_recorded"]);
    }

    #[test]
    fn overpayment_and_non_positive_payments_are_rejected() {
        let mut invoice = created_invoice();
        invoice.execute(&pay(dec!(200.00))).unwrap();
        let before = invoice.clone();

        for amount in [dec!(10.01), dec!(0), dec!(-5)] {
            let err = invoice.execute(&pay(amount)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{amount}: {err:?}");
        }
        assert_eq!(invoice, before);
    }

    #[test]
    fn payment_in_another_currency_is_rejected() {
        let invoice = created_invoice();
        let InvoiceCommand::RecordPayment(mut cmd) = pay(dec!(1)) else { unreachable!() };
        cmd.currency = Some("EUR".to_string());
        let err = invoice.handle(&InvoiceCommand::RecordPayment(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn approve_only_from_draft_then_send() {
        let mut invoice = created_invoice();
        let approve = InvoiceCommand::ApproveInvoice(ApproveInvoice { actor: actor(), occurred_at: t0() });

        invoice.execute(&approve).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Approved);
        assert!(invoice.approved_by().is_some());
        assert_eq!(invoice.approved_at(), Some(t0()));

        assert!(matches!(invoice.handle(&approve), Err(DomainError::InvalidState(_))));

        invoice.execute(&send()).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Sent);
        assert!(matches!(invoice.handle(&send()), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn mark_overdue_is_idempotent_and_needs_a_past_due_date() {
        let mut invoice = created_invoice();
        let mark = |today| InvoiceCommand::MarkOverdue(MarkOverdue { today, occurred_at: t0() });
        let after_due = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();

        // Drafts are never overdue.
        assert!(invoice.execute(&mark(after_due)).unwrap().is_empty());

        invoice.execute(&send()).unwrap();
        // Due today is not yet overdue.
        assert!(invoice.execute(&mark(day(30))).unwrap().is_empty());

        assert_eq!(invoice.execute(&mark(after_due)).unwrap().len(), 1);
        assert_eq!(invoice.status(), InvoiceStatus::Overdue);

        let version = invoice.version();
        assert!(invoice.execute(&mark(after_due)).unwrap().is_empty());
        assert_eq!(invoice.version(), version);

        // Overdue invoices can still be paid.
        invoice.execute(&pay(dec!(210.00))).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
    }

    #[test]
    fn update_recomputes_total_and_lists_changed_fields() {
        let mut invoice = created_invoice();
        invoice
            .execute(&update(InvoiceChanges {
                tax_amount: Some(dec!(20.00)),
                notes: Some("rush order".to_string()),
                ..InvoiceChanges::default()
            }))
            .unwrap();

        assert_eq!(invoice.total_amount(), dec!(214.00));
        assert_eq!(invoice.notes(), Some("rush order"));
        let last = invoice.metadata().audit_log().pop().unwrap();
        assert_eq!(last.action, "updated");
        assert_eq!(last.changes, Some(vec!["tax_amount".to_string(), "notes".to_string()]));
    }

    #[test]
    fn update_rules() {
        let mut invoice = created_invoice();
        assert!(matches!(
            invoice.handle(&update(InvoiceChanges::default())),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            invoice.handle(&update(InvoiceChanges { due_date: Some(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()), ..Default::default() })),
            Err(DomainError::Validation(_))
        ));

        invoice.execute(&pay(dec!(100.00))).unwrap();
        // Discount would push the total below what was already paid.
        assert!(matches!(
            invoice.handle(&update(InvoiceChanges { discount_amount: Some(dec!(150.00)), ..Default::default() })),
            Err(DomainError::Validation(_))
        ));
        // Discount lands exactly on the paid amount: settled by the update.
        invoice
            .execute(&update(InvoiceChanges { discount_amount: Some(dec!(116.00)), ..Default::default() }))
            .unwrap();
        assert_eq!(invoice.total_amount(), dec!(100.00));
        assert_eq!(invoice.status(), InvoiceStatus::Paid);

        let err = invoice
            .handle(&update(InvoiceChanges { notes: Some("late".into()), ..Default::default() }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn cancel_rules() {
        let mut invoice = created_invoice();
        invoice.execute(&send()).unwrap();
        invoice.execute(&cancel()).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Cancelled);
        assert!(invoice.ensure_deletable().is_ok());
        assert!(matches!(invoice.handle(&cancel()), Err(DomainError::InvalidState(_))));
        assert!(matches!(invoice.handle(&pay(dec!(1))), Err(DomainError::InvalidState(_))));

        let mut paid_in_part = created_invoice();
        paid_in_part.execute(&pay(dec!(1))).unwrap();
        assert!(matches!(paid_in_part.handle(&cancel()), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn only_draft_and_cancelled_are_deletable() {
        let mut invoice = created_invoice();
        assert!(invoice.ensure_deletable().is_ok());
        invoice.execute(&send()).unwrap();
        assert!(matches!(invoice.ensure_deletable(), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn event_types_are_namespaced() {
        let invoice = created_invoice();
        let events = invoice.handle(&send()).unwrap();
        assert_eq!(events[0].event_type(), "invoicing.invoice.sent");
        assert_eq!(events[0].occurred_at(), t0());
    }

    fn cents() -> impl Strategy<Value = Decimal> {
        (0i64..10_000_000).prop_map(|c| Decimal::new(c, 2))
    }

    proptest! {
        #[test]
        fn totals_are_exact_decimal_sums(
            lines in prop::collection::vec((1i64..1_000, cents()), 1..1000),
            tax in cents(),
        ) {
            let items: Vec<NewInvoiceItem> = lines
                .iter()
                .map(|(q, p)| NewInvoiceItem::new("line", Decimal::from(*q), *p))
                .collect();
            let expected_subtotal: Decimal = lines.iter().map(|(q, p)| Decimal::from(*q) * *p).sum();
            prop_assume!(expected_subtotal + tax > Decimal::ZERO);

            let cmd = create_cmd(items, tax, Decimal::ZERO);
            let mut invoice = Invoice::empty(cmd.invoice_id);
            invoice.execute(&InvoiceCommand::CreateInvoice(cmd)).unwrap();

            prop_assert_eq!(invoice.subtotal(), expected_subtotal);
            prop_assert_eq!(invoice.total_amount(), expected_subtotal + tax);
            let item_sum: Decimal = invoice.items().iter().map(|i| i.amount).sum();
            prop_assert_eq!(item_sum, invoice.subtotal());
        }

        #[test]
        fn payments_never_exceed_total(amounts in prop::collection::vec(1i64..20_000, 1..20)) {
            let mut invoice = created_invoice();
            for cents in amounts {
                let amount = Decimal::new(cents, 2);
                let before = invoice.clone();
                match invoice.execute(&pay(amount)) {
                    Ok(_) => prop_assert!(amount <= before.remaining_balance()),
                    Err(err) => {
                        prop_assert!(matches!(err, DomainError::Validation(_)));
                        prop_assert_eq!(&invoice, &before);
                    }
                }
                prop_assert!(invoice.amount_paid() <= invoice.total_amount());
                prop_assert_eq!(
                    invoice.status() == InvoiceStatus::Paid,
                    invoice.amount_paid() == invoice.total_amount()
                );
            }
        }
    }
}
