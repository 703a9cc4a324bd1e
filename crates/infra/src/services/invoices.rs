//! Invoice and payment operations.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orbit_auth::permissions::{
    INVOICES_DELETE, INVOICES_READ, INVOICES_WRITE, PAYMENTS_READ, PAYMENTS_WRITE,
};
use orbit_core::{
    AggregateRoot, ClientId, DomainError, ExpectedVersion, InvoiceId, Money, PaymentId, ProjectId,
};
use orbit_invoicing::{
    ApproveInvoice, CancelInvoice, CreateInvoice, Invoice, InvoiceChanges, InvoiceCommand,
    InvoiceNumberGenerator, MarkOverdue, NewInvoiceItem, Payment, RecordPayment, SendInvoice,
    UpdateInvoice,
};

use crate::cache::CacheNamespace;
use crate::clock::Clock;
use crate::command_dispatcher::CommandDispatcher;
use crate::config::{InvoicingSettings, PaginationSettings};
use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use crate::pdf::PdfRenderer;
use crate::repository::{
    ClientRepository, InvoiceFilter, InvoiceRepository, Page, PageRequest,
};
use crate::state::AppState;

const AFFECTED: &[CacheNamespace] = &[CacheNamespace::Invoices, CacheNamespace::Reports];

/// Input for creating an invoice. The number, id and audit fields are
/// assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub client_id: ClientId,
    pub project_id: Option<ProjectId>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<NewInvoiceItem>,
    pub tax_amount: Money,
    pub discount_amount: Money,
    /// Falls back to the configured default currency.
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInput {
    pub amount: Money,
    pub currency: Option<String>,
    pub method: Option<String>,
    /// Defaults to today.
    pub payment_date: Option<NaiveDate>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

impl PaymentInput {
    pub fn new(amount: Money) -> Self {
        Self {
            amount,
            currency: None,
            method: None,
            payment_date: None,
            reference_number: None,
            notes: None,
        }
    }
}

/// A sent invoice plus its rendered document, when rendering succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct SentInvoice {
    pub invoice: Invoice,
    pub document: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    clients: Arc<dyn ClientRepository>,
    numbers: Arc<dyn InvoiceNumberGenerator>,
    pdf: Arc<dyn PdfRenderer>,
    clock: Arc<dyn Clock>,
    dispatcher: CommandDispatcher,
    currency: String,
    settings: InvoicingSettings,
    pagination: PaginationSettings,
}

impl InvoiceService {
    pub fn new(state: &AppState) -> Self {
        Self {
            invoices: state.repos.invoices.clone(),
            clients: state.repos.clients.clone(),
            numbers: state.invoice_numbers.clone(),
            pdf: state.pdf.clone(),
            clock: state.clock.clone(),
            dispatcher: state.dispatcher(),
            currency: state.settings.app.default_currency.clone(),
            settings: state.settings.invoicing.clone(),
            pagination: state.settings.pagination.clone(),
        }
    }

    /// Create a draft invoice for an active client.
    ///
    /// A number that is already taken is replaced by a fresh one, up to the
    /// configured number of attempts.
    #[tracing::instrument(skip_all, fields(client_id = %draft.client_id))]
    pub fn create(&self, ctx: &RequestContext, draft: InvoiceDraft) -> ServiceResult<Invoice> {
        ctx.require(&INVOICES_WRITE)?;
        if self.clients.get_active(&draft.client_id)?.is_none() {
            return Err(DomainError::not_found("client").into());
        }

        let now = self.clock.now();
        let attempts = self.settings.number_retries.max(1);
        for attempt in 1..=attempts {
            let invoice_id = InvoiceId::new();
            let cmd = CreateInvoice {
                invoice_id,
                invoice_number: self.numbers.next_number(now.date_naive()),
                client_id: draft.client_id,
                project_id: draft.project_id,
                issue_date: draft.issue_date,
                due_date: draft.due_date,
                items: draft.items.clone(),
                tax_amount: draft.tax_amount,
                discount_amount: draft.discount_amount,
                currency: draft.currency.clone().unwrap_or_else(|| self.currency.clone()),
                payment_terms: draft.payment_terms.clone(),
                notes: draft.notes.clone(),
                actor: ctx.actor().clone(),
                occurred_at: now,
            };

            match self.dispatcher.create(
                &*self.invoices,
                Invoice::empty(invoice_id),
                InvoiceCommand::CreateInvoice(cmd),
                AFFECTED,
            ) {
                Ok(done) => {
                    tracing::info!(
                        invoice_number = done.aggregate.invoice_number(),
                        total = %done.aggregate.total_amount(),
                        "invoice created"
                    );
                    return Ok(done.aggregate);
                }
                Err(err) if err.is_duplicate() => {
                    tracing::debug!(attempt, "invoice number collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }

        Err(DomainError::conflict("could not allocate a unique invoice number").into())
    }

    pub fn get(&self, ctx: &RequestContext, id: InvoiceId) -> ServiceResult<Invoice> {
        ctx.require(&INVOICES_READ)?;
        self.load(id)
    }

    /// Filtered page of invoices, newest first.
    ///
    /// Sent invoices past their due date are marked overdue before the
    /// page is read.
    #[tracing::instrument(skip_all)]
    pub fn list(
        &self,
        ctx: &RequestContext,
        filter: &InvoiceFilter,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ServiceResult<Page<Invoice>> {
        ctx.require(&INVOICES_READ)?;
        let request = PageRequest::bounded(
            page.unwrap_or(1),
            page_size.unwrap_or(self.pagination.default_page_size),
            self.pagination.max_page_size,
        )?;

        self.mark_overdue()?;
        Ok(self.invoices.query(filter, request)?)
    }

    /// Flag every sent invoice whose due date has passed. Returns how many
    /// changed. Invoices modified concurrently are left for the next sweep.
    pub fn mark_overdue(&self) -> ServiceResult<usize> {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut marked = 0;

        for invoice in self.invoices.list()?.into_iter().filter(|i| i.is_past_due(today)) {
            let cmd = InvoiceCommand::MarkOverdue(MarkOverdue { today, occurred_at: now });
            match self.dispatcher.execute(&*self.invoices, invoice, cmd, AFFECTED) {
                Ok(done) if done.changed() => marked += 1,
                Ok(_) => {}
                Err(err) if err.is_conflict() => {
                    tracing::debug!("invoice changed while marking overdue, skipping");
                }
                Err(err) => return Err(err),
            }
        }

        if marked > 0 {
            tracing::info!(marked, "invoices marked overdue");
        }
        Ok(marked)
    }

    #[tracing::instrument(skip_all, fields(invoice_id = %id))]
    pub fn update(&self, ctx: &RequestContext, id: InvoiceId, changes: InvoiceChanges) -> ServiceResult<Invoice> {
        ctx.require(&INVOICES_WRITE)?;
        let cmd = InvoiceCommand::UpdateInvoice(UpdateInvoice {
            changes,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.invoices, &id, cmd, AFFECTED)?.aggregate)
    }

    #[tracing::instrument(skip_all, fields(invoice_id = %id))]
    pub fn approve(&self, ctx: &RequestContext, id: InvoiceId) -> ServiceResult<Invoice> {
        ctx.require(&INVOICES_WRITE)?;
        let cmd = InvoiceCommand::ApproveInvoice(ApproveInvoice {
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.invoices, &id, cmd, AFFECTED)?.aggregate)
    }

    /// Mark the invoice sent and render its document.
    ///
    /// Rendering is best-effort: a failure is logged and the invoice is
    /// still sent.
    #[tracing::instrument(skip_all, fields(invoice_id = %id))]
    pub fn send(&self, ctx: &RequestContext, id: InvoiceId) -> ServiceResult<SentInvoice> {
        ctx.require(&INVOICES_WRITE)?;
        let cmd = InvoiceCommand::SendInvoice(SendInvoice {
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        let invoice = self.dispatcher.update(&*self.invoices, &id, cmd, AFFECTED)?.aggregate;

        let document = match self.pdf.render(&invoice) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(
                    invoice_number = invoice.invoice_number(),
                    error = %err,
                    "invoice document rendering failed; invoice sent without it"
                );
                None
            }
        };

        Ok(SentInvoice { invoice, document })
    }

    #[tracing::instrument(skip_all, fields(invoice_id = %id))]
    pub fn cancel(&self, ctx: &RequestContext, id: InvoiceId, reason: Option<String>) -> ServiceResult<Invoice> {
        ctx.require(&INVOICES_WRITE)?;
        let cmd = InvoiceCommand::CancelInvoice(CancelInvoice {
            reason,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.invoices, &id, cmd, AFFECTED)?.aggregate)
    }

    /// Record a (partial) payment.
    ///
    /// The balance check runs against the latest stored invoice: a version
    /// conflict reloads and re-checks, up to the configured retry count.
    #[tracing::instrument(skip_all, fields(invoice_id = %id, amount = %input.amount))]
    pub fn record_payment(
        &self,
        ctx: &RequestContext,
        id: InvoiceId,
        input: PaymentInput,
    ) -> ServiceResult<(Invoice, Payment)> {
        ctx.require(&PAYMENTS_WRITE)?;
        let cmd = InvoiceCommand::RecordPayment(RecordPayment {
            payment_id: PaymentId::new(),
            amount: input.amount,
            currency: input.currency,
            method: input.method,
            payment_date: input.payment_date.unwrap_or_else(|| self.clock.today()),
            reference_number: input.reference_number,
            notes: input.notes,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });

        let retries = self.settings.payment_retries;
        let mut attempt = 0;
        loop {
            match self.dispatcher.update(&*self.invoices, &id, cmd.clone(), AFFECTED) {
                Ok(done) => {
                    let invoice = done.aggregate;
                    let payment = invoice
                        .payments()
                        .last()
                        .cloned()
                        .ok_or_else(|| DomainError::invalid_state("payment was not recorded"))?;
                    tracing::info!(
                        amount_paid = %invoice.amount_paid(),
                        status = %invoice.status(),
                        "payment recorded"
                    );
                    return Ok((invoice, payment));
                }
                Err(err) if err.is_conflict() && attempt < retries => {
                    attempt += 1;
                    tracing::debug!(attempt, "invoice changed concurrently, retrying payment");
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn payments(&self, ctx: &RequestContext, id: InvoiceId) -> ServiceResult<Vec<Payment>> {
        ctx.require(&PAYMENTS_READ)?;
        Ok(self.load(id)?.payments().to_vec())
    }

    /// Hard delete; only drafts and cancelled invoices qualify.
    #[tracing::instrument(skip_all, fields(invoice_id = %id))]
    pub fn delete(&self, ctx: &RequestContext, id: InvoiceId) -> ServiceResult<()> {
        ctx.require(&INVOICES_DELETE)?;
        let invoice = self.load(id)?;
        invoice.ensure_deletable()?;

        if !self.invoices.delete(&id, ExpectedVersion::Exact(invoice.version()))? {
            return Err(DomainError::not_found("invoice").into());
        }
        self.dispatcher.invalidate(AFFECTED);
        tracing::info!(invoice_number = invoice.invoice_number(), "invoice deleted");
        Ok(())
    }

    /// Render the invoice document; unlike [`InvoiceService::send`], a
    /// rendering failure is returned to the caller.
    pub fn render(&self, ctx: &RequestContext, id: InvoiceId) -> ServiceResult<Vec<u8>> {
        ctx.require(&INVOICES_READ)?;
        let invoice = self.load(id)?;
        Ok(self.pdf.render(&invoice)?)
    }

    fn load(&self, id: InvoiceId) -> ServiceResult<Invoice> {
        self.invoices
            .get(&id)?
            .ok_or_else(|| ServiceError::from(DomainError::not_found("invoice")))
    }
}
