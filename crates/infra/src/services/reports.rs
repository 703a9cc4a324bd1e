//! Dashboard and revenue reports.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orbit_auth::permissions::REPORTS_READ;
use orbit_core::{DomainError, SoftDelete};
use orbit_projects::ProjectStatus;

use crate::clock::Clock;
use crate::context::RequestContext;
use crate::error::ServiceResult;
use crate::reports::{
    self, FinancialSummary, MonthlyRevenue, PaymentMethodTotal, PipelineSummary,
};
use crate::repository::Repositories;
use crate::services::invoices::InvoiceService;
use crate::services::leads::sales_scope;
use crate::state::AppState;

/// Counts of live records shown next to the dashboard figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub active_clients: usize,
    pub active_projects: usize,
    pub open_tickets: usize,
    pub sla_breached_tickets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub financial: FinancialSummary,
    /// Mean completion of in-progress projects, one decimal.
    pub average_project_completion: Decimal,
    pub pipeline: PipelineSummary,
    pub counts: RecordCounts,
}

#[derive(Clone)]
pub struct ReportService {
    repos: Repositories,
    invoices: InvoiceService,
    clock: Arc<dyn Clock>,
}

impl ReportService {
    pub fn new(state: &AppState) -> Self {
        Self {
            repos: state.repos.clone(),
            invoices: state.invoices(),
            clock: state.clock.clone(),
        }
    }

    /// Sales users get a pipeline limited to their own leads; every other
    /// figure is organisation wide.
    #[tracing::instrument(skip_all, fields(user_id = %ctx.user_id()))]
    pub fn dashboard(&self, ctx: &RequestContext) -> ServiceResult<Dashboard> {
        ctx.require(&REPORTS_READ)?;
        // overdue counts come from stored status
        self.invoices.mark_overdue()?;

        let today = self.clock.today();
        let now = self.clock.now();
        let invoices = self.repos.invoices.list()?;
        let projects = self.repos.projects.list()?;
        let tasks = self.repos.tasks.list()?;
        let tickets = self.repos.tickets.list()?;

        let leads = match sales_scope(ctx) {
            Some(owner) => self.repos.leads.list_assigned_to(owner)?,
            None => self.repos.leads.list()?,
        };

        let counts = RecordCounts {
            active_clients: self.repos.clients.list()?.iter().filter(|c| c.is_active()).count(),
            active_projects: projects
                .iter()
                .filter(|p| p.is_active() && p.status() == ProjectStatus::InProgress)
                .count(),
            open_tickets: tickets
                .iter()
                .filter(|t| !t.status().is_finished())
                .count(),
            sla_breached_tickets: tickets.iter().filter(|t| t.is_sla_breached(now)).count(),
        };

        Ok(Dashboard {
            financial: reports::financial_summary(&invoices, today),
            average_project_completion: reports::average_project_completion(&projects, &tasks),
            pipeline: reports::pipeline_summary(&leads),
            counts,
        })
    }

    /// Paid invoice revenue per creation month, for invoices created in `[start, end]`.
    pub fn monthly_revenue(
        &self,
        ctx: &RequestContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<Vec<MonthlyRevenue>> {
        ctx.require(&REPORTS_READ)?;
        ensure_range(start, end)?;
        let invoices = self.repos.invoices.list()?;
        Ok(reports::monthly_revenue(&invoices, start, end))
    }

    /// Payment totals per method over `[start, end]`.
    pub fn payment_methods(
        &self,
        ctx: &RequestContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<Vec<PaymentMethodTotal>> {
        ctx.require(&REPORTS_READ)?;
        ensure_range(start, end)?;
        let invoices = self.repos.invoices.list()?;
        Ok(reports::payment_methods(&invoices, start, end))
    }
}

fn ensure_range(start: NaiveDate, end: NaiveDate) -> Result<(), DomainError> {
    if start > end {
        return Err(DomainError::validation("report start date must not be after end date"));
    }
    Ok(())
}
