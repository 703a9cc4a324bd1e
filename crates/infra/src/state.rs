//! Wiring: the shared dependencies every service is built from.

use std::sync::Arc;

use anyhow::Context;

use orbit_auth::LoginThrottle;
use orbit_invoicing::{InvoiceNumberGenerator, RandomInvoiceNumbers};
use orbit_support::{RandomTicketNumbers, TicketNumberGenerator};

use crate::cache::{CacheInvalidator, TracingCacheInvalidator};
use crate::clock::{Clock, SystemClock};
use crate::command_dispatcher::CommandDispatcher;
use crate::config::Settings;
use crate::pdf::{PdfRenderer, PlainTextRenderer};
use crate::repository::Repositories;
use crate::services::{
    ClientService, InvoiceService, LeadService, LoginGuard, ProjectService, ReportService,
    TaskService, TicketService,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub repos: Repositories,
    pub cache: Arc<dyn CacheInvalidator>,
    pub pdf: Arc<dyn PdfRenderer>,
    pub clock: Arc<dyn Clock>,
    pub invoice_numbers: Arc<dyn InvoiceNumberGenerator>,
    pub ticket_numbers: Arc<dyn TicketNumberGenerator>,
    pub throttle: Arc<LoginThrottle>,
}

impl AppState {
    /// In-memory repositories, system clock, plain-text documents and
    /// log-only cache invalidation.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            repos: Repositories::in_memory(),
            cache: Arc::new(TracingCacheInvalidator),
            pdf: Arc::new(PlainTextRenderer),
            clock: Arc::new(SystemClock),
            invoice_numbers: Arc::new(RandomInvoiceNumbers::new(settings.invoicing.number_prefix.clone())),
            ticket_numbers: Arc::new(RandomTicketNumbers),
            throttle: Arc::new(LoginThrottle::new(settings.auth.throttle_policy())),
            settings,
        }
    }

    pub fn with_repositories(mut self, repos: Repositories) -> Self {
        self.repos = repos;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_pdf(mut self, pdf: Arc<dyn PdfRenderer>) -> Self {
        self.pdf = pdf;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_invoice_numbers(mut self, numbers: Arc<dyn InvoiceNumberGenerator>) -> Self {
        self.invoice_numbers = numbers;
        self
    }

    pub fn with_ticket_numbers(mut self, numbers: Arc<dyn TicketNumberGenerator>) -> Self {
        self.ticket_numbers = numbers;
        self
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(self.cache.clone())
    }

    pub fn invoices(&self) -> InvoiceService {
        InvoiceService::new(self)
    }

    pub fn projects(&self) -> ProjectService {
        ProjectService::new(self)
    }

    pub fn tasks(&self) -> TaskService {
        TaskService::new(self)
    }

    pub fn clients(&self) -> ClientService {
        ClientService::new(self)
    }

    pub fn leads(&self) -> LeadService {
        LeadService::new(self)
    }

    pub fn tickets(&self) -> TicketService {
        TicketService::new(self)
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(self)
    }

    pub fn logins(&self) -> LoginGuard {
        LoginGuard::new(self)
    }
}

/// Process start-up: configuration, then tracing, then in-memory state.
pub fn bootstrap() -> anyhow::Result<AppState> {
    let settings = Settings::load().context("failed to load configuration")?;
    orbit_observability::init(&settings.logging);
    tracing::info!(app = %settings.app.name, "orbit state initialised");
    Ok(AppState::in_memory(settings))
}
