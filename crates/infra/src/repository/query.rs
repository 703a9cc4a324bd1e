//! List queries: filters and page-based pagination.

use serde::{Deserialize, Serialize};

use orbit_core::{ClientId, DomainError, ProjectId};
use orbit_invoicing::{Invoice, InvoiceStatus};

use super::Stored;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Validated pagination parameters (`page` is 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Result<Self, DomainError> {
        Self::bounded(page, page_size, MAX_PAGE_SIZE)
    }

    /// Like [`PageRequest::new`] with a configured upper bound for `page_size`.
    pub fn bounded(page: u32, page_size: u32, max_page_size: u32) -> Result<Self, DomainError> {
        if page == 0 {
            return Err(DomainError::validation("page must be >= 1"));
        }
        if page_size == 0 || page_size > max_page_size {
            return Err(DomainError::validation(format!(
                "page_size must be between 1 and {max_page_size}"
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

/// One page of results plus totals across all pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    /// `ceil(total / page_size)`.
    pub pages: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

/// Sort newest first and cut out the requested page.
///
/// Ties on creation time are broken by id (v7 ids are time-ordered).
pub fn paginate<A: Stored>(mut records: Vec<A>, request: PageRequest) -> Page<A> {
    records.sort_by(|a, b| {
        b.sort_key()
            .cmp(&a.sort_key())
            .then_with(|| b.id().cmp(a.id()))
    });

    let total = records.len();
    let page_size = request.page_size as usize;
    let items = records
        .into_iter()
        .skip(request.offset())
        .take(page_size)
        .collect();

    Page {
        items,
        total,
        page: request.page,
        page_size: request.page_size,
        pages: total.div_ceil(page_size),
    }
}

/// Invoice list filters; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<ClientId>,
    pub project_id: Option<ProjectId>,
    /// Case-insensitive substring of the invoice number.
    pub search: Option<String>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        if self.status.is_some_and(|s| s != invoice.status()) {
            return false;
        }
        if self.client_id.is_some_and(|c| Some(c) != invoice.client_id()) {
            return false;
        }
        if self.project_id.is_some_and(|p| Some(p) != invoice.project_id()) {
            return false;
        }
        match &self.search {
            Some(term) => invoice
                .invoice_number()
                .to_lowercase()
                .contains(&term.to_lowercase()),
            None => true,
        }
    }
}
