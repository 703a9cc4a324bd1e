//! Application services: permission checks, cross-aggregate rules and
//! cache invalidation around the domain aggregates.

pub mod clients;
pub mod invoices;
pub mod leads;
pub mod logins;
pub mod projects;
pub mod reports;
pub mod tasks;
pub mod tickets;

pub use clients::{ClientDraft, ClientService};
pub use invoices::{InvoiceDraft, InvoiceService, PaymentInput, SentInvoice};
pub use leads::{Conversion, LeadDraft, LeadService};
pub use logins::LoginGuard;
pub use projects::{ProjectDraft, ProjectService, ProjectStats};
pub use reports::{Dashboard, RecordCounts, ReportService};
pub use tasks::{TaskDraft, TaskService};
pub use tickets::{TicketDraft, TicketService};
