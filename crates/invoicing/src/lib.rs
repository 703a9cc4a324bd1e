//! Invoicing domain module: the invoice/payment ledger.
//!
//! This crate contains the business rules for invoice lifecycle, line-item
//! totals and partial-payment application, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod invoice;
pub mod numbering;
pub mod status;

pub use invoice::{
    ApproveInvoice, CancelInvoice, CreateInvoice, Invoice, InvoiceApproved, InvoiceCancelled,
    InvoiceChanges, InvoiceCommand, InvoiceCreated, InvoiceEvent, InvoiceItem,
    InvoiceMarkedOverdue, InvoiceSent, InvoiceUpdated, MarkOverdue, NewInvoiceItem, Payment,
    PaymentRecorded, RecordPayment, SendInvoice, UpdateInvoice,
};
pub use numbering::{InvoiceNumberGenerator, RandomInvoiceNumbers, SequentialInvoiceNumbers};
pub use status::InvoiceStatus;
