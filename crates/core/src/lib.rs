//! `orbit-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every CRM module
//! (no infrastructure concerns): typed identifiers, the domain error model,
//! fixed-point money helpers, the acting user and the append-only audit log
//! stored in entity metadata.

pub mod actor;
pub mod aggregate;
pub mod audit;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod priority;

pub use actor::Actor;
pub use aggregate::{Aggregate, AggregateRoot, DomainEvent, ExpectedVersion};
pub use audit::{AuditEntry, Metadata};
pub use entity::SoftDelete;
pub use error::{DomainError, DomainResult};
pub use id::{
    ClientId, CommentId, InvoiceId, InvoiceItemId, LeadId, PaymentId, ProjectId, TaskId,
    TicketId, UserId,
};
pub use money::Money;
pub use priority::Priority;
