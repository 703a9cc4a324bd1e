//! Support module: tickets, comments and SLA due dates.

pub mod numbering;
pub mod sla;
pub mod ticket;

pub use numbering::{RandomTicketNumbers, TicketNumberGenerator};
pub use sla::{sla_due_at, sla_hours};
pub use ticket::{
    AddComment, CommentAdded, OpenTicket, Ticket, TicketChanges, TicketComment, TicketCommand,
    TicketEvent, TicketOpened, TicketStatus, TicketUpdated, UpdateTicket,
};
