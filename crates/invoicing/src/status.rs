use core::str::FromStr;

use serde::{Deserialize, Serialize};

use orbit_core::DomainError;

/// Invoice status lifecycle.
///
/// - `draft -> approved -> sent` (`draft -> sent` skips approval)
/// - `sent -> overdue` once the due date has passed
/// - any non-terminal status `-> paid` when payments cover the total
/// - any non-terminal status `-> cancelled`
///
/// `paid` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Approved,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 6] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Approved,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Payment settlement (`-> paid`) is allowed from any non-terminal status
    /// because a payment may be recorded before the invoice is sent.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        match (self, next) {
            (Draft, Approved) | (Draft, Sent) | (Approved, Sent) => true,
            (Sent, Overdue) => true,
            (from, Paid) => !from.is_terminal(),
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Only drafts and cancelled invoices may be hard-deleted.
    pub fn is_deletable(self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Cancelled)
    }

    /// Statuses that still count towards the receivables balance.
    pub fn is_outstanding(self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown invoice status '{s}'")))
    }
}
