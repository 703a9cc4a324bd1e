//! Service level targets per ticket priority.

use chrono::{DateTime, Duration, Utc};

use orbit_core::Priority;

/// Hours until a ticket of `priority` breaches its SLA.
pub fn sla_hours(priority: Priority) -> i64 {
    match priority {
        Priority::Critical => 4,
        Priority::High => 24,
        Priority::Medium => 48,
        Priority::Low => 72,
    }
}

pub fn sla_due_at(priority: Priority, opened_at: DateTime<Utc>) -> DateTime<Utc> {
    opened_at + Duration::hours(sla_hours(priority))
}
