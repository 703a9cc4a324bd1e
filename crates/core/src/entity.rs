//! Soft deletion.

use chrono::{DateTime, Utc};

/// Records that are tombstoned with a `deleted_at` timestamp instead of being
/// physically removed.
///
/// Queries filter with [`SoftDelete::is_active`]; the tombstone keeps audit
/// trails and aggregate views (project progress) consistent.
pub trait SoftDelete {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn is_active(&self) -> bool {
        self.deleted_at().is_none()
    }
}
