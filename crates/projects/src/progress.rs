//! Project progress aggregator.

use serde::{Deserialize, Serialize};

use orbit_core::SoftDelete;

use crate::Task;

/// Completion summary over a project's active tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProgress {
    /// Active (non-deleted) tasks.
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// `floor(completed * 100 / total)`, 0 when there are no active tasks.
    pub progress: u8,
}

/// Compute progress from a project's tasks. Soft-deleted tasks are ignored.
pub fn progress<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> ProjectProgress {
    let (total, completed) = tasks
        .into_iter()
        .filter(|t| t.is_active())
        .fold((0usize, 0usize), |(total, completed), t| {
            (total + 1, completed + usize::from(t.is_completed()))
        });

    let percent = if total == 0 { 0 } else { completed * 100 / total };

    ProjectProgress {
        total_tasks: total,
        completed_tasks: completed,
        // completed <= total, so percent <= 100
        progress: u8::try_from(percent).unwrap_or(100),
    }
}
