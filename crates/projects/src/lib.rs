//! Projects module: projects, their tasks and the progress aggregator.
//!
//! Pure domain logic. Tasks are soft-deleted; progress is always computed
//! from the active (non-deleted) task set.

pub mod progress;
pub mod project;
pub mod task;

pub use progress::{ProjectProgress, progress};
pub use project::{
    BudgetStats, CreateProject, DeleteProject, Project, ProjectChanges, ProjectCommand,
    ProjectCreated, ProjectDeleted, ProjectEvent, ProjectStatus, ProjectUpdated, UpdateProject,
};
pub use task::{
    CreateTask, DeleteTask, Task, TaskChanges, TaskCommand, TaskCreated, TaskDeleted, TaskEvent,
    TaskStatus, TaskUpdated, UpdateTask,
};
