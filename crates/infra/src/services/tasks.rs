//! Task operations.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orbit_auth::permissions::{TASKS_READ, TASKS_UPDATE, TASKS_WRITE};
use orbit_core::{DomainError, Priority, ProjectId, SoftDelete, TaskId, UserId};
use orbit_projects::{
    CreateTask, DeleteTask, Task, TaskChanges, TaskCommand, TaskStatus, UpdateTask,
};

use crate::cache::CacheNamespace;
use crate::clock::Clock;
use crate::command_dispatcher::CommandDispatcher;
use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{ProjectRepository, TaskRepository};
use crate::state::AppState;

/// Task changes move project progress, so projects and reports go stale too.
const AFFECTED: &[CacheNamespace] = &[
    CacheNamespace::Tasks,
    CacheNamespace::Projects,
    CacheNamespace::Reports,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub assigned_to: Option<UserId>,
    pub estimated_hours: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: Priority::default(),
            assigned_to: None,
            estimated_hours: None,
            due_date: None,
        }
    }
}

#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    projects: Arc<dyn ProjectRepository>,
    clock: Arc<dyn Clock>,
    dispatcher: CommandDispatcher,
}

impl TaskService {
    pub fn new(state: &AppState) -> Self {
        Self {
            tasks: state.repos.tasks.clone(),
            projects: state.repos.projects.clone(),
            clock: state.clock.clone(),
            dispatcher: state.dispatcher(),
        }
    }

    #[tracing::instrument(skip_all, fields(project_id = %draft.project_id))]
    pub fn create(&self, ctx: &RequestContext, draft: TaskDraft) -> ServiceResult<Task> {
        ctx.require(&TASKS_WRITE)?;
        let project_live = self
            .projects
            .get(&draft.project_id)?
            .is_some_and(|p| p.is_active());
        if !project_live {
            return Err(DomainError::not_found("project").into());
        }

        let task_id = TaskId::new();
        let cmd = TaskCommand::CreateTask(CreateTask {
            task_id,
            project_id: draft.project_id,
            title: draft.title,
            description: draft.description,
            status: draft.status,
            priority: draft.priority,
            assigned_to: draft.assigned_to,
            estimated_hours: draft.estimated_hours,
            due_date: draft.due_date,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self
            .dispatcher
            .create(&*self.tasks, Task::empty(task_id), cmd, AFFECTED)?
            .aggregate)
    }

    pub fn get(&self, ctx: &RequestContext, id: TaskId) -> ServiceResult<Task> {
        ctx.require(&TASKS_READ)?;
        self.tasks
            .get(&id)?
            .filter(|t| t.is_active())
            .ok_or_else(|| ServiceError::from(DomainError::not_found("task")))
    }

    /// Active tasks of a project.
    pub fn list_for_project(&self, ctx: &RequestContext, project_id: ProjectId) -> ServiceResult<Vec<Task>> {
        ctx.require(&TASKS_READ)?;
        let mut tasks: Vec<Task> = self
            .tasks
            .list_for_project(project_id)?
            .into_iter()
            .filter(|t| t.is_active())
            .collect();
        tasks.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
        Ok(tasks)
    }

    /// Any authenticated user may update a task (status, hours, ...).
    #[tracing::instrument(skip_all, fields(task_id = %id))]
    pub fn update(&self, ctx: &RequestContext, id: TaskId, changes: TaskChanges) -> ServiceResult<Task> {
        ctx.require(&TASKS_UPDATE)?;
        let cmd = TaskCommand::UpdateTask(UpdateTask {
            changes,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        let task = self.dispatcher.update(&*self.tasks, &id, cmd, AFFECTED)?.aggregate;
        if task.is_completed() {
            tracing::info!(task_id = %id, "task completed");
        }
        Ok(task)
    }

    /// Soft delete.
    #[tracing::instrument(skip_all, fields(task_id = %id))]
    pub fn delete(&self, ctx: &RequestContext, id: TaskId) -> ServiceResult<Task> {
        ctx.require(&TASKS_WRITE)?;
        let cmd = TaskCommand::DeleteTask(DeleteTask {
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.tasks, &id, cmd, AFFECTED)?.aggregate)
    }
}
