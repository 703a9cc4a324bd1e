//! Project operations and progress reads.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orbit_auth::permissions::{PROJECTS_READ, PROJECTS_WRITE};
use orbit_core::{ClientId, DomainError, Money, Priority, ProjectId, SoftDelete};
use orbit_projects::{
    BudgetStats, CreateProject, DeleteProject, Project, ProjectChanges, ProjectCommand,
    ProjectProgress, ProjectStatus, UpdateProject, progress,
};

use crate::cache::CacheNamespace;
use crate::clock::Clock;
use crate::command_dispatcher::CommandDispatcher;
use crate::config::PaginationSettings;
use crate::context::RequestContext;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{
    ClientRepository, Page, PageRequest, ProjectRepository, TaskRepository, paginate,
};
use crate::state::AppState;

const AFFECTED: &[CacheNamespace] = &[CacheNamespace::Projects, CacheNamespace::Reports];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub client_id: ClientId,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Money>,
}

/// Progress and budget figures for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub progress: ProjectProgress,
    pub budget: BudgetStats,
}

#[derive(Clone)]
pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    tasks: Arc<dyn TaskRepository>,
    clients: Arc<dyn ClientRepository>,
    clock: Arc<dyn Clock>,
    dispatcher: CommandDispatcher,
    pagination: PaginationSettings,
}

impl ProjectService {
    pub fn new(state: &AppState) -> Self {
        Self {
            projects: state.repos.projects.clone(),
            tasks: state.repos.tasks.clone(),
            clients: state.repos.clients.clone(),
            clock: state.clock.clone(),
            dispatcher: state.dispatcher(),
            pagination: state.settings.pagination.clone(),
        }
    }

    #[tracing::instrument(skip_all, fields(client_id = %draft.client_id))]
    pub fn create(&self, ctx: &RequestContext, draft: ProjectDraft) -> ServiceResult<Project> {
        ctx.require(&PROJECTS_WRITE)?;
        if self.clients.get_active(&draft.client_id)?.is_none() {
            return Err(DomainError::not_found("client").into());
        }

        let project_id = ProjectId::new();
        let cmd = ProjectCommand::CreateProject(CreateProject {
            project_id,
            client_id: draft.client_id,
            name: draft.name,
            description: draft.description,
            priority: draft.priority,
            start_date: draft.start_date,
            end_date: draft.end_date,
            budget: draft.budget,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        let project = self
            .dispatcher
            .create(&*self.projects, Project::empty(project_id), cmd, AFFECTED)?
            .aggregate;
        tracing::info!(project_id = %project_id, "project created");
        Ok(project)
    }

    pub fn get(&self, ctx: &RequestContext, id: ProjectId) -> ServiceResult<Project> {
        ctx.require(&PROJECTS_READ)?;
        self.load_active(id)
    }

    /// Active projects, newest first, optionally narrowed by status or client.
    pub fn list(
        &self,
        ctx: &RequestContext,
        status: Option<ProjectStatus>,
        client_id: Option<ClientId>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ServiceResult<Page<Project>> {
        ctx.require(&PROJECTS_READ)?;
        let request = PageRequest::bounded(
            page.unwrap_or(1),
            page_size.unwrap_or(self.pagination.default_page_size),
            self.pagination.max_page_size,
        )?;

        let matching = self
            .projects
            .list()?
            .into_iter()
            .filter(|p| p.is_active())
            .filter(|p| status.is_none_or(|s| s == p.status()))
            .filter(|p| client_id.is_none_or(|c| Some(c) == p.client_id()))
            .collect();
        Ok(paginate(matching, request))
    }

    #[tracing::instrument(skip_all, fields(project_id = %id))]
    pub fn update(&self, ctx: &RequestContext, id: ProjectId, changes: ProjectChanges) -> ServiceResult<Project> {
        ctx.require(&PROJECTS_WRITE)?;
        let cmd = ProjectCommand::UpdateProject(UpdateProject {
            changes,
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.projects, &id, cmd, AFFECTED)?.aggregate)
    }

    /// Soft delete.
    #[tracing::instrument(skip_all, fields(project_id = %id))]
    pub fn delete(&self, ctx: &RequestContext, id: ProjectId) -> ServiceResult<Project> {
        ctx.require(&PROJECTS_WRITE)?;
        let cmd = ProjectCommand::DeleteProject(DeleteProject {
            actor: ctx.actor().clone(),
            occurred_at: self.clock.now(),
        });
        Ok(self.dispatcher.update(&*self.projects, &id, cmd, AFFECTED)?.aggregate)
    }

    /// Completion over the project's active tasks.
    pub fn progress(&self, ctx: &RequestContext, id: ProjectId) -> ServiceResult<ProjectProgress> {
        ctx.require(&PROJECTS_READ)?;
        self.load_active(id)?;
        let tasks = self.tasks.list_for_project(id)?;
        Ok(progress(&tasks))
    }

    pub fn stats(&self, ctx: &RequestContext, id: ProjectId) -> ServiceResult<ProjectStats> {
        ctx.require(&PROJECTS_READ)?;
        let project = self.load_active(id)?;
        let tasks = self.tasks.list_for_project(id)?;
        Ok(ProjectStats {
            progress: progress(&tasks),
            budget: project.budget_stats(),
        })
    }

    fn load_active(&self, id: ProjectId) -> ServiceResult<Project> {
        self.projects
            .get(&id)?
            .filter(|p| p.is_active())
            .ok_or_else(|| ServiceError::from(DomainError::not_found("project")))
    }
}
