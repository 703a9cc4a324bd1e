use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orbit_core::audit;
use orbit_core::money::{self, round_money};
use orbit_core::{
    Actor, Aggregate, AggregateRoot, ClientId, DomainError, DomainEvent, Metadata, Money,
    Priority, ProjectId, SoftDelete, UserId,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

/// Budget figures for one project. All decimal, no floats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStats {
    /// Zero when the project has no budget.
    pub budget: Money,
    pub actual_cost: Money,
    /// `None` when the project has no budget.
    pub budget_remaining: Option<Money>,
    /// `actual_cost / budget * 100`, 2 dp; zero without a positive budget.
    pub budget_utilization_percent: Decimal,
}

/// Aggregate root: Project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,
    client_id: Option<ClientId>,
    name: String,
    description: Option<String>,
    status: ProjectStatus,
    priority: Priority,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    budget: Option<Money>,
    actual_cost: Money,
    project_manager_id: Option<UserId>,
    metadata: Metadata,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Project {
    pub fn empty(id: ProjectId) -> Self {
        Self {
            id,
            client_id: None,
            name: String::new(),
            description: None,
            status: ProjectStatus::Planning,
            priority: Priority::Medium,
            start_date: None,
            end_date: None,
            budget: None,
            actual_cost: Decimal::ZERO,
            project_manager_id: None,
            metadata: Metadata::new(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    pub fn budget(&self) -> Option<Money> {
        self.budget
    }

    pub fn actual_cost(&self) -> Money {
        self.actual_cost
    }

    pub fn project_manager_id(&self) -> Option<UserId> {
        self.project_manager_id
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn budget_stats(&self) -> BudgetStats {
        let utilization = match self.budget {
            Some(budget) if budget > Decimal::ZERO => self
                .actual_cost
                .checked_div(budget)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .map(round_money)
                .unwrap_or(Decimal::ZERO),
            _ => Decimal::ZERO,
        };
        BudgetStats {
            budget: self.budget.unwrap_or(Decimal::ZERO),
            actual_cost: self.actual_cost,
            budget_remaining: self.budget.map(|b| b - self.actual_cost),
            budget_utilization_percent: utilization,
        }
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted_at.is_some() {
            return Err(DomainError::not_found("project"));
        }
        Ok(())
    }
}

impl AggregateRoot for Project {
    type Id = ProjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl SoftDelete for Project {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProject {
    pub project_id: ProjectId,
    pub client_id: ClientId,
    pub name: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Money>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Money>,
    pub actual_cost: Option<Money>,
    pub project_manager_id: Option<UserId>,
}

impl ProjectChanges {
    pub fn field_names(&self) -> Vec<String> {
        [
            ("name", self.name.is_some()),
            ("description", self.description.is_some()),
            ("status", self.status.is_some()),
            ("priority", self.priority.is_some()),
            ("start_date", self.start_date.is_some()),
            ("end_date", self.end_date.is_some()),
            ("budget", self.budget.is_some()),
            ("actual_cost", self.actual_cost.is_some()),
            ("project_manager_id", self.project_manager_id.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then(|| name.to_string()))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProject {
    pub changes: ProjectChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProject {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectCommand {
    CreateProject(CreateProject),
    UpdateProject(UpdateProject),
    DeleteProject(DeleteProject),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreated {
    pub project: CreateProject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdated {
    pub changes: ProjectChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDeleted {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectEvent {
    ProjectCreated(ProjectCreated),
    ProjectUpdated(ProjectUpdated),
    ProjectDeleted(ProjectDeleted),
}

impl DomainEvent for ProjectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProjectEvent::ProjectCreated(_) => "projects.project.created",
            ProjectEvent::ProjectUpdated(_) => "projects.project.updated",
            ProjectEvent::ProjectDeleted(_) => "projects.project.deleted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProjectEvent::ProjectCreated(e) => e.project.occurred_at,
            ProjectEvent::ProjectUpdated(e) => e.occurred_at,
            ProjectEvent::ProjectDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Project {
    type Command = ProjectCommand;
    type Event = ProjectEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProjectEvent::ProjectCreated(ProjectCreated { project: p }) => {
                self.id = p.project_id;
                self.client_id = Some(p.client_id);
                self.name = p.name.clone();
                self.description = p.description.clone();
                self.priority = p.priority;
                self.start_date = p.start_date;
                self.end_date = p.end_date;
                self.budget = p.budget;
                self.status = ProjectStatus::Planning;
                self.created_at = Some(p.occurred_at);
                self.created = true;
                self.metadata = audit::record(&self.metadata, "created", &p.actor, p.occurred_at, None);
            }
            ProjectEvent::ProjectUpdated(e) => {
                let c = &e.changes;
                if let Some(name) = &c.name {
                    self.name = name.clone();
                }
                if let Some(description) = &c.description {
                    self.description = Some(description.clone());
                }
                if let Some(status) = c.status {
                    self.status = status;
                }
                if let Some(priority) = c.priority {
                    self.priority = priority;
                }
                if c.start_date.is_some() {
                    self.start_date = c.start_date;
                }
                if c.end_date.is_some() {
                    self.end_date = c.end_date;
                }
                if c.budget.is_some() {
                    self.budget = c.budget;
                }
                if let Some(cost) = c.actual_cost {
                    self.actual_cost = cost;
                }
                if c.project_manager_id.is_some() {
                    self.project_manager_id = c.project_manager_id;
                }
                self.metadata = audit::record(
                    &self.metadata,
                    "updated",
                    &e.actor,
                    e.occurred_at,
                    Some(c.field_names()),
                );
            }
            ProjectEvent::ProjectDeleted(e) => {
                self.deleted_at = Some(e.occurred_at);
                self.metadata = audit::record(&self.metadata, "deleted", &e.actor, e.occurred_at, None);
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProjectCommand::CreateProject(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("project already exists"));
                }
                validate_name(&cmd.name)?;
                if let Some(budget) = cmd.budget {
                    money::ensure_non_negative("budget", budget)?;
                }
                validate_dates(cmd.start_date, cmd.end_date)?;
                Ok(vec![ProjectEvent::ProjectCreated(ProjectCreated { project: cmd.clone() })])
            }
            ProjectCommand::UpdateProject(cmd) => {
                self.ensure_live()?;
                let c = &cmd.changes;
                if c.field_names().is_empty() {
                    return Err(DomainError::validation("no fields to update"));
                }
                if let Some(name) = &c.name {
                    validate_name(name)?;
                }
                if let Some(budget) = c.budget {
                    money::ensure_non_negative("budget", budget)?;
                }
                if let Some(cost) = c.actual_cost {
                    money::ensure_non_negative("actual_cost", cost)?;
                }
                validate_dates(c.start_date.or(self.start_date), c.end_date.or(self.end_date))?;
                Ok(vec![ProjectEvent::ProjectUpdated(ProjectUpdated {
                    changes: c.clone(),
                    actor: cmd.actor.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ProjectCommand::DeleteProject(cmd) => {
                self.ensure_live()?;
                Ok(vec![ProjectEvent::ProjectDeleted(ProjectDeleted {
                    actor: cmd.actor.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("project name must not be empty"));
    }
    Ok(())
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), DomainError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(DomainError::validation("end_date must not be before start_date"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn actor() -> Actor {
        Actor::new(UserId::new(), "Pat Manager")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
    }

    fn project(budget: Option<Money>) -> Project {
        let cmd = CreateProject {
            project_id: ProjectId::new(),
            client_id: ClientId::new(),
            name: "Website relaunch".to_string(),
            description: None,
            priority: Priority::High,
            start_date: None,
            end_date: None,
            budget,
            actor: actor(),
            occurred_at: t0(),
        };
        let mut p = Project::empty(cmd.project_id);
        p.execute(&ProjectCommand::CreateProject(cmd)).unwrap();
        p
    }

    fn set_cost(p: &mut Project, cost: Money) {
        p.execute(&ProjectCommand::UpdateProject(UpdateProject {
            changes: ProjectChanges { actual_cost: Some(cost), ..Default::default() },
            actor: actor(),
            occurred_at: t0(),
        }))
        .unwrap();
    }

    #[test]
    fn budget_stats_use_decimal_arithmetic() {
        let mut p = project(Some(dec!(3000.00)));
        set_cost(&mut p, dec!(1000.00));

        let stats = p.budget_stats();
        assert_eq!(stats.budget_remaining, Some(dec!(2000.00)));
        assert_eq!(stats.budget_utilization_percent, dec!(33.33));
    }

    #[test]
    fn budget_stats_without_budget() {
        let mut p = project(None);
        set_cost(&mut p, dec!(50));

        let stats = p.budget_stats();
        assert_eq!(stats.budget, Decimal::ZERO);
        assert_eq!(stats.budget_remaining, None);
        assert_eq!(stats.budget_utilization_percent, Decimal::ZERO);
    }

    #[test]
    fn soft_delete_then_not_found() {
        let mut p = project(None);
        let delete = ProjectCommand::DeleteProject(DeleteProject { actor: actor(), occurred_at: t0() });
        p.execute(&delete).unwrap();

        assert!(!p.is_active());
        assert_eq!(p.handle(&delete).unwrap_err(), DomainError::NotFound("project"));
    }

    #[test]
    fn rejects_end_before_start() {
        let p = project(None);
        let err = p
            .handle(&ProjectCommand::UpdateProject(UpdateProject {
                changes: ProjectChanges {
                    start_date: NaiveDate::from_ymd_opt(2026, 7, 1),
                    end_date: NaiveDate::from_ymd_opt(2026, 6, 1),
                    ..Default::default()
                },
                actor: actor(),
                occurred_at: t0(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
