use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orbit_core::audit;
use orbit_core::{
    Actor, Aggregate, AggregateRoot, DomainError, DomainEvent, Metadata, Priority, ProjectId,
    SoftDelete, TaskId, UserId,
};

const MAX_TITLE_LEN: usize = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    project_id: Option<ProjectId>,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: Priority,
    assigned_to: Option<UserId>,
    created_by: Option<UserId>,
    estimated_hours: Option<Decimal>,
    actual_hours: Decimal,
    due_date: Option<NaiveDate>,
    completed_at: Option<DateTime<Utc>>,
    metadata: Metadata,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Task {
    pub fn empty(id: TaskId) -> Self {
        Self {
            id,
            project_id: None,
            title: String::new(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            assigned_to: None,
            created_by: None,
            estimated_hours: None,
            actual_hours: Decimal::ZERO,
            due_date: None,
            completed_at: None,
            metadata: Metadata::new(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn estimated_hours(&self) -> Option<Decimal> {
        self.estimated_hours
    }

    pub fn actual_hours(&self) -> Decimal {
        self.actual_hours
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
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

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Created and not soft-deleted.
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted_at.is_some() {
            return Err(DomainError::not_found("task"));
        }
        Ok(())
    }
}

impl AggregateRoot for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl SoftDelete for Task {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTask {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Option<UserId>,
    pub estimated_hours: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<UserId>,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}

impl TaskChanges {
    pub fn field_names(&self) -> Vec<String> {
        [
            ("title", self.title.is_some()),
            ("description", self.description.is_some()),
            ("status", self.status.is_some()),
            ("priority", self.priority.is_some()),
            ("assigned_to", self.assigned_to.is_some()),
            ("estimated_hours", self.estimated_hours.is_some()),
            ("actual_hours", self.actual_hours.is_some()),
            ("due_date", self.due_date.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then(|| name.to_string()))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTask {
    pub changes: TaskChanges,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTask {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskCommand {
    CreateTask(CreateTask),
    UpdateTask(UpdateTask),
    DeleteTask(DeleteTask),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Option<UserId>,
    pub estimated_hours: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdated {
    pub changes: TaskChanges,
    /// Set when this update completes the task for the first time.
    pub completed_at: Option<DateTime<Utc>>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDeleted {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskCreated(TaskCreated),
    TaskUpdated(TaskUpdated),
    TaskDeleted(TaskDeleted),
}

impl DomainEvent for TaskEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::TaskCreated(_) => "projects.task.created",
            TaskEvent::TaskUpdated(_) => "projects.task.updated",
            TaskEvent::TaskDeleted(_) => "projects.task.deleted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TaskEvent::TaskCreated(e) => e.occurred_at,
            TaskEvent::TaskUpdated(e) => e.occurred_at,
            TaskEvent::TaskDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Task {
    type Command = TaskCommand;
    type Event = TaskEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TaskEvent::TaskCreated(e) => {
                self.id = e.task_id;
                self.project_id = Some(e.project_id);
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.status = e.status;
                self.priority = e.priority;
                self.assigned_to = e.assigned_to;
                self.created_by = Some(e.actor.id);
                self.estimated_hours = e.estimated_hours;
                self.due_date = e.due_date;
                if e.status == TaskStatus::Completed {
                    self.completed_at = Some(e.occurred_at);
                }
                self.created_at = Some(e.occurred_at);
                self.created = true;
                self.metadata = audit::record(&self.metadata, "created", &e.actor, e.occurred_at, None);
            }
            TaskEvent::TaskUpdated(e) => {
                let c = &e.changes;
                if let Some(title) = &c.title {
                    self.title = title.clone();
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
                if let Some(assignee) = c.assigned_to {
                    self.assigned_to = Some(assignee);
                }
                if let Some(hours) = c.estimated_hours {
                    self.estimated_hours = Some(hours);
                }
                if let Some(hours) = c.actual_hours {
                    self.actual_hours = hours;
                }
                if let Some(due) = c.due_date {
                    self.due_date = Some(due);
                }
                if e.completed_at.is_some() {
                    self.completed_at = e.completed_at;
                }
                self.metadata = audit::record(
                    &self.metadata,
                    "updated",
                    &e.actor,
                    e.occurred_at,
                    Some(c.field_names()),
                );
            }
            TaskEvent::TaskDeleted(e) => {
                self.deleted_at = Some(e.occurred_at);
                self.metadata = audit::record(&self.metadata, "deleted", &e.actor, e.occurred_at, None);
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TaskCommand::CreateTask(cmd) => self.handle_create(cmd),
            TaskCommand::UpdateTask(cmd) => self.handle_update(cmd),
            TaskCommand::DeleteTask(cmd) => self.handle_delete(cmd),
        }
    }
}

fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("task title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::validation("task title is too long"));
    }
    Ok(())
}

fn validate_hours(field: &str, hours: Option<Decimal>) -> Result<(), DomainError> {
    match hours {
        Some(h) if h < Decimal::ZERO => Err(DomainError::validation(format!("{field} must not be negative"))),
        _ => Ok(()),
    }
}

impl Task {
    fn handle_create(&self, cmd: &CreateTask) -> Result<Vec<TaskEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("task already exists"));
        }
        validate_title(&cmd.title)?;
        validate_hours("estimated_hours", cmd.estimated_hours)?;

        Ok(vec![TaskEvent::TaskCreated(TaskCreated {
            task_id: cmd.task_id,
            project_id: cmd.project_id,
            title: cmd.title.clone(),
            description: cmd.description.clone(),
            status: cmd.status,
            priority: cmd.priority,
            assigned_to: cmd.assigned_to,
            estimated_hours: cmd.estimated_hours,
            due_date: cmd.due_date,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateTask) -> Result<Vec<TaskEvent>, DomainError> {
        self.ensure_live()?;
        let c = &cmd.changes;
        if c.field_names().is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }
        if let Some(title) = &c.title {
            validate_title(title)?;
        }
        validate_hours("estimated_hours", c.estimated_hours)?;
        validate_hours("actual_hours", c.actual_hours)?;

        let completes = c.status == Some(TaskStatus::Completed) && self.completed_at.is_none();

        Ok(vec![TaskEvent::TaskUpdated(TaskUpdated {
            changes: c.clone(),
            completed_at: completes.then_some(cmd.occurred_at),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteTask) -> Result<Vec<TaskEvent>, DomainError> {
        self.ensure_live()?;
        Ok(vec![TaskEvent::TaskDeleted(TaskDeleted {
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// Test fixtures shared with the progress tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn actor() -> Actor {
        Actor::new(UserId::new(), "Pat Manager")
    }

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
    }

    pub fn create_cmd(project_id: ProjectId, status: TaskStatus) -> CreateTask {
        CreateTask {
            task_id: TaskId::new(),
            project_id,
            title: "Wire up billing export".to_string(),
            description: None,
            status,
            priority: Priority::High,
            assigned_to: None,
            estimated_hours: None,
            due_date: None,
            actor: actor(),
            occurred_at: t0(),
        }
    }

    pub fn task(project_id: ProjectId, status: TaskStatus) -> Task {
        let cmd = create_cmd(project_id, status);
        let mut task = Task::empty(cmd.task_id);
        task.execute(&TaskCommand::CreateTask(cmd)).unwrap();
        task
    }

    pub fn deleted(mut task: Task) -> Task {
        task.execute(&TaskCommand::DeleteTask(DeleteTask { actor: actor(), occurred_at: t0() }))
            .unwrap();
        task
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn update(changes: TaskChanges, at: DateTime<Utc>) -> TaskCommand {
        TaskCommand::UpdateTask(UpdateTask { changes, actor: actor(), occurred_at: at })
    }

    #[test]
    fn create_records_audit_entry() {
        let task = task(ProjectId::new(), TaskStatus::Todo);
        assert_eq!(task.status(), TaskStatus::Todo);
        assert_eq!(task.completed_at(), None);
        let log = task.metadata().audit_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "created");
    }

    #[test]
    fn create_rejects_blank_title_and_negative_hours() {
        let mut cmd = create_cmd(ProjectId::new(), TaskStatus::Todo);
        cmd.title = "   ".to_string();
        let t = Task::empty(cmd.task_id);
        assert!(matches!(t.handle(&TaskCommand::CreateTask(cmd)), Err(DomainError::Validation(_))));

        let mut cmd = create_cmd(ProjectId::new(), TaskStatus::Todo);
        cmd.estimated_hours = Some(dec!(-1));
        assert!(matches!(t.handle(&TaskCommand::CreateTask(cmd)), Err(DomainError::Validation(_))));
    }

    #[test]
    fn completed_at_is_set_on_first_completion_only() {
        let mut task = task(ProjectId::new(), TaskStatus::InProgress);
        let first = t0() + Duration::hours(1);

        task.execute(&update(TaskChanges { status: Some(TaskStatus::Completed), ..Default::default() }, first))
            .unwrap();
        assert_eq!(task.completed_at(), Some(first));

        task.execute(&update(TaskChanges { status: Some(TaskStatus::Review), ..Default::default() }, first + Duration::hours(1)))
            .unwrap();
        task.execute(&update(TaskChanges { status: Some(TaskStatus::Completed), ..Default::default() }, first + Duration::hours(2)))
            .unwrap();
        assert_eq!(task.completed_at(), Some(first));
    }

    #[test]
    fn update_audit_lists_changed_fields() {
        let mut task = task(ProjectId::new(), TaskStatus::Todo);
        task.execute(&update(
            TaskChanges {
                status: Some(TaskStatus::InProgress),
                actual_hours: Some(dec!(2.5)),
                ..Default::default()
            },
            t0(),
        ))
        .unwrap();

        assert_eq!(task.actual_hours(), dec!(2.5));
        let last = task.metadata().audit_log().pop().unwrap();
        assert_eq!(last.action, "updated");
        assert_eq!(last.changes, Some(vec!["status".to_string(), "actual_hours".to_string()]));
    }

    #[test]
    fn soft_deleted_task_is_not_found() {
        let task = deleted(task(ProjectId::new(), TaskStatus::Todo));
        assert!(!task.is_active());
        assert_eq!(task.metadata().audit_log().pop().unwrap().action, "deleted");

        let err = task
            .handle(&update(TaskChanges { title: Some("again".into()), ..Default::default() }, t0()))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("task"));
        let err = task
            .handle(&TaskCommand::DeleteTask(DeleteTask { actor: actor(), occurred_at: t0() }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("task"));
    }

    #[test]
    fn empty_update_is_rejected() {
        let task = task(ProjectId::new(), TaskStatus::Todo);
        assert!(matches!(
            task.handle(&update(TaskChanges::default(), t0())),
            Err(DomainError::Validation(_))
        ));
    }
}
