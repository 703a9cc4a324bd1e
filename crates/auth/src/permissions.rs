use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque `"resource.action"` strings (e.g. `"invoices.write"`).
/// The wildcard `"*"` grants everything and is held by the admin role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const WILDCARD: Permission = Permission::from_static("*");

pub const INVOICES_READ: Permission = Permission::from_static("invoices.read");
pub const INVOICES_WRITE: Permission = Permission::from_static("invoices.write");
pub const INVOICES_DELETE: Permission = Permission::from_static("invoices.delete");
pub const PAYMENTS_READ: Permission = Permission::from_static("payments.read");
pub const PAYMENTS_WRITE: Permission = Permission::from_static("payments.write");

pub const PROJECTS_READ: Permission = Permission::from_static("projects.read");
pub const PROJECTS_WRITE: Permission = Permission::from_static("projects.write");
pub const TASKS_READ: Permission = Permission::from_static("tasks.read");
/// Create and soft-delete tasks.
pub const TASKS_WRITE: Permission = Permission::from_static("tasks.write");
/// Edit task fields (status, assignee, hours).
pub const TASKS_UPDATE: Permission = Permission::from_static("tasks.update");

pub const CLIENTS_READ: Permission = Permission::from_static("clients.read");
pub const CLIENTS_WRITE: Permission = Permission::from_static("clients.write");
pub const LEADS_READ: Permission = Permission::from_static("leads.read");
pub const LEADS_WRITE: Permission = Permission::from_static("leads.write");
/// Soft-delete leads.
pub const LEADS_DELETE: Permission = Permission::from_static("leads.delete");
pub const LEADS_CONVERT: Permission = Permission::from_static("leads.convert");

pub const TICKETS_READ: Permission = Permission::from_static("tickets.read");
/// Open tickets and comment on them.
pub const TICKETS_WRITE: Permission = Permission::from_static("tickets.write");
/// Change ticket status, priority and assignee.
pub const TICKETS_UPDATE: Permission = Permission::from_static("tickets.update");

pub const REPORTS_READ: Permission = Permission::from_static("reports.read");
