use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;
use crate::permissions::*;

/// Role identifier used for RBAC.
///
/// Roles stay opaque strings; unknown roles resolve to read-only access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const MANAGER: Role = Role(Cow::Borrowed("manager"));
    pub const FINANCE: Role = Role(Cow::Borrowed("finance"));
    pub const SALES: Role = Role(Cow::Borrowed("sales"));
    pub const SUPPORT: Role = Role(Cow::Borrowed("support"));
    pub const USER: Role = Role(Cow::Borrowed("user"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Permissions granted by this role.
    ///
    /// Mirrors the route guards of the CRM: finance owns money movements,
    /// managers own projects, sales owns the pipeline, support owns tickets.
    pub fn permissions(&self) -> Vec<Permission> {
        let mut perms = read_permissions();
        match self.as_str() {
            "admin" => return vec![WILDCARD],
            "manager" => perms.extend([
                INVOICES_WRITE,
                PROJECTS_WRITE,
                TASKS_WRITE,
                CLIENTS_WRITE,
                LEADS_WRITE,
                LEADS_DELETE,
                LEADS_CONVERT,
                TICKETS_UPDATE,
            ]),
            "finance" => perms.extend([INVOICES_WRITE, INVOICES_DELETE, PAYMENTS_WRITE]),
            "sales" => perms.extend([CLIENTS_WRITE, LEADS_WRITE, LEADS_CONVERT]),
            "support" => perms.push(TICKETS_UPDATE),
            _ => {}
        }
        perms
    }
}

/// Granted to every authenticated role.
fn read_permissions() -> Vec<Permission> {
    vec![
        INVOICES_READ,
        PAYMENTS_READ,
        PROJECTS_READ,
        TASKS_READ,
        TASKS_UPDATE,
        CLIENTS_READ,
        LEADS_READ,
        TICKETS_READ,
        TICKETS_WRITE,
        REPORTS_READ,
    ]
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
