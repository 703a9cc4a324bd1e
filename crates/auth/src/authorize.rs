use std::collections::HashSet;

use thiserror::Error;

use crate::{Permission, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    /// The caller holds the permission but the record belongs to someone else.
    #[error("forbidden: {0} is assigned to another user")]
    NotOwner(String),

    #[error("too many login attempts, try again later")]
    RateLimited,
}

/// Resolved permission set for one actor.
///
/// Built once per request from the actor's roles and passed into every
/// service call, so the domain stays testable without a request layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    permissions: HashSet<Permission>,
}

impl Capabilities {
    pub fn from_roles(roles: &[Role]) -> Self {
        roles.iter().flat_map(Role::permissions).collect()
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        [crate::permissions::WILDCARD].into_iter().collect()
    }

    pub fn allows(&self, required: &Permission) -> bool {
        self.permissions.iter().any(Permission::is_wildcard) || self.permissions.contains(required)
    }

    /// Sorted permission names (for logs and diagnostics).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.permissions.iter().map(|p| p.as_str().to_string()).collect();
        names.sort();
        names
    }
}

impl FromIterator<Permission> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

/// Check a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(capabilities: &Capabilities, required: &Permission) -> Result<(), AuthzError> {
    if capabilities.allows(required) {
        Ok(())
    } else {
        tracing::debug!(permission = %required, "authorization denied");
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
