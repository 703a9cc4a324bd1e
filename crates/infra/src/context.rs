//! Caller context passed into every service operation.

use orbit_auth::{AuthzError, Capabilities, Permission, Principal, Role, authorize};
use orbit_core::{Actor, UserId};

/// Authenticated caller: who acts, and what they may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    actor: Actor,
    roles: Vec<Role>,
    capabilities: Capabilities,
}

impl RequestContext {
    pub fn new(principal: &Principal) -> Self {
        Self {
            actor: principal.actor(),
            roles: principal.roles.clone(),
            capabilities: principal.capabilities(),
        }
    }

    /// Explicit capability set, independent of roles.
    pub fn with_capabilities(actor: Actor, capabilities: Capabilities) -> Self {
        Self {
            actor,
            roles: Vec::new(),
            capabilities,
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn require(&self, permission: &Permission) -> Result<(), AuthzError> {
        authorize(&self.capabilities, permission)
    }
}

impl From<&Principal> for RequestContext {
    fn from(principal: &Principal) -> Self {
        Self::new(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_auth::permissions::{INVOICES_DELETE, TICKETS_WRITE};

    #[test]
    fn roles_resolve_into_capabilities() {
        let principal = Principal::new(UserId::new(), "Sam Support", vec![Role::SUPPORT]);
        let ctx = RequestContext::new(&principal);

        assert_eq!(ctx.actor().name, "Sam Support");
        assert!(ctx.has_role(&Role::SUPPORT));
        assert!(ctx.require(&TICKETS_WRITE).is_ok());
        assert_eq!(
            ctx.require(&INVOICES_DELETE),
            Err(AuthzError::Forbidden("invoices.delete".to_string()))
        );
    }

    #[test]
    fn explicit_capabilities_ignore_roles() {
        let ctx = RequestContext::with_capabilities(Actor::new(UserId::new(), "cron"), Capabilities::all());
        assert!(ctx.roles().is_empty());
        assert!(ctx.require(&INVOICES_DELETE).is_ok());
    }
}
