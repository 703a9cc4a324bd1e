use serde::{Deserialize, Serialize};

use orbit_core::{Actor, UserId};

use crate::{Capabilities, Role};

/// An authenticated user as handed over by the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub full_name: String,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(user_id: UserId, full_name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            full_name: full_name.into(),
            roles,
        }
    }

    /// Identity recorded in audit entries.
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.full_name.clone())
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_roles(&self.roles)
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{PAYMENTS_WRITE, TICKETS_UPDATE};

    #[test]
    fn actor_and_capabilities_follow_the_principal() {
        let p = Principal::new(UserId::new(), "Fin Ance", vec![Role::FINANCE]);
        assert_eq!(p.actor().name, "Fin Ance");
        assert_eq!(p.actor().id, p.user_id);
        assert!(p.capabilities().allows(&PAYMENTS_WRITE));
        assert!(!p.capabilities().allows(&TICKETS_UPDATE));
        assert!(p.has_role(&Role::FINANCE));
    }
}
