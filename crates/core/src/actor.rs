use serde::{Deserialize, Serialize};

use crate::UserId;

/// The authenticated user performing a mutating operation.
///
/// The core trusts this value; authentication happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
}

impl Actor {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
