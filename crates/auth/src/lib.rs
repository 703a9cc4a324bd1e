//! `orbit-auth`: pure authorization boundary for CRM operations.
//!
//! Authentication (password hashing, JWT issuance) happens upstream; this
//! crate receives a trusted principal, resolves its roles into a capability
//! set and checks permissions. It also carries the in-process login attempt
//! throttle.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod throttle;

pub use authorize::{AuthzError, Capabilities, authorize};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
pub use throttle::{LoginThrottle, ThrottlePolicy};
