//! Application layer for Orbit CRM: storage, configuration, command
//! dispatch and the services that front the domain crates.

pub mod cache;
pub mod clock;
pub mod command_dispatcher;
pub mod config;
pub mod context;
pub mod error;
pub mod pdf;
pub mod reports;
pub mod repository;
pub mod services;
pub mod state;


pub use context::RequestContext;
pub use error::{ServiceError, ServiceResult};
pub use state::{AppState, bootstrap};
