//! Parties domain module: clients and sales leads.
//!
//! Business rules for the client register and the lead pipeline, including
//! lead to client conversion, as deterministic domain logic (no IO, no
//! storage).

pub mod client;
pub mod lead;

pub use client::{
    Client, ClientChanges, ClientCommand, ClientDeleted, ClientEvent, ClientRegistered,
    ClientStatus, ClientUpdated, ContactInfo, DeleteClient, RegisterClient, UpdateClient,
};
pub use lead::{
    ConvertLead, CreateLead, DeleteLead, Lead, LeadChanges, LeadCommand, LeadConverted,
    LeadCreated, LeadDeleted, LeadEvent, LeadStage, LeadStatus, LeadUpdated, UpdateLead,
};
