//! # governance-identity
//!
//! Every agent that takes part in a governed interaction carries a
//! [`governance_types::GovernanceIdentity`]. This crate issues those
//! identities, negotiates compatibility between two agents and turns unmet
//! trust requirements into an interaction policy.
//!
//! - [`GovernanceIdentityService`]: tagging, compatibility checks, policy
//! - [`ContractExtension`]: adds governance metadata to agent contracts
//! - [`GovernanceEventBus`]: broadcast of tagging and verification events
//!
//! Verification results and interactions are recorded in an
//! [`InteractionHistory`]; identities live in an [`IdentityRepository`].

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod config;
mod contract;
mod error;
mod events;
mod repository;
mod service;

pub use config::{EnforcementMode, IdentityConfig};
pub use contract::{ContractExtension, ContractValidation, ExtendOptions};
pub use error::{IdentityError, IdentityResult};
pub use events::{GovernanceEvent, GovernanceEventBus};
pub use repository::{
    IdentityRepository, InMemoryIdentityRepository, InMemoryInteractionHistory,
    InteractionHistory,
};
pub use service::GovernanceIdentityService;
