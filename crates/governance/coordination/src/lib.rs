//! # governance-coordination
//!
//! Multi-agent coordination under governance. A [`CoordinationManager`]
//! owns coordination contexts; each context carries validated roles,
//! governed membership, role-gated task allocation and an ordered message
//! log. The metrics views compare how governed and non-governed agents
//! perform side by side.
//!
//! Roles, membership, allocation and delivery sit behind the
//! [`RoleManager`], [`AgentRegistry`], [`TaskAllocator`] and
//! [`MessageBus`] ports so hosts can supply their own.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod config;
mod error;
mod manager;
pub mod metrics;
mod model;
pub mod ports;

pub use config::CoordinationConfig;
pub use error::{CoordinationError, CoordinationResult};
pub use manager::CoordinationManager;
pub use metrics::{
    AgentPerformance, CohortPerformance, CoordinationMetrics, GovernanceContrast, MessageTraffic,
    TrustBoundaries, TrustLevel,
};
pub use model::{
    Assignment, ContextConfig, CoordinationContext, CoordinationMessage, MessageKind, Permission,
    RegisteredAgent, Role, RoleDefinition, TaskAllocation, TaskRequest, TaskStatus,
};
pub use ports::{
    AgentRegistry, CandidatePool, InMemoryAgentRegistry, InMemoryMessageBus, InMemoryRoleManager,
    InMemoryTaskAllocator, MessageBus, RoleManager, TaskAllocator,
};
