//! # governance-types
//!
//! Domain model shared by every governance crate:
//!
//! - [`GovernanceIdentity`]: the per-agent governance tag that gates interactions
//! - [`AgentContract`] / [`InteroperabilityProtocol`]: declared contract metadata
//! - [`Scorecard`]: point-in-time signed trust snapshot
//! - [`TrustLineageRecord`]: signed delegation edge between two agents
//! - [`InteractionRecord`]: append-only interaction history entry
//! - [`schema`]: versioned JSON schemas enforced before anything is persisted
//!
//! Nothing in this crate performs I/O or cryptography.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod agent;
pub mod contract;
pub mod error;
pub mod identity;
pub mod interaction;
pub mod lineage;
pub mod metrics;
pub mod policy;
pub mod schema;
pub mod scorecard;

pub use agent::{AgentDescriptor, AgentId, AgentOrigin, DeclaredCapabilities};
pub use contract::{
    AgentContract, DecayStrategy, InteroperabilityProtocol, TrustDecayPolicy,
    TrustVerificationMethod, PROTOCOL_VERSION,
};
pub use error::{SchemaError, SchemaResult};
pub use identity::{
    ComplianceLevel, ConfidenceModifiers, FallbackStrategy, GovernanceFramework,
    GovernanceIdentity, GovernanceProof, MemoryIntegrity, MemoryIntegrityKind, TrustRequirements,
};
pub use interaction::{InteractionKind, InteractionRecord, TimeWindow};
pub use lineage::{
    LineageParty, TrustContext, TrustLineageRecord, TrustMetrics, LINEAGE_SCHEMA_VERSION,
};
pub use metrics::{
    BeliefTraceMetrics, PrismMetrics, ReflectionMetrics, ViolationEntry, ViolationSeverity,
    VigilMetrics,
};
pub use policy::{
    CompatibilityResult, ConfidenceAdjustment, InteractionPolicy, PolicyAction, Restriction,
    UnmetRequirement,
};
pub use scorecard::{
    BeliefTraceIntegrity, CryptographicProof, ReflectionCompliance, Scorecard, ViolationHistory,
    WarningLevel, WarningState, DEFAULT_SIGNATURE_ALGORITHM, SCORECARD_SCHEMA_VERSION,
};
