//! # governance-scorecard
//!
//! Trust scorecards and the records derived from them.
//!
//! - [`ScorecardManager`]: assembles, scores, signs and stores scorecards
//! - [`TrustLineageTracker`]: signed delegation edges between scored agents
//! - [`ScorecardAnalytics`]: trends, trust networks, compliance reports
//!
//! Scorecards must be signed before they are stored, and neither
//! scorecards nor lineage records are persisted unless they pass schema
//! validation.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod analytics;
mod config;
mod error;
pub mod lineage;
mod manager;
pub mod providers;
#[cfg(test)]
mod testing;

pub use analytics::{
    AgentComparison, AgentComparisonRow, ComplianceReport, NetworkEdge, NetworkNode, NodeRole,
    PolicyCompliance, RiskLevel, ScorecardAnalytics, TrendPoint, TrustNetwork, TrustScoreTrend,
};
pub use config::{AnalyticsConfig, LineageConfig, ScorecardConfig, TrustScoreWeights};
pub use error::{LineageError, LineageResult, ScorecardError, ScorecardResult};
pub use lineage::{build_delegation_chain, TrustLineageTracker};
pub use manager::ScorecardManager;
pub use providers::{PrismProvider, StaticPrismProvider, StaticVigilProvider, VigilProvider};
