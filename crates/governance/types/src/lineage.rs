//! Trust lineage: signed, directed delegation edges between agents.

use crate::agent::AgentId;
use crate::identity::GovernanceFramework;
use crate::scorecard::CryptographicProof;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lineage schema version written into every record.
pub const LINEAGE_SCHEMA_VERSION: &str = "1.0";

/// One endpoint of a delegation edge, captured at delegation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineageParty {
    pub id: AgentId,
    pub governance_framework: GovernanceFramework,
    #[serde(default)]
    pub trust_score: Option<f64>,
    /// Scorecard the delegation was based on
    #[serde(default)]
    pub scorecard_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustContext {
    pub domain: String,
    pub scope: Vec<String>,
}

impl TrustContext {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            scope: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope.push(scope.into());
        self
    }
}

impl Default for TrustContext {
    fn default() -> Self {
        Self::new("general")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustMetrics {
    pub delegation_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustLineageRecord {
    pub schema_version: String,
    pub lineage_id: String,
    pub source_agent: LineageParty,
    pub target_agent: LineageParty,
    pub timestamp: DateTime<Utc>,
    pub trust_context: TrustContext,
    pub trust_metrics: TrustMetrics,
    pub cryptographic_proof: CryptographicProof,
}

impl TrustLineageRecord {
    pub fn is_signed(&self) -> bool {
        self.cryptographic_proof.is_signed()
    }

    pub fn connects(&self, source: &AgentId, target: &AgentId) -> bool {
        self.source_agent.id == *source && self.target_agent.id == *target
    }
}
