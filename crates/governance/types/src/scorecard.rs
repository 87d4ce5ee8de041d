//! Trust scorecards: immutable, signed point-in-time snapshots of an
//! agent's trust score and compliance metrics.

use crate::agent::AgentId;
use crate::identity::GovernanceIdentity;
use crate::metrics::ViolationEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scorecard schema version written into every scorecard.
pub const SCORECARD_SCHEMA_VERSION: &str = "1.0";

/// Default signature algorithm label.
pub const DEFAULT_SIGNATURE_ALGORITHM: &str = "ed25519";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionCompliance {
    pub percentage: f64,
    pub total: u64,
    pub compliant: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeliefTraceIntegrity {
    pub percentage: f64,
    pub total: u64,
    pub verified: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationHistory {
    pub count: u64,
    pub categories: BTreeMap<String, u64>,
    pub recent: Vec<ViolationEntry>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    #[default]
    None,
    Caution,
    Warning,
    Severe,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningState {
    pub has_warning: bool,
    pub level: WarningLevel,
    #[serde(default)]
    pub message: Option<String>,
}

impl WarningState {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn raised(level: WarningLevel, message: impl Into<String>) -> Self {
        Self {
            has_warning: level != WarningLevel::None,
            level,
            message: Some(message.into()),
        }
    }
}

/// Signature block. Empty until the record has been signed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CryptographicProof {
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub public_key_id: Option<String>,
    /// Only scorecards carry a merkle root; lineage records leave it empty.
    #[serde(default)]
    pub merkle_root: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub algorithm: String,
}

impl CryptographicProof {
    pub fn unsigned() -> Self {
        Self {
            signature: None,
            public_key_id: None,
            merkle_root: None,
            timestamp: None,
            algorithm: DEFAULT_SIGNATURE_ALGORITHM.to_string(),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some() && self.public_key_id.is_some()
    }
}

impl Default for CryptographicProof {
    fn default() -> Self {
        Self::unsigned()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub schema_version: String,
    pub agent_id: AgentId,
    pub scorecard_id: String,
    pub timestamp: DateTime<Utc>,
    pub governance_identity: GovernanceIdentity,
    /// `None` when the agent has never been measured
    pub trust_score: Option<f64>,
    pub reflection_compliance: ReflectionCompliance,
    pub belief_trace_integrity: BeliefTraceIntegrity,
    pub violation_history: ViolationHistory,
    pub warning_state: WarningState,
    pub cryptographic_proof: CryptographicProof,
}

impl Scorecard {
    pub fn is_signed(&self) -> bool {
        self.cryptographic_proof.is_signed()
    }
}
