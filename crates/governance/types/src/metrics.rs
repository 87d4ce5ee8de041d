//! Plain data returned by the external reflection (PRISM) and integrity
//! (VIGIL) metric providers. Providers are opaque; only these shapes matter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionMetrics {
    pub total: u64,
    pub compliant: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BeliefTraceMetrics {
    pub total: u64,
    pub verified: u64,
}

/// Reflection and belief-trace metrics (PRISM).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrismMetrics {
    #[serde(default)]
    pub reflection: ReflectionMetrics,
    #[serde(default)]
    pub belief_trace: BeliefTraceMetrics,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViolationEntry {
    pub category: String,
    pub description: String,
    pub severity: ViolationSeverity,
    pub timestamp: DateTime<Utc>,
}

/// Trust-decay and violation metrics (VIGIL).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VigilMetrics {
    /// Accumulated trust decay in [0, 1]
    #[serde(default)]
    pub trust_decay: f64,
    #[serde(default)]
    pub violations: Vec<ViolationEntry>,
}
