//! Compatibility negotiation outcomes.
//!
//! Governance incompatibility is data, not an error: every verification
//! ends in a [`CompatibilityResult`] whose [`InteractionPolicy`] tells the
//! caller whether to proceed, restrict, or reject.

use crate::identity::ComplianceLevel;
use serde::{Deserialize, Serialize};

/// A trust requirement the target failed to meet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "requirement", rename_all = "snake_case")]
pub enum UnmetRequirement {
    MemoryIntegrity,
    Reflection,
    BeliefTrace,
    ComplianceLevel {
        required: ComplianceLevel,
        actual: ComplianceLevel,
    },
}

impl UnmetRequirement {
    /// Human-readable reason. The leading phrase names the missing
    /// capability and is matched on by callers.
    pub fn reason(&self) -> String {
        match self {
            Self::MemoryIntegrity => {
                "Memory integrity verification required but target provides none".to_string()
            }
            Self::Reflection => {
                "Reflection enforcement required but target does not enforce reflection"
                    .to_string()
            }
            Self::BeliefTrace => {
                "Belief trace required but target does not provide belief tracing".to_string()
            }
            Self::ComplianceLevel { required, actual } => format!(
                "Compliance level {} is below the required minimum {}",
                actual, required
            ),
        }
    }

    /// The interaction restriction that compensates for this gap.
    pub fn restriction(&self) -> Restriction {
        match self {
            Self::MemoryIntegrity => Restriction::NoMemoryWrite,
            Self::Reflection => Restriction::NoReflectionSharing,
            Self::BeliefTrace => Restriction::NoBeliefPropagation,
            Self::ComplianceLevel { .. } => Restriction::LimitedScope,
        }
    }
}

/// Capability-level restriction applied under `log-and-restrict`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    NoMemoryWrite,
    NoReflectionSharing,
    NoBeliefPropagation,
    LimitedScope,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Proceed,
    Restrict,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionPolicy {
    pub action: PolicyAction,
    pub restrictions: Vec<Restriction>,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl InteractionPolicy {
    pub fn proceed() -> Self {
        Self {
            action: PolicyAction::Proceed,
            restrictions: Vec::new(),
            explanation: None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.action == PolicyAction::Reject
    }

    pub fn restricts(&self, restriction: Restriction) -> bool {
        self.restrictions.contains(&restriction)
    }
}

/// Confidence penalties applied to interactions with a target.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    pub unknown_governance: f64,
    pub missing_reflection: f64,
    pub missing_belief_trace: f64,
    pub missing_memory_integrity: f64,
    /// Sum of the components, capped at 1.0
    pub total: f64,
}

impl ConfidenceAdjustment {
    pub fn none() -> Self {
        Self::default()
    }

    /// Apply the penalty to a confidence value, never going below zero.
    pub fn apply(&self, confidence: f64) -> f64 {
        (confidence - self.total).max(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub compatible: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub unmet: Option<UnmetRequirement>,
    pub confidence_modifiers: ConfidenceAdjustment,
    pub policy: InteractionPolicy,
    /// Id of the persisted verification record
    #[serde(default)]
    pub verification_id: Option<String>,
}

impl CompatibilityResult {
    /// Result for a verification that could not start because an agent was missing.
    pub fn missing_agents() -> Self {
        Self::unavailable("Missing agent(s)")
    }

    /// Rejecting result for a verification that could not be carried out.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            compatible: false,
            reason: Some(reason.clone()),
            unmet: None,
            confidence_modifiers: ConfidenceAdjustment::none(),
            policy: InteractionPolicy {
                action: PolicyAction::Reject,
                restrictions: Vec::new(),
                explanation: Some(reason),
            },
            verification_id: None,
        }
    }
}
