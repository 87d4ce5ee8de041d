//! Governance identity: the per-agent tag that asserts a compliance
//! framework, memory-integrity guarantees and fallback behaviour.
//!
//! An identity is created once per agent and is immutable afterwards,
//! except for `memory_integrity.last_verified`, which is refreshed on every
//! governed memory mutation.

use crate::agent::{AgentId, DeclaredCapabilities};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Framework an agent is governed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceFramework {
    Promethios,
    External,
    ExternalVerified,
    Unknown,
}

impl GovernanceFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promethios => "promethios",
            Self::External => "external",
            Self::ExternalVerified => "external_verified",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for GovernanceFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance level. Ordering is ordinal: `Minimal < Standard < Strict < Custom`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    Minimal,
    Standard,
    Strict,
    Custom,
}

impl ComplianceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Strict => "strict",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mechanism backing an agent's memory-integrity guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryIntegrityKind {
    None,
    HashChain,
    MerkleTree,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryIntegrity {
    #[serde(rename = "type")]
    pub kind: MemoryIntegrityKind,
    #[serde(default)]
    pub verification_endpoint: Option<String>,
    #[serde(default)]
    pub last_verified: Option<DateTime<Utc>>,
}

impl MemoryIntegrity {
    pub fn none() -> Self {
        Self {
            kind: MemoryIntegrityKind::None,
            verification_endpoint: None,
            last_verified: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.kind != MemoryIntegrityKind::None
    }
}

/// What an agent requires of its counterparts, and, read from the
/// counterpart's side, which of these guarantees it enforces itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustRequirements {
    pub memory_integrity: bool,
    pub reflection_enforced: bool,
    pub belief_trace: bool,
    pub minimum_compliance_level: ComplianceLevel,
}

impl TrustRequirements {
    /// Requirements that every counterpart satisfies.
    pub fn permissive() -> Self {
        Self {
            memory_integrity: false,
            reflection_enforced: false,
            belief_trace: false,
            minimum_compliance_level: ComplianceLevel::Minimal,
        }
    }

    /// Requirements of an agent that declared `capabilities`: it requires of
    /// counterparts exactly the guarantees it provides itself, and the
    /// minimum compliance level implied by its own level.
    pub fn from_capabilities(capabilities: &DeclaredCapabilities) -> Self {
        let level = capabilities.implied_compliance_level();
        Self {
            memory_integrity: capabilities.memory_integrity,
            reflection_enforced: capabilities.reflection,
            belief_trace: capabilities.belief_trace,
            minimum_compliance_level: Self::for_level(level).minimum_compliance_level,
        }
    }

    /// Requirements implied by a compliance level.
    pub fn for_level(level: ComplianceLevel) -> Self {
        match level {
            ComplianceLevel::Minimal => Self::permissive(),
            ComplianceLevel::Standard => Self {
                memory_integrity: true,
                reflection_enforced: true,
                belief_trace: false,
                minimum_compliance_level: ComplianceLevel::Minimal,
            },
            ComplianceLevel::Strict | ComplianceLevel::Custom => Self {
                memory_integrity: true,
                reflection_enforced: true,
                belief_trace: true,
                minimum_compliance_level: ComplianceLevel::Standard,
            },
        }
    }
}

/// Penalty magnitudes applied to confidence when a counterpart lacks a guarantee.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceModifiers {
    pub unknown_governance: f64,
    pub missing_reflection: f64,
    pub missing_belief_trace: f64,
    pub missing_memory_integrity: f64,
}

impl Default for ConfidenceModifiers {
    fn default() -> Self {
        Self {
            unknown_governance: 0.3,
            missing_reflection: 0.2,
            missing_belief_trace: 0.1,
            missing_memory_integrity: 0.2,
        }
    }
}

/// What to do when a counterpart fails the trust requirements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackStrategy {
    Reject,
    LogAndRestrict,
    #[default]
    LogAndProceed,
}

/// Attestation over the identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernanceProof {
    pub signed_by: String,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernanceIdentity {
    pub agent_id: AgentId,
    pub governance_framework: GovernanceFramework,
    pub constitution_hash: String,
    pub compliance_level: ComplianceLevel,
    pub memory_integrity: MemoryIntegrity,
    pub trust_requirements: TrustRequirements,
    pub confidence_modifiers: ConfidenceModifiers,
    pub fallback_strategy: FallbackStrategy,
    pub governance_proof: GovernanceProof,
}

impl GovernanceIdentity {
    pub fn is_promethios(&self) -> bool {
        self.governance_framework == GovernanceFramework::Promethios
    }

    /// Whether the governance proof is still inside its validity window.
    pub fn is_proof_current(&self, now: DateTime<Utc>) -> bool {
        self.governance_proof.timestamp <= now && now <= self.governance_proof.valid_until
    }

    /// An identity is invalid when it is unknown, lacks a constitution
    /// hash, or its proof has lapsed.
    pub fn is_invalid(&self, now: DateTime<Utc>) -> bool {
        self.governance_framework == GovernanceFramework::Unknown
            || self.constitution_hash.trim().is_empty()
            || !self.is_proof_current(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(framework: GovernanceFramework) -> GovernanceIdentity {
        let now = Utc::now();
        GovernanceIdentity {
            agent_id: AgentId::new("a"),
            governance_framework: framework,
            constitution_hash: "abc".into(),
            compliance_level: ComplianceLevel::Standard,
            memory_integrity: MemoryIntegrity::none(),
            trust_requirements: TrustRequirements::permissive(),
            confidence_modifiers: ConfidenceModifiers::default(),
            fallback_strategy: FallbackStrategy::default(),
            governance_proof: GovernanceProof {
                signed_by: "test".into(),
                signature: "sig".into(),
                timestamp: now - Duration::minutes(1),
                valid_until: now + Duration::days(1),
            },
        }
    }

    #[test]
    fn compliance_levels_are_ordinal() {
        assert!(ComplianceLevel::Minimal < ComplianceLevel::Standard);
        assert!(ComplianceLevel::Standard < ComplianceLevel::Strict);
        assert!(ComplianceLevel::Strict < ComplianceLevel::Custom);
    }

    #[test]
    fn fallback_strategy_uses_kebab_case() {
        let json = serde_json::to_string(&FallbackStrategy::LogAndRestrict).unwrap();
        assert_eq!(json, "\"log-and-restrict\"");
        assert_eq!(FallbackStrategy::default(), FallbackStrategy::LogAndProceed);
    }

    #[test]
    fn memory_integrity_kind_serializes_as_type() {
        let json = serde_json::to_value(MemoryIntegrity::none()).unwrap();
        assert_eq!(json["type"], "none");
    }

    #[test]
    fn unknown_framework_is_invalid() {
        let now = Utc::now();
        assert!(!sample(GovernanceFramework::Promethios).is_invalid(now));
        assert!(sample(GovernanceFramework::Unknown).is_invalid(now));
    }

    #[test]
    fn lapsed_proof_is_invalid() {
        let identity = sample(GovernanceFramework::Promethios);
        let later = identity.governance_proof.valid_until + Duration::seconds(1);
        assert!(identity.is_invalid(later));
    }

    #[test]
    fn declared_requirements_mirror_capabilities() {
        let caps = DeclaredCapabilities::new()
            .with_memory_integrity()
            .with_belief_trace();
        let req = TrustRequirements::from_capabilities(&caps);
        assert!(req.memory_integrity && req.belief_trace);
        assert!(!req.reflection_enforced);
        assert_eq!(req.minimum_compliance_level, ComplianceLevel::Minimal);
    }

    #[test]
    fn strict_requirements_demand_everything() {
        let req = TrustRequirements::for_level(ComplianceLevel::Strict);
        assert!(req.memory_integrity && req.reflection_enforced && req.belief_trace);
        assert_eq!(req.minimum_compliance_level, ComplianceLevel::Standard);
    }
}
