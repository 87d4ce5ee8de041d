//! Agent identifiers and the runtime descriptor governance hooks operate on.

use crate::identity::{ComplianceLevel, GovernanceFramework, GovernanceIdentity};
use serde::{Deserialize, Serialize};

/// Unique identifier for an agent
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("agent-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Where an agent runs relative to this governance domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOrigin {
    /// Hosted and governed locally
    #[default]
    Local,
    /// A counterpart from outside this governance domain
    External,
}

/// Governance-relevant capabilities an agent declares about itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredCapabilities {
    #[serde(default)]
    pub memory_integrity: bool,
    #[serde(default)]
    pub reflection: bool,
    #[serde(default)]
    pub belief_trace: bool,
    /// Framework the agent claims to be governed by
    #[serde(default)]
    pub governance_framework: Option<GovernanceFramework>,
    /// Explicit compliance level, overriding the heuristic
    #[serde(default)]
    pub compliance_level: Option<ComplianceLevel>,
}

impl DeclaredCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_integrity(mut self) -> Self {
        self.memory_integrity = true;
        self
    }

    pub fn with_reflection(mut self) -> Self {
        self.reflection = true;
        self
    }

    pub fn with_belief_trace(mut self) -> Self {
        self.belief_trace = true;
        self
    }

    pub fn with_framework(mut self, framework: GovernanceFramework) -> Self {
        self.governance_framework = Some(framework);
        self
    }

    pub fn with_compliance_level(mut self, level: ComplianceLevel) -> Self {
        self.compliance_level = Some(level);
        self
    }

    /// Number of the three core guarantees (memory integrity, reflection,
    /// belief trace) that are declared.
    pub fn core_guarantee_count(&self) -> usize {
        [self.memory_integrity, self.reflection, self.belief_trace]
            .iter()
            .filter(|declared| **declared)
            .count()
    }

    /// Compliance level implied by the declared guarantees: all three is
    /// strict, two is standard, fewer is minimal. An explicit level wins.
    pub fn implied_compliance_level(&self) -> ComplianceLevel {
        if let Some(level) = self.compliance_level {
            return level;
        }
        match self.core_guarantee_count() {
            3 => ComplianceLevel::Strict,
            2 => ComplianceLevel::Standard,
            _ => ComplianceLevel::Minimal,
        }
    }
}

/// A running agent as seen by the governance layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub origin: AgentOrigin,
    #[serde(default)]
    pub capabilities: DeclaredCapabilities,
    /// Attached once the agent has been tagged
    #[serde(default)]
    pub governance_identity: Option<GovernanceIdentity>,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(id),
            name: name.into(),
            origin: AgentOrigin::Local,
            capabilities: DeclaredCapabilities::default(),
            governance_identity: None,
        }
    }

    pub fn external(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            origin: AgentOrigin::External,
            ..Self::new(id, name)
        }
    }

    pub fn with_capabilities(mut self, capabilities: DeclaredCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_identity(mut self, identity: GovernanceIdentity) -> Self {
        self.governance_identity = Some(identity);
        self
    }

    pub fn is_tagged(&self) -> bool {
        self.governance_identity.is_some()
    }

    pub fn is_external(&self) -> bool {
        self.origin == AgentOrigin::External
    }

    /// True when the agent carries a promethios governance identity.
    pub fn is_governed(&self) -> bool {
        self.governance_identity
            .as_ref()
            .map(|identity| identity.governance_framework == GovernanceFramework::Promethios)
            .unwrap_or(false)
    }
}
