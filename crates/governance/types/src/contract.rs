//! Agent contracts and the interoperability protocol block attached to them.

use crate::agent::{AgentId, DeclaredCapabilities};
use crate::identity::GovernanceIdentity;
use serde::{Deserialize, Serialize};

/// Current interoperability protocol version.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// How trust carried by a handshake is verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustVerificationMethod {
    CryptographicSignature,
    SharedSecret,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayStrategy {
    None,
    Linear,
    Exponential,
}

/// How trust established with a counterpart fades without re-verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustDecayPolicy {
    pub strategy: DecayStrategy,
    pub half_life_hours: u32,
    pub minimum_trust: f64,
}

impl Default for TrustDecayPolicy {
    fn default() -> Self {
        Self {
            strategy: DecayStrategy::Exponential,
            half_life_hours: 24,
            minimum_trust: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteroperabilityProtocol {
    pub protocol_version: String,
    pub governance_negotiation_enabled: bool,
    pub default_protocol: String,
    pub trust_verification_method: TrustVerificationMethod,
    pub handshake_timeout_ms: u64,
    pub required_metadata_fields: Vec<String>,
    pub trust_decay_policy: TrustDecayPolicy,
    pub interaction_logging: bool,
    pub fallback_protocols: Vec<String>,
}

impl Default for InteroperabilityProtocol {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            governance_negotiation_enabled: true,
            default_protocol: "governance-exchange".to_string(),
            trust_verification_method: TrustVerificationMethod::CryptographicSignature,
            handshake_timeout_ms: 5_000,
            required_metadata_fields: vec![
                "agent_id".to_string(),
                "governance_framework".to_string(),
                "constitution_hash".to_string(),
                "compliance_level".to_string(),
            ],
            trust_decay_policy: TrustDecayPolicy::default(),
            interaction_logging: true,
            fallback_protocols: vec!["basic-exchange".to_string()],
        }
    }
}

/// An agent's declared contract.
///
/// `governance_identity` and `interoperability_protocol` are filled in by
/// contract extension and are always present together once extended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentContract {
    pub agent_id: AgentId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: DeclaredCapabilities,
    /// Free-form contract body (inputs, outputs, constraints)
    #[serde(default)]
    pub terms: serde_json::Value,
    #[serde(default, rename = "governanceIdentity")]
    pub governance_identity: Option<GovernanceIdentity>,
    #[serde(default, rename = "interoperabilityProtocol")]
    pub interoperability_protocol: Option<InteroperabilityProtocol>,
}

impl AgentContract {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            agent_id: AgentId::new(agent_id),
            name: name.into(),
            version: "1.0.0".to_string(),
            description: String::new(),
            capabilities: DeclaredCapabilities::default(),
            terms: serde_json::Value::Null,
            governance_identity: None,
            interoperability_protocol: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: DeclaredCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_terms(mut self, terms: serde_json::Value) -> Self {
        self.terms = terms;
        self
    }

    pub fn is_extended(&self) -> bool {
        self.governance_identity.is_some()
    }

    /// The contract body without governance metadata; this is what the
    /// constitution hash is computed over.
    pub fn declared_content(&self) -> serde_json::Value {
        serde_json::json!({
            "agent_id": self.agent_id,
            "name": self.name,
            "version": self.version,
            "description": self.description,
            "capabilities": self.capabilities,
            "terms": self.terms,
        })
    }
}
