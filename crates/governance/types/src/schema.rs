//! Versioned JSON schemas for scorecards and trust lineage records.
//!
//! Both record kinds are validated before they are signed and again before
//! they are persisted. Validation collects every violation rather than
//! stopping at the first one.

use crate::contract::InteroperabilityProtocol;
use crate::error::{SchemaError, SchemaResult};
use crate::identity::GovernanceIdentity;
use crate::lineage::{TrustLineageRecord, LINEAGE_SCHEMA_VERSION};
use crate::scorecard::{Scorecard, SCORECARD_SCHEMA_VERSION};
use serde::Serialize;
use serde_json::{json, Value};

/// JSON schema for [`Scorecard`].
pub fn scorecard_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": format!("governance/scorecard/{}", SCORECARD_SCHEMA_VERSION),
        "type": "object",
        "required": [
            "schema_version", "agent_id", "scorecard_id", "timestamp",
            "governance_identity", "trust_score", "reflection_compliance",
            "belief_trace_integrity", "violation_history", "warning_state",
            "cryptographic_proof"
        ],
        "properties": {
            "schema_version": { "const": SCORECARD_SCHEMA_VERSION },
            "agent_id": { "type": "string", "minLength": 1 },
            "scorecard_id": { "type": "string", "minLength": 1 },
            "timestamp": { "type": "string", "minLength": 1 },
            "governance_identity": governance_identity_schema(),
            "trust_score": { "type": ["number", "null"], "minimum": 0, "maximum": 1 },
            "reflection_compliance": {
                "type": "object",
                "required": ["percentage", "total", "compliant"],
                "properties": {
                    "percentage": { "type": "number", "minimum": 0, "maximum": 100 },
                    "total": { "type": "integer", "minimum": 0 },
                    "compliant": { "type": "integer", "minimum": 0 }
                }
            },
            "belief_trace_integrity": {
                "type": "object",
                "required": ["percentage", "total", "verified"],
                "properties": {
                    "percentage": { "type": "number", "minimum": 0, "maximum": 100 },
                    "total": { "type": "integer", "minimum": 0 },
                    "verified": { "type": "integer", "minimum": 0 }
                }
            },
            "violation_history": {
                "type": "object",
                "required": ["count", "categories", "recent"],
                "properties": {
                    "count": { "type": "integer", "minimum": 0 },
                    "categories": { "type": "object" },
                    "recent": { "type": "array" }
                }
            },
            "warning_state": {
                "type": "object",
                "required": ["has_warning", "level"],
                "properties": {
                    "has_warning": { "type": "boolean" },
                    "level": { "enum": ["none", "caution", "warning", "severe"] }
                }
            },
            "cryptographic_proof": proof_schema()
        }
    })
}

/// JSON schema for [`TrustLineageRecord`].
pub fn lineage_schema() -> Value {
    let party = json!({
        "type": "object",
        "required": ["id", "governance_framework"],
        "properties": {
            "id": { "type": "string", "minLength": 1 },
            "governance_framework": {
                "enum": ["promethios", "external", "external_verified", "unknown"]
            },
            "trust_score": { "type": ["number", "null"], "minimum": 0, "maximum": 1 }
        }
    });
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": format!("governance/trust-lineage/{}", LINEAGE_SCHEMA_VERSION),
        "type": "object",
        "required": [
            "schema_version", "lineage_id", "source_agent", "target_agent",
            "timestamp", "trust_context", "trust_metrics", "cryptographic_proof"
        ],
        "properties": {
            "schema_version": { "const": LINEAGE_SCHEMA_VERSION },
            "lineage_id": { "type": "string", "minLength": 1 },
            "source_agent": party.clone(),
            "target_agent": party,
            "timestamp": { "type": "string", "minLength": 1 },
            "trust_context": {
                "type": "object",
                "required": ["domain", "scope"],
                "properties": {
                    "domain": { "type": "string", "minLength": 1 },
                    "scope": { "type": "array", "items": { "type": "string" } }
                }
            },
            "trust_metrics": {
                "type": "object",
                "required": ["delegation_score"],
                "properties": {
                    "delegation_score": { "type": "number", "minimum": 0, "maximum": 1 }
                }
            },
            "cryptographic_proof": proof_schema()
        }
    })
}

/// JSON schema for a [`GovernanceIdentity`], embedded in scorecards and contracts.
pub fn governance_identity_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "agent_id", "governance_framework", "constitution_hash",
            "compliance_level", "memory_integrity", "fallback_strategy"
        ],
        "properties": {
            "agent_id": { "type": "string", "minLength": 1 },
            "governance_framework": {
                "enum": ["promethios", "external", "external_verified", "unknown"]
            },
            "constitution_hash": { "type": "string" },
            "compliance_level": { "enum": ["minimal", "standard", "strict", "custom"] },
            "fallback_strategy": {
                "enum": ["reject", "log-and-restrict", "log-and-proceed"]
            }
        }
    })
}

/// JSON schema for an [`InteroperabilityProtocol`] block.
pub fn interoperability_protocol_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "protocol_version", "governance_negotiation_enabled", "default_protocol",
            "trust_verification_method", "handshake_timeout_ms", "required_metadata_fields",
            "trust_decay_policy", "interaction_logging", "fallback_protocols"
        ],
        "properties": {
            "protocol_version": { "type": "string", "pattern": "^[0-9]+\\.[0-9]+\\.[0-9]+$" },
            "governance_negotiation_enabled": { "type": "boolean" },
            "default_protocol": { "type": "string", "minLength": 1 },
            "trust_verification_method": {
                "enum": ["cryptographic_signature", "shared_secret", "none"]
            },
            "handshake_timeout_ms": { "type": "integer", "minimum": 1 },
            "required_metadata_fields": { "type": "array", "items": { "type": "string" } },
            "trust_decay_policy": {
                "type": "object",
                "required": ["strategy", "half_life_hours", "minimum_trust"],
                "properties": {
                    "strategy": { "enum": ["none", "linear", "exponential"] },
                    "half_life_hours": { "type": "integer", "minimum": 0 },
                    "minimum_trust": { "type": "number", "minimum": 0, "maximum": 1 }
                }
            },
            "interaction_logging": { "type": "boolean" },
            "fallback_protocols": { "type": "array", "items": { "type": "string" } }
        }
    })
}

fn proof_schema() -> Value {
    json!({
        "type": "object",
        "required": ["algorithm"],
        "properties": {
            "algorithm": { "type": "string", "minLength": 1 },
            "signature": { "type": ["string", "null"] },
            "public_key_id": { "type": ["string", "null"] },
            "merkle_root": { "type": ["string", "null"] }
        }
    })
}

/// Validate a scorecard against [`scorecard_schema`].
pub fn validate_scorecard(scorecard: &Scorecard) -> SchemaResult<()> {
    let mut violations = validate_against("scorecard", &scorecard_schema(), scorecard)?;
    if scorecard.reflection_compliance.compliant > scorecard.reflection_compliance.total {
        violations.push("reflection_compliance.compliant exceeds total".to_string());
    }
    if scorecard.belief_trace_integrity.verified > scorecard.belief_trace_integrity.total {
        violations.push("belief_trace_integrity.verified exceeds total".to_string());
    }
    if scorecard.governance_identity.agent_id != scorecard.agent_id {
        violations.push("governance_identity.agent_id does not match agent_id".to_string());
    }
    finish("scorecard", violations)
}

/// Validate a lineage record against [`lineage_schema`].
pub fn validate_lineage(record: &TrustLineageRecord) -> SchemaResult<()> {
    let mut violations = validate_against("trust_lineage", &lineage_schema(), record)?;
    if record.source_agent.id == record.target_agent.id {
        violations.push("source_agent and target_agent must differ".to_string());
    }
    finish("trust_lineage", violations)
}

/// Validate a governance identity on its own.
pub fn validate_governance_identity(identity: &GovernanceIdentity) -> SchemaResult<()> {
    let violations =
        validate_against("governance_identity", &governance_identity_schema(), identity)?;
    finish("governance_identity", violations)
}

/// Validate an interoperability protocol block on its own.
pub fn validate_interoperability_protocol(protocol: &InteroperabilityProtocol) -> SchemaResult<()> {
    let violations = validate_against(
        "interoperability_protocol",
        &interoperability_protocol_schema(),
        protocol,
    )?;
    finish("interoperability_protocol", violations)
}

fn validate_against<T: Serialize>(
    name: &'static str,
    schema: &Value,
    instance: &T,
) -> SchemaResult<Vec<String>> {
    let instance =
        serde_json::to_value(instance).map_err(|e| SchemaError::Serialization(e.to_string()))?;
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| SchemaError::Compile(format!("{}: {}", name, e)))?;
    Ok(validator
        .iter_errors(&instance)
        .map(|error| error.to_string())
        .collect())
}

fn finish(schema: &'static str, violations: Vec<String>) -> SchemaResult<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Invalid { schema, violations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;
    use crate::identity::*;
    use crate::lineage::*;
    use crate::scorecard::*;
    use chrono::{Duration, Utc};

    fn identity(agent: &str) -> GovernanceIdentity {
        let now = Utc::now();
        GovernanceIdentity {
            agent_id: AgentId::new(agent),
            governance_framework: GovernanceFramework::Promethios,
            constitution_hash: "c0ffee".into(),
            compliance_level: ComplianceLevel::Strict,
            memory_integrity: MemoryIntegrity::none(),
            trust_requirements: TrustRequirements::permissive(),
            confidence_modifiers: ConfidenceModifiers::default(),
            fallback_strategy: FallbackStrategy::Reject,
            governance_proof: GovernanceProof {
                signed_by: "test".into(),
                signature: "00".into(),
                timestamp: now,
                valid_until: now + Duration::days(1),
            },
        }
    }

    fn scorecard(trust_score: Option<f64>) -> Scorecard {
        Scorecard {
            schema_version: SCORECARD_SCHEMA_VERSION.into(),
            agent_id: AgentId::new("alpha"),
            scorecard_id: "sc-1".into(),
            timestamp: Utc::now(),
            governance_identity: identity("alpha"),
            trust_score,
            reflection_compliance: ReflectionCompliance::default(),
            belief_trace_integrity: BeliefTraceIntegrity::default(),
            violation_history: ViolationHistory::default(),
            warning_state: WarningState::none(),
            cryptographic_proof: CryptographicProof::unsigned(),
        }
    }

    #[test]
    fn valid_scorecard_passes() {
        assert!(validate_scorecard(&scorecard(Some(0.9))).is_ok());
        assert!(validate_scorecard(&scorecard(None)).is_ok());
    }

    #[test]
    fn out_of_range_trust_score_is_rejected() {
        let err = validate_scorecard(&scorecard(Some(1.5))).unwrap_err();
        assert!(!err.violations().is_empty());
    }

    #[test]
    fn every_violation_is_enumerated() {
        let mut sc = scorecard(Some(-0.1));
        sc.scorecard_id = String::new();
        sc.reflection_compliance = ReflectionCompliance {
            percentage: 50.0,
            total: 1,
            compliant: 2,
        };
        let err = validate_scorecard(&sc).unwrap_err();
        assert!(err.violations().len() >= 3);
    }

    #[test]
    fn identity_must_belong_to_scorecard_agent() {
        let mut sc = scorecard(Some(0.5));
        sc.governance_identity = identity("someone-else");
        let err = validate_scorecard(&sc).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn default_protocol_is_valid() {
        assert!(validate_interoperability_protocol(&InteroperabilityProtocol::default()).is_ok());

        let mut protocol = InteroperabilityProtocol::default();
        protocol.protocol_version = "one".into();
        protocol.handshake_timeout_ms = 0;
        let err = validate_interoperability_protocol(&protocol).unwrap_err();
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn identity_requires_known_framework() {
        assert!(validate_governance_identity(&identity("alpha")).is_ok());
        let mut value = serde_json::to_value(identity("alpha")).unwrap();
        value["governance_framework"] = json!("rogue");
        assert!(serde_json::from_value::<GovernanceIdentity>(value).is_err());
    }

    #[test]
    fn self_delegation_is_rejected() {
        let party = LineageParty {
            id: AgentId::new("alpha"),
            governance_framework: GovernanceFramework::Promethios,
            trust_score: Some(0.9),
            scorecard_id: None,
        };
        let record = TrustLineageRecord {
            schema_version: LINEAGE_SCHEMA_VERSION.into(),
            lineage_id: "lin-1".into(),
            source_agent: party.clone(),
            target_agent: party,
            timestamp: Utc::now(),
            trust_context: TrustContext::default(),
            trust_metrics: TrustMetrics {
                delegation_score: 0.8,
            },
            cryptographic_proof: CryptographicProof::unsigned(),
        };
        let err = validate_lineage(&record).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }
}
