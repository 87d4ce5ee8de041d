//! Record fixtures shared by the backend tests.

use chrono::{DateTime, Duration, Utc};
use governance_types::*;

pub(crate) fn scorecard(agent: &str, id: &str, at: DateTime<Utc>) -> Scorecard {
    Scorecard {
        schema_version: SCORECARD_SCHEMA_VERSION.into(),
        agent_id: AgentId::new(agent),
        scorecard_id: id.into(),
        timestamp: at,
        governance_identity: GovernanceIdentity {
            agent_id: AgentId::new(agent),
            governance_framework: GovernanceFramework::Promethios,
            constitution_hash: "c0ffee".into(),
            compliance_level: ComplianceLevel::Standard,
            memory_integrity: MemoryIntegrity::none(),
            trust_requirements: TrustRequirements::permissive(),
            confidence_modifiers: ConfidenceModifiers::default(),
            fallback_strategy: FallbackStrategy::LogAndProceed,
            governance_proof: GovernanceProof {
                signed_by: "test".into(),
                signature: "00".into(),
                timestamp: at,
                valid_until: at + Duration::days(30),
            },
        },
        trust_score: Some(0.8),
        reflection_compliance: ReflectionCompliance::default(),
        belief_trace_integrity: BeliefTraceIntegrity::default(),
        violation_history: ViolationHistory::default(),
        warning_state: WarningState::none(),
        cryptographic_proof: CryptographicProof::unsigned(),
    }
}

pub(crate) fn lineage(id: &str, source: &str, target: &str, at: DateTime<Utc>) -> TrustLineageRecord {
    let party = |id: &str| LineageParty {
        id: AgentId::new(id),
        governance_framework: GovernanceFramework::Promethios,
        trust_score: Some(0.8),
        scorecard_id: None,
    };
    TrustLineageRecord {
        schema_version: LINEAGE_SCHEMA_VERSION.into(),
        lineage_id: id.into(),
        source_agent: party(source),
        target_agent: party(target),
        timestamp: at,
        trust_context: TrustContext::default(),
        trust_metrics: TrustMetrics {
            delegation_score: 0.8,
        },
        cryptographic_proof: CryptographicProof::unsigned(),
    }
}
