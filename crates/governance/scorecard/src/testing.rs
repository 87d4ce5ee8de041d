//! Fixtures shared by the scorecard, lineage and analytics tests.

use crate::config::{AnalyticsConfig, LineageConfig, ScorecardConfig};
use crate::{ScorecardAnalytics, ScorecardManager, TrustLineageTracker};
use chrono::{Duration, Utc};
use governance_crypto::{CryptographicVerifier, KeyStore};
use governance_storage::{InMemoryTrustStorage, TrustStorage};
use governance_types::*;
use std::sync::Arc;

pub(crate) fn identity(agent: &str, framework: GovernanceFramework) -> GovernanceIdentity {
    let now = Utc::now();
    GovernanceIdentity {
        agent_id: AgentId::new(agent),
        governance_framework: framework,
        constitution_hash: format!("constitution-{}", agent),
        compliance_level: ComplianceLevel::Standard,
        memory_integrity: MemoryIntegrity::none(),
        trust_requirements: TrustRequirements::permissive(),
        confidence_modifiers: ConfidenceModifiers::default(),
        fallback_strategy: FallbackStrategy::LogAndProceed,
        governance_proof: GovernanceProof {
            signed_by: "fixture".into(),
            signature: "00".into(),
            timestamp: now - Duration::minutes(1),
            valid_until: now + Duration::days(30),
        },
    }
}

pub(crate) fn prism(reflections: (u64, u64), beliefs: (u64, u64)) -> PrismMetrics {
    PrismMetrics {
        reflection: ReflectionMetrics {
            total: reflections.0,
            compliant: reflections.1,
        },
        belief_trace: BeliefTraceMetrics {
            total: beliefs.0,
            verified: beliefs.1,
        },
    }
}

pub(crate) fn violation(category: &str, minutes_ago: i64) -> ViolationEntry {
    ViolationEntry {
        category: category.into(),
        description: format!("{} violation", category),
        severity: ViolationSeverity::Medium,
        timestamp: Utc::now() - Duration::minutes(minutes_ago),
    }
}

pub(crate) struct Harness {
    pub store: Arc<dyn TrustStorage>,
    pub verifier: Arc<CryptographicVerifier>,
    pub manager: Arc<ScorecardManager>,
    pub lineage: Arc<TrustLineageTracker>,
    pub analytics: ScorecardAnalytics,
}

pub(crate) fn harness() -> Harness {
    let store: Arc<dyn TrustStorage> = Arc::new(InMemoryTrustStorage::new());
    let verifier = Arc::new(CryptographicVerifier::new(Arc::new(KeyStore::ephemeral())));
    let manager = Arc::new(ScorecardManager::new(
        ScorecardConfig::default(),
        verifier.clone(),
        store.clone(),
    ));
    let lineage = Arc::new(TrustLineageTracker::new(
        LineageConfig::default(),
        verifier.clone(),
        store.clone(),
    ));
    let analytics = ScorecardAnalytics::new(
        AnalyticsConfig::default(),
        manager.clone(),
        lineage.clone(),
    );
    Harness {
        store,
        verifier,
        manager,
        lineage,
        analytics,
    }
}

impl Harness {
    /// Assemble, sign and store a scorecard for `agent`.
    pub async fn scored(
        &self,
        agent: &str,
        framework: GovernanceFramework,
        trust_score: Option<f64>,
    ) -> Scorecard {
        let sc = self
            .manager
            .create_scorecard(
                &AgentId::new(agent),
                &identity(agent, framework),
                trust_score,
                None,
                None,
            )
            .unwrap();
        let signed = self.verifier.sign_scorecard(sc).unwrap();
        assert!(self.manager.store_scorecard(signed.clone()).await.unwrap());
        signed
    }
}
