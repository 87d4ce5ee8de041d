//! Trust lineage: signed delegation edges between scored agents.
//!
//! Every record is validated, signed and then written to the id, source
//! and target indices plus the pair index. Only single edges are tracked
//! here; walking multi-hop chains is left to callers.

use crate::config::LineageConfig;
use crate::error::{LineageError, LineageResult};
use chrono::Utc;
use governance_crypto::CryptographicVerifier;
use governance_storage::{LineageStore, TrustStorage};
use governance_types::schema::validate_lineage;
use governance_types::{
    AgentId, CryptographicProof, GovernanceFramework, LineageParty, Scorecard, TrustContext,
    TrustLineageRecord, TrustMetrics, LINEAGE_SCHEMA_VERSION,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct TrustLineageTracker {
    config: LineageConfig,
    verifier: Arc<CryptographicVerifier>,
    store: Arc<dyn TrustStorage>,
}

impl TrustLineageTracker {
    pub fn new(
        config: LineageConfig,
        verifier: Arc<CryptographicVerifier>,
        store: Arc<dyn TrustStorage>,
    ) -> Self {
        Self {
            config,
            verifier,
            store,
        }
    }

    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Record that `source_id` delegated trust to `target_id`, based on
    /// each agent's scorecard.
    pub async fn create_lineage_record(
        &self,
        source_id: &AgentId,
        target_id: &AgentId,
        source_scorecard: &Scorecard,
        target_scorecard: &Scorecard,
        context: TrustContext,
    ) -> LineageResult<TrustLineageRecord> {
        ensure_owner(source_id, source_scorecard)?;
        ensure_owner(target_id, target_scorecard)?;
        self.verify_delegation_requirements(source_scorecard, target_scorecard)?;

        let record = TrustLineageRecord {
            schema_version: LINEAGE_SCHEMA_VERSION.to_string(),
            lineage_id: format!("lineage-{}", uuid::Uuid::new_v4()),
            source_agent: party(source_scorecard),
            target_agent: party(target_scorecard),
            timestamp: Utc::now(),
            trust_context: context,
            trust_metrics: TrustMetrics {
                delegation_score: self
                    .calculate_delegation_score(source_scorecard, target_scorecard),
            },
            cryptographic_proof: CryptographicProof::unsigned(),
        };
        validate_lineage(&record)?;

        let signed = self.verifier.sign_lineage_record(record)?;
        if let Err(e) = self.store.store_lineage(signed.clone()).await {
            error!(lineage_id = %signed.lineage_id, error = %e, "Failed to store lineage record");
            return Err(e.into());
        }

        info!(
            lineage_id = %signed.lineage_id,
            source = %source_id,
            target = %target_id,
            delegation_score = signed.trust_metrics.delegation_score,
            "Recorded trust delegation"
        );
        Ok(signed)
    }

    /// Reject delegations from unscored or low-trust sources and to agents
    /// with unknown governance.
    pub fn verify_delegation_requirements(
        &self,
        source: &Scorecard,
        target: &Scorecard,
    ) -> LineageResult<()> {
        let Some(score) = source.trust_score else {
            return Err(LineageError::NullTrustScore(source.agent_id.clone()));
        };
        if score < self.config.min_delegation_score {
            return Err(LineageError::BelowThreshold {
                score,
                minimum: self.config.min_delegation_score,
            });
        }
        if target.governance_identity.governance_framework == GovernanceFramework::Unknown {
            return Err(LineageError::UnknownGovernance(target.agent_id.clone()));
        }
        Ok(())
    }

    /// Source-weighted average of both trust scores, adjusted for how
    /// closely the two governance identities match. Always within
    /// `[min_delegation_score, 1]`; an unscored source yields the floor.
    pub fn calculate_delegation_score(&self, source: &Scorecard, target: &Scorecard) -> f64 {
        let floor = self.config.min_delegation_score;
        let Some(source_score) = source.trust_score else {
            return floor;
        };
        let target_score = target.trust_score.unwrap_or(floor);
        let weight = self.config.source_weight.clamp(0.0, 1.0);
        let average = weight * source_score + (1.0 - weight) * target_score;

        let src = &source.governance_identity;
        let tgt = &target.governance_identity;
        let adjustment = if src.governance_framework != tgt.governance_framework {
            -self.config.framework_mismatch_penalty
        } else if src.constitution_hash == tgt.constitution_hash {
            self.config.same_constitution_bonus
        } else {
            self.config.same_framework_bonus
        };

        (average + adjustment).clamp(floor, 1.0)
    }

    pub async fn get_lineage(&self, lineage_id: &str) -> Option<TrustLineageRecord> {
        match self.store.get_lineage(lineage_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(lineage_id, error = %e, "Failed to read lineage record");
                None
            }
        }
    }

    /// Delegations made by `agent_id`, newest first.
    pub async fn delegations_from(&self, agent_id: &AgentId) -> Vec<TrustLineageRecord> {
        self.store
            .lineage_by_source(agent_id)
            .await
            .unwrap_or_else(|e| {
                warn!(agent_id = %agent_id, error = %e, "Failed to read delegations");
                Vec::new()
            })
    }

    /// Delegations received by `agent_id`, newest first.
    pub async fn delegations_to(&self, agent_id: &AgentId) -> Vec<TrustLineageRecord> {
        self.store
            .lineage_by_target(agent_id)
            .await
            .unwrap_or_else(|e| {
                warn!(agent_id = %agent_id, error = %e, "Failed to read delegations");
                Vec::new()
            })
    }

    pub async fn has_delegated(&self, source: &AgentId, target: &AgentId) -> bool {
        match self.store.pair_lookup(source, target).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(source = %source, target = %target, error = %e, "Pair lookup failed");
                false
            }
        }
    }

    /// Every edge touching `agent_id`, most recent first.
    pub async fn get_delegation_chain(&self, agent_id: &AgentId) -> Vec<TrustLineageRecord> {
        let outgoing = self.delegations_from(agent_id).await;
        let incoming = self.delegations_to(agent_id).await;
        build_delegation_chain(agent_id, outgoing, incoming)
    }

    /// Re-check the signature of a stored record.
    pub async fn verify_lineage(&self, lineage_id: &str) -> bool {
        match self.get_lineage(lineage_id).await {
            Some(record) => self.verifier.verify_lineage_record(&record),
            None => false,
        }
    }
}

/// Merge outgoing and incoming edges of `agent_id` into one list, most
/// recent first. Records that do not touch the agent are dropped.
pub fn build_delegation_chain(
    agent_id: &AgentId,
    source_records: Vec<TrustLineageRecord>,
    target_records: Vec<TrustLineageRecord>,
) -> Vec<TrustLineageRecord> {
    let mut seen = HashSet::new();
    let mut chain: Vec<TrustLineageRecord> = source_records
        .into_iter()
        .filter(|r| r.source_agent.id == *agent_id)
        .chain(
            target_records
                .into_iter()
                .filter(|r| r.target_agent.id == *agent_id),
        )
        .filter(|r| seen.insert(r.lineage_id.clone()))
        .collect();
    chain.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.lineage_id.cmp(&a.lineage_id))
    });
    chain
}

fn party(scorecard: &Scorecard) -> LineageParty {
    LineageParty {
        id: scorecard.agent_id.clone(),
        governance_framework: scorecard.governance_identity.governance_framework,
        trust_score: scorecard.trust_score,
        scorecard_id: Some(scorecard.scorecard_id.clone()),
    }
}

fn ensure_owner(agent_id: &AgentId, scorecard: &Scorecard) -> LineageResult<()> {
    if scorecard.agent_id != *agent_id {
        return Err(LineageError::ScorecardMismatch {
            expected: agent_id.clone(),
            found: scorecard.agent_id.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;
    use chrono::Duration;

    #[tokio::test]
    async fn delegation_is_signed_stored_and_indexed() {
        let h = harness();
        let a = h.scored("a", GovernanceFramework::Promethios, Some(0.9)).await;
        let b = h.scored("b", GovernanceFramework::Promethios, Some(0.8)).await;

        let record = h
            .lineage
            .create_lineage_record(&a.agent_id, &b.agent_id, &a, &b, TrustContext::default())
            .await
            .unwrap();
        assert!(record.is_signed());
        assert!(validate_lineage(&record).is_ok());
        assert_eq!(record.source_agent.scorecard_id.as_deref(), Some(a.scorecard_id.as_str()));

        assert!(h.lineage.has_delegated(&a.agent_id, &b.agent_id).await);
        assert!(!h.lineage.has_delegated(&b.agent_id, &a.agent_id).await);
        assert_eq!(h.lineage.delegations_from(&a.agent_id).await.len(), 1);
        assert_eq!(h.lineage.delegations_to(&b.agent_id).await.len(), 1);
        assert!(h.lineage.verify_lineage(&record.lineage_id).await);
        assert!(!h.lineage.verify_lineage("lineage-missing").await);
    }

    #[tokio::test]
    async fn delegation_requirements_are_enforced() {
        let h = harness();
        let unscored = h.scored("a", GovernanceFramework::Promethios, None).await;
        let weak = h.scored("w", GovernanceFramework::Promethios, Some(0.3)).await;
        let strong = h.scored("s", GovernanceFramework::Promethios, Some(0.9)).await;
        let unknown = h.scored("u", GovernanceFramework::Unknown, Some(0.9)).await;
        let ctx = TrustContext::default;

        let err = h
            .lineage
            .create_lineage_record(&unscored.agent_id, &strong.agent_id, &unscored, &strong, ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("null trust score"));

        let err = h
            .lineage
            .create_lineage_record(&weak.agent_id, &strong.agent_id, &weak, &strong, ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("below minimum threshold"));

        let err = h
            .lineage
            .create_lineage_record(&strong.agent_id, &unknown.agent_id, &strong, &unknown, ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown governance"));

        assert!(h.lineage.delegations_from(&strong.agent_id).await.is_empty());
    }

    #[tokio::test]
    async fn self_delegation_is_rejected() {
        let h = harness();
        let a = h.scored("a", GovernanceFramework::Promethios, Some(0.9)).await;
        let err = h
            .lineage
            .create_lineage_record(&a.agent_id, &a.agent_id, &a, &a, TrustContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LineageError::Schema(_)));
    }

    #[tokio::test]
    async fn scorecards_must_belong_to_the_parties() {
        let h = harness();
        let a = h.scored("a", GovernanceFramework::Promethios, Some(0.9)).await;
        let b = h.scored("b", GovernanceFramework::Promethios, Some(0.9)).await;
        let err = h
            .lineage
            .create_lineage_record(&a.agent_id, &AgentId::new("c"), &a, &b, TrustContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LineageError::ScorecardMismatch { .. }));
    }

    #[tokio::test]
    async fn unscored_source_scores_exactly_the_floor() {
        let h = harness();
        let a = h.scored("a", GovernanceFramework::Promethios, None).await;
        let b = h.scored("b", GovernanceFramework::Promethios, Some(1.0)).await;
        assert_eq!(
            h.lineage.calculate_delegation_score(&a, &b),
            h.lineage.config().min_delegation_score
        );
    }

    #[tokio::test]
    async fn governance_mismatch_lowers_the_score() {
        let h = harness();
        let a = h.scored("a", GovernanceFramework::Promethios, Some(0.9)).await;
        let same = h.scored("b", GovernanceFramework::Promethios, Some(0.8)).await;
        let foreign = h.scored("c", GovernanceFramework::ExternalVerified, Some(0.8)).await;

        let mut twin = same.clone();
        twin.governance_identity.constitution_hash = a.governance_identity.constitution_hash.clone();

        let shared_constitution = h.lineage.calculate_delegation_score(&a, &twin);
        let same_framework = h.lineage.calculate_delegation_score(&a, &same);
        let cross_framework = h.lineage.calculate_delegation_score(&a, &foreign);
        assert!(shared_constitution > same_framework);
        assert!(same_framework > cross_framework);
        assert!(cross_framework >= h.lineage.config().min_delegation_score);
    }

    #[test]
    fn chain_merges_both_directions_newest_first() {
        let now = Utc::now();
        let edge = |id: &str, src: &str, tgt: &str, age: i64| {
            let party = |agent: &str| LineageParty {
                id: AgentId::new(agent),
                governance_framework: GovernanceFramework::Promethios,
                trust_score: Some(0.8),
                scorecard_id: None,
            };
            TrustLineageRecord {
                schema_version: LINEAGE_SCHEMA_VERSION.into(),
                lineage_id: id.into(),
                source_agent: party(src),
                target_agent: party(tgt),
                timestamp: now - Duration::minutes(age),
                trust_context: TrustContext::default(),
                trust_metrics: TrustMetrics {
                    delegation_score: 0.8,
                },
                cryptographic_proof: CryptographicProof::unsigned(),
            }
        };

        let agent = AgentId::new("a");
        let chain = build_delegation_chain(
            &agent,
            vec![edge("l-1", "a", "b", 10), edge("l-x", "z", "b", 0)],
            vec![edge("l-2", "c", "a", 5), edge("l-1", "a", "b", 10)],
        );
        let ids: Vec<_> = chain.iter().map(|r| r.lineage_id.as_str()).collect();
        assert_eq!(ids, vec!["l-2", "l-1"]);
    }
}
