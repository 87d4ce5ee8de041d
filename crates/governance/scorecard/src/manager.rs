//! Scorecard assembly, scoring and persistence.

use crate::config::ScorecardConfig;
use crate::error::{ScorecardError, ScorecardResult};
use crate::providers::{PrismProvider, StaticPrismProvider, StaticVigilProvider, VigilProvider};
use chrono::{DateTime, Utc};
use governance_crypto::CryptographicVerifier;
use governance_storage::{ScorecardStore, TrustStorage};
use governance_types::schema::validate_scorecard;
use governance_types::{
    AgentId, BeliefTraceIntegrity, CryptographicProof, GovernanceFramework, GovernanceIdentity,
    PrismMetrics, ReflectionCompliance, Scorecard, TimeWindow, VigilMetrics, ViolationHistory,
    WarningLevel, WarningState, SCORECARD_SCHEMA_VERSION,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Builds, signs and stores trust scorecards.
pub struct ScorecardManager {
    config: ScorecardConfig,
    verifier: Arc<CryptographicVerifier>,
    store: Arc<dyn TrustStorage>,
    prism: Arc<dyn PrismProvider>,
    vigil: Arc<dyn VigilProvider>,
}

impl ScorecardManager {
    /// Manager without metric sources; every agent reads as unmeasured.
    pub fn new(
        config: ScorecardConfig,
        verifier: Arc<CryptographicVerifier>,
        store: Arc<dyn TrustStorage>,
    ) -> Self {
        Self {
            config,
            verifier,
            store,
            prism: Arc::new(StaticPrismProvider::new()),
            vigil: Arc::new(StaticVigilProvider::new()),
        }
    }

    pub fn with_providers(
        mut self,
        prism: Arc<dyn PrismProvider>,
        vigil: Arc<dyn VigilProvider>,
    ) -> Self {
        self.prism = prism;
        self.vigil = vigil;
        self
    }

    pub fn config(&self) -> &ScorecardConfig {
        &self.config
    }

    pub fn verifier(&self) -> &Arc<CryptographicVerifier> {
        &self.verifier
    }

    pub fn store(&self) -> &Arc<dyn TrustStorage> {
        &self.store
    }

    /// Assemble an unsigned scorecard.
    ///
    /// Missing metrics count as zero. The result is schema-validated; an
    /// invalid assembly is the only error this returns.
    pub fn create_scorecard(
        &self,
        agent_id: &AgentId,
        identity: &GovernanceIdentity,
        trust_score: Option<f64>,
        prism: Option<&PrismMetrics>,
        vigil: Option<&VigilMetrics>,
    ) -> ScorecardResult<Scorecard> {
        let now = Utc::now();
        let prism = prism.cloned().unwrap_or_default();
        let vigil = vigil.cloned().unwrap_or_default();

        let scorecard = Scorecard {
            schema_version: SCORECARD_SCHEMA_VERSION.to_string(),
            agent_id: agent_id.clone(),
            scorecard_id: format!("scorecard-{}", uuid::Uuid::new_v4()),
            timestamp: now,
            governance_identity: identity.clone(),
            trust_score,
            reflection_compliance: ReflectionCompliance {
                percentage: percentage(prism.reflection.compliant, prism.reflection.total),
                total: prism.reflection.total,
                compliant: prism.reflection.compliant,
            },
            belief_trace_integrity: BeliefTraceIntegrity {
                percentage: percentage(prism.belief_trace.verified, prism.belief_trace.total),
                total: prism.belief_trace.total,
                verified: prism.belief_trace.verified,
            },
            violation_history: self.violation_history(&vigil),
            warning_state: self.warning_state(identity, trust_score, now),
            cryptographic_proof: CryptographicProof::unsigned(),
        };

        validate_scorecard(&scorecard)?;
        Ok(scorecard)
    }

    fn violation_history(&self, vigil: &VigilMetrics) -> ViolationHistory {
        let mut categories = BTreeMap::new();
        for violation in &vigil.violations {
            *categories.entry(violation.category.clone()).or_insert(0u64) += 1;
        }
        let mut recent = vigil.violations.clone();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(self.config.recent_violation_limit);
        ViolationHistory {
            count: vigil.violations.len() as u64,
            categories,
            recent,
        }
    }

    /// First matching rule wins: unknown or invalid governance, then
    /// unverified external governance, then a low trust score.
    fn warning_state(
        &self,
        identity: &GovernanceIdentity,
        trust_score: Option<f64>,
        now: DateTime<Utc>,
    ) -> WarningState {
        if identity.is_invalid(now) {
            return WarningState::raised(
                WarningLevel::Severe,
                "Unknown or invalid governance identity",
            );
        }
        if identity.governance_framework == GovernanceFramework::External {
            return WarningState::raised(WarningLevel::Warning, "External governance is unverified");
        }
        match trust_score {
            Some(score) if score < self.config.caution_threshold => WarningState::raised(
                WarningLevel::Caution,
                format!(
                    "Trust score {:.2} is below {:.2}",
                    score, self.config.caution_threshold
                ),
            ),
            _ => WarningState::none(),
        }
    }

    /// Weighted trust score in [0, 1], or `None` when the agent has no
    /// metrics at all. A non-finite trust decay counts as full decay.
    pub fn calculate_trust_score(&self, prism: &PrismMetrics, vigil: &VigilMetrics) -> Option<f64> {
        let decay = if vigil.trust_decay.is_finite() {
            vigil.trust_decay.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let measured = prism.reflection.total > 0
            || prism.belief_trace.total > 0
            || !vigil.violations.is_empty()
            || decay > 0.0;
        if !measured {
            return None;
        }

        let weights = &self.config.weights;
        let reflection = ratio(prism.reflection.compliant, prism.reflection.total);
        let belief = ratio(prism.belief_trace.verified, prism.belief_trace.total);
        let saturation = self.config.violation_saturation.max(1);
        let violations = 1.0 - vigil.violations.len().min(saturation) as f64 / saturation as f64;

        let score = weights.reflection * reflection
            + weights.belief_trace * belief
            + weights.violations * violations
            - decay;
        Some(score.clamp(0.0, 1.0))
    }

    /// Persist a signed scorecard. Unsigned or schema-invalid scorecards
    /// are refused with an error; backend failures are logged and
    /// reported as `false`.
    pub async fn store_scorecard(&self, scorecard: Scorecard) -> ScorecardResult<bool> {
        if !scorecard.is_signed() {
            return Err(ScorecardError::Unsigned(scorecard.scorecard_id));
        }
        validate_scorecard(&scorecard)?;

        let agent_id = scorecard.agent_id.clone();
        let scorecard_id = scorecard.scorecard_id.clone();
        match self.store.store_scorecard(scorecard).await {
            Ok(()) => {
                debug!(agent_id = %agent_id, scorecard_id = %scorecard_id, "Stored scorecard");
                Ok(true)
            }
            Err(e) => {
                error!(
                    agent_id = %agent_id,
                    scorecard_id = %scorecard_id,
                    error = %e,
                    "Failed to store scorecard"
                );
                Ok(false)
            }
        }
    }

    /// Pull metrics, score, assemble, sign and store a fresh scorecard.
    pub async fn generate_scorecard(
        &self,
        agent_id: &AgentId,
        identity: &GovernanceIdentity,
    ) -> ScorecardResult<Scorecard> {
        let prism = match self.prism.agent_metrics(agent_id).await {
            Ok(metrics) => metrics.unwrap_or_default(),
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "PRISM metrics unavailable");
                PrismMetrics::default()
            }
        };
        let vigil = match self.vigil.agent_metrics(agent_id).await {
            Ok(metrics) => metrics.unwrap_or_default(),
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "VIGIL metrics unavailable");
                VigilMetrics::default()
            }
        };

        let trust_score = self.calculate_trust_score(&prism, &vigil);
        let scorecard =
            self.create_scorecard(agent_id, identity, trust_score, Some(&prism), Some(&vigil))?;
        let signed = self.verifier.sign_scorecard(scorecard)?;
        self.store.store_scorecard(signed.clone()).await?;

        info!(
            agent_id = %agent_id,
            scorecard_id = %signed.scorecard_id,
            trust_score = ?signed.trust_score,
            warning = ?signed.warning_state.level,
            "Generated scorecard"
        );
        Ok(signed)
    }

    /// Latest scorecard, or `None` when absent or unreadable.
    pub async fn get_latest_scorecard(&self, agent_id: &AgentId) -> Option<Scorecard> {
        match self.store.latest_scorecard(agent_id).await {
            Ok(scorecard) => scorecard,
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Failed to read latest scorecard");
                None
            }
        }
    }

    pub async fn get_scorecard(&self, agent_id: &AgentId, scorecard_id: &str) -> Option<Scorecard> {
        match self.store.get_scorecard(agent_id, scorecard_id).await {
            Ok(scorecard) => scorecard,
            Err(e) => {
                warn!(agent_id = %agent_id, scorecard_id, error = %e, "Failed to read scorecard");
                None
            }
        }
    }

    /// Newest-first history of an agent's scorecards.
    pub async fn get_scorecard_history(
        &self,
        agent_id: &AgentId,
        limit: Option<usize>,
    ) -> Vec<Scorecard> {
        match self
            .store
            .scorecard_history(agent_id, TimeWindow::all(), limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Failed to read scorecard history");
                Vec::new()
            }
        }
    }

    /// Verify the agent's latest scorecard; `false` when there is none.
    pub async fn verify_latest(&self, agent_id: &AgentId) -> bool {
        match self.get_latest_scorecard(agent_id).await {
            Some(scorecard) => self.verifier.verify_scorecard(&scorecard),
            None => false,
        }
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part.min(total) as f64) / (total as f64)
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    ratio(part, total) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, identity, prism, violation};
    use proptest::prelude::*;

    #[test]
    fn missing_metrics_default_to_zero() {
        let h = harness();
        let agent = AgentId::new("alpha");
        let sc = h
            .manager
            .create_scorecard(
                &agent,
                &identity("alpha", GovernanceFramework::Promethios),
                Some(0.9),
                None,
                None,
            )
            .unwrap();
        assert_eq!(sc.reflection_compliance.percentage, 0.0);
        assert_eq!(sc.violation_history.count, 0);
        assert_eq!(sc.warning_state.level, WarningLevel::None);
        assert!(!sc.is_signed());
    }

    #[test]
    fn warning_cascade_takes_first_match() {
        let h = harness();
        let agent = AgentId::new("alpha");
        let level = |framework, score| {
            h.manager
                .create_scorecard(&agent, &identity("alpha", framework), score, None, None)
                .unwrap()
                .warning_state
                .level
        };

        assert_eq!(level(GovernanceFramework::Unknown, Some(0.99)), WarningLevel::Severe);
        assert_eq!(level(GovernanceFramework::External, Some(0.1)), WarningLevel::Warning);
        assert_eq!(level(GovernanceFramework::Promethios, Some(0.5)), WarningLevel::Caution);
        assert_eq!(level(GovernanceFramework::ExternalVerified, Some(0.8)), WarningLevel::None);
        assert_eq!(level(GovernanceFramework::Promethios, None), WarningLevel::None);
    }

    #[test]
    fn lapsed_proof_is_severe() {
        let h = harness();
        let mut id = identity("alpha", GovernanceFramework::Promethios);
        id.governance_proof.valid_until = Utc::now() - chrono::Duration::days(1);
        let sc = h
            .manager
            .create_scorecard(&AgentId::new("alpha"), &id, Some(0.9), None, None)
            .unwrap();
        assert_eq!(sc.warning_state.level, WarningLevel::Severe);
    }

    #[test]
    fn invalid_assembly_lists_violations() {
        let h = harness();
        let err = h
            .manager
            .create_scorecard(
                &AgentId::new("alpha"),
                &identity("alpha", GovernanceFramework::Promethios),
                Some(1.4),
                None,
                None,
            )
            .unwrap_err();
        match err {
            ScorecardError::Schema(e) => assert!(!e.violations().is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn violations_are_categorised_and_trimmed() {
        let h = harness();
        let vigil = VigilMetrics {
            trust_decay: 0.0,
            violations: (0..7)
                .map(|i| violation(if i % 2 == 0 { "privacy" } else { "safety" }, i))
                .collect(),
        };
        let sc = h
            .manager
            .create_scorecard(
                &AgentId::new("alpha"),
                &identity("alpha", GovernanceFramework::Promethios),
                None,
                None,
                Some(&vigil),
            )
            .unwrap();
        assert_eq!(sc.violation_history.count, 7);
        assert_eq!(sc.violation_history.categories["privacy"], 4);
        assert_eq!(sc.violation_history.recent.len(), 5);
        assert!(sc.violation_history.recent[0].timestamp >= sc.violation_history.recent[1].timestamp);
    }

    #[test]
    fn trust_score_needs_metrics() {
        let h = harness();
        assert_eq!(
            h.manager
                .calculate_trust_score(&PrismMetrics::default(), &VigilMetrics::default()),
            None
        );

        let perfect = h
            .manager
            .calculate_trust_score(&prism((10, 10), (10, 10)), &VigilMetrics::default())
            .unwrap();
        assert!((perfect - 1.0).abs() < 1e-9);

        let decayed = h
            .manager
            .calculate_trust_score(
                &prism((10, 10), (10, 10)),
                &VigilMetrics {
                    trust_decay: 0.25,
                    violations: vec![violation("safety", 1)],
                },
            )
            .unwrap();
        assert!(decayed < perfect);
    }

    #[test]
    fn non_finite_decay_is_full_decay() {
        let h = harness();
        for decay in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let vigil = VigilMetrics {
                trust_decay: decay,
                violations: Vec::new(),
            };
            assert_eq!(
                h.manager.calculate_trust_score(&PrismMetrics::default(), &vigil),
                Some(0.0)
            );
            let score = h
                .manager
                .calculate_trust_score(&prism((10, 10), (10, 10)), &vigil)
                .unwrap();
            assert!(score.is_finite());
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[tokio::test]
    async fn unsigned_scorecards_are_refused() {
        let h = harness();
        let sc = h
            .manager
            .create_scorecard(
                &AgentId::new("alpha"),
                &identity("alpha", GovernanceFramework::Promethios),
                Some(0.9),
                None,
                None,
            )
            .unwrap();
        assert!(matches!(
            h.manager.store_scorecard(sc).await,
            Err(ScorecardError::Unsigned(_))
        ));
        assert!(h.manager.get_latest_scorecard(&AgentId::new("alpha")).await.is_none());
    }

    #[tokio::test]
    async fn storage_conflict_reports_false() {
        let h = harness();
        let signed = h.scored("alpha", GovernanceFramework::Promethios, Some(0.9)).await;
        assert!(!h.manager.store_scorecard(signed).await.unwrap());
    }

    #[tokio::test]
    async fn generated_scorecards_are_signed_and_latest() {
        let h = harness();
        let prism_source = Arc::new(StaticPrismProvider::new());
        prism_source.set(AgentId::new("alpha"), prism((4, 3), (2, 2)));
        let manager = ScorecardManager::new(
            ScorecardConfig::default(),
            h.verifier.clone(),
            h.store.clone(),
        )
        .with_providers(prism_source, Arc::new(StaticVigilProvider::new()));

        let agent = AgentId::new("alpha");
        let sc = manager
            .generate_scorecard(&agent, &identity("alpha", GovernanceFramework::Promethios))
            .await
            .unwrap();
        assert!(sc.is_signed());
        assert_eq!(sc.reflection_compliance.percentage, 75.0);
        assert!(sc.trust_score.is_some());

        let latest = manager.get_latest_scorecard(&agent).await.unwrap();
        assert_eq!(latest.scorecard_id, sc.scorecard_id);
        assert!(manager.verify_latest(&agent).await);
        assert_eq!(h.store.list_agents().await.unwrap(), vec![agent]);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let h = harness();
        let first = h.scored("alpha", GovernanceFramework::Promethios, Some(0.7)).await;
        let second = h.scored("alpha", GovernanceFramework::Promethios, Some(0.8)).await;
        let agent = AgentId::new("alpha");

        let history = h.manager.get_scorecard_history(&agent, None).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].scorecard_id, second.scorecard_id);
        assert!(h
            .manager
            .get_scorecard(&agent, &first.scorecard_id)
            .await
            .is_some());
        assert_eq!(h.manager.get_scorecard_history(&agent, Some(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn tampered_latest_fails_verification() {
        let h = harness();
        let mut sc = h.scored("alpha", GovernanceFramework::Promethios, Some(0.7)).await;
        sc.scorecard_id = "scorecard-forged".into();
        sc.trust_score = Some(1.0);
        h.store.store_scorecard(sc).await.unwrap();
        assert!(!h.manager.verify_latest(&AgentId::new("alpha")).await);
        assert!(!h.manager.verify_latest(&AgentId::new("nobody")).await);
    }

    #[tokio::test]
    async fn file_backed_scorecards_verify_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = Arc::new(CryptographicVerifier::new(Arc::new(
            governance_crypto::KeyStore::ephemeral(),
        )));
        let store: Arc<dyn TrustStorage> = Arc::new(
            governance_storage::FileTrustStorage::open(dir.path())
                .await
                .unwrap(),
        );
        let manager = ScorecardManager::new(ScorecardConfig::default(), verifier.clone(), store);

        let mut scores = vec![0.9856906946328695, 0.1 + 0.2, 1.0 / 3.0, 0.7071067811865476];
        scores.extend((1..200).map(|i| (i as f64 * 0.618_033_988_749_894_9).fract()));
        for (i, score) in scores.into_iter().enumerate() {
            let agent = format!("agent-{}", i);
            let sc = manager
                .create_scorecard(
                    &AgentId::new(&agent),
                    &identity(&agent, GovernanceFramework::Promethios),
                    Some(score),
                    None,
                    None,
                )
                .unwrap();
            let signed = verifier.sign_scorecard(sc).unwrap();
            assert!(manager.store_scorecard(signed).await.unwrap());
        }

        let reopened: Arc<dyn TrustStorage> = Arc::new(
            governance_storage::FileTrustStorage::open(dir.path())
                .await
                .unwrap(),
        );
        let manager = ScorecardManager::new(ScorecardConfig::default(), verifier, reopened);
        for i in 0..203 {
            let agent = AgentId::new(format!("agent-{}", i));
            assert!(manager.verify_latest(&agent).await, "{} failed verification", agent);
        }
    }

    proptest! {
        #[test]
        fn trust_score_stays_in_unit_interval(
            r in (0u64..50, 0u64..50),
            b in (0u64..50, 0u64..50),
            decay in 0.0f64..2.0,
            violations in 0usize..30,
        ) {
            let h = harness();
            let vigil = VigilMetrics {
                trust_decay: decay,
                violations: (0..violations).map(|i| violation("safety", i as i64)).collect(),
            };
            if let Some(score) = h.manager.calculate_trust_score(&prism(r, b), &vigil) {
                prop_assert!((0.0..=1.0).contains(&score));
            }
        }
    }
}
