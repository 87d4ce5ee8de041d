//! Governance identity service.
//!
//! Tags agents with a governance identity, negotiates compatibility between
//! a source and a target, and turns failed trust requirements into an
//! interaction policy. Every verification is recorded in the interaction
//! history and announced on the event bus.
//!
//! Verification outcome per pair:
//!
//! ```text
//! unverified -> compatible
//!            -> incompatible (reject | restrict | proceed)
//! ```
//!
//! The transition is deterministic and terminal; nothing is retried.

use crate::config::IdentityConfig;
use crate::error::{IdentityError, IdentityResult};
use crate::events::{GovernanceEvent, GovernanceEventBus};
use crate::repository::{
    IdentityRepository, InMemoryIdentityRepository, InMemoryInteractionHistory,
    InteractionHistory,
};
use chrono::{DateTime, Duration, Utc};
use governance_crypto::{canonical_json, hash_content, sha256_hex, CryptographicVerifier};
use governance_types::{
    AgentDescriptor, AgentId, ComplianceLevel, CompatibilityResult, ConfidenceAdjustment,
    FallbackStrategy, GovernanceFramework, GovernanceIdentity, GovernanceProof, InteractionKind,
    InteractionPolicy, InteractionRecord, MemoryIntegrity, MemoryIntegrityKind, PolicyAction,
    Restriction, TimeWindow, TrustRequirements, UnmetRequirement,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything needed to issue an identity except the proof.
#[derive(Clone, Debug)]
pub(crate) struct IdentityDraft {
    pub agent_id: AgentId,
    pub framework: GovernanceFramework,
    pub constitution_hash: String,
    pub compliance_level: ComplianceLevel,
    pub memory_integrity: MemoryIntegrity,
    pub trust_requirements: TrustRequirements,
    pub fallback_strategy: FallbackStrategy,
}

impl IdentityDraft {
    /// Identity implied by an agent's declared capabilities.
    pub(crate) fn declared(agent: &AgentDescriptor, constitution_hash: String) -> Self {
        let caps = &agent.capabilities;
        let level = caps.implied_compliance_level();
        let memory_integrity = if caps.memory_integrity {
            MemoryIntegrity {
                kind: MemoryIntegrityKind::HashChain,
                verification_endpoint: None,
                last_verified: Some(Utc::now()),
            }
        } else {
            MemoryIntegrity::none()
        };
        let fallback_strategy = match level {
            ComplianceLevel::Strict | ComplianceLevel::Custom => FallbackStrategy::LogAndRestrict,
            _ => FallbackStrategy::LogAndProceed,
        };
        Self {
            agent_id: agent.id.clone(),
            framework: caps
                .governance_framework
                .unwrap_or(GovernanceFramework::Promethios),
            constitution_hash,
            compliance_level: level,
            memory_integrity,
            trust_requirements: TrustRequirements::from_capabilities(caps),
            fallback_strategy,
        }
    }

    /// Minimal identity for a counterpart that arrived without one.
    fn external(agent: &AgentDescriptor, constitution_hash: String) -> Self {
        Self {
            agent_id: agent.id.clone(),
            framework: GovernanceFramework::External,
            constitution_hash,
            compliance_level: ComplianceLevel::Minimal,
            memory_integrity: MemoryIntegrity::none(),
            trust_requirements: TrustRequirements::permissive(),
            fallback_strategy: FallbackStrategy::LogAndProceed,
        }
    }
}

pub struct GovernanceIdentityService {
    config: IdentityConfig,
    verifier: Arc<CryptographicVerifier>,
    identities: Arc<dyn IdentityRepository>,
    history: Arc<dyn InteractionHistory>,
    events: GovernanceEventBus,
}

impl GovernanceIdentityService {
    /// Service backed by in-memory repositories.
    pub fn new(config: IdentityConfig, verifier: Arc<CryptographicVerifier>) -> Self {
        Self::with_repositories(
            config,
            verifier,
            Arc::new(InMemoryIdentityRepository::new()),
            Arc::new(InMemoryInteractionHistory::new()),
        )
    }

    pub fn with_repositories(
        config: IdentityConfig,
        verifier: Arc<CryptographicVerifier>,
        identities: Arc<dyn IdentityRepository>,
        history: Arc<dyn InteractionHistory>,
    ) -> Self {
        let events = GovernanceEventBus::new(config.event_capacity);
        Self {
            config,
            verifier,
            identities,
            history,
            events,
        }
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    pub fn verifier(&self) -> &Arc<CryptographicVerifier> {
        &self.verifier
    }

    pub fn events(&self) -> &GovernanceEventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GovernanceEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Tagging
    // ------------------------------------------------------------------

    /// Attach a governance identity synthesized from the agent's declared
    /// capabilities. A no-op for an agent that is already tagged.
    pub fn tag_agent(&self, agent: Option<&mut AgentDescriptor>) -> Option<GovernanceIdentity> {
        let Some(agent) = agent else {
            warn!("Cannot tag an undefined agent");
            return None;
        };
        if let Some(identity) = self.existing_identity(agent) {
            return Some(identity);
        }

        let content = json!({
            "agent_id": agent.id,
            "name": agent.name,
            "capabilities": agent.capabilities,
        });
        let draft = match hash_content(&content) {
            Ok(hash) => IdentityDraft::declared(agent, hash),
            Err(e) => {
                error!(agent_id = %agent.id, error = %e, "Failed to hash agent content");
                return None;
            }
        };
        self.adopt(agent, draft)
    }

    /// Attach the minimal external identity (framework `external`,
    /// compliance `minimal`, no memory integrity).
    pub fn tag_external_agent(
        &self,
        agent: Option<&mut AgentDescriptor>,
    ) -> Option<GovernanceIdentity> {
        let Some(agent) = agent else {
            warn!("Cannot tag an undefined external agent");
            return None;
        };
        if let Some(identity) = self.existing_identity(agent) {
            return Some(identity);
        }

        let content = json!({
            "agent_id": agent.id,
            "name": agent.name,
            "origin": "external",
        });
        let draft = match hash_content(&content) {
            Ok(hash) => IdentityDraft::external(agent, hash),
            Err(e) => {
                error!(agent_id = %agent.id, error = %e, "Failed to hash agent content");
                return None;
            }
        };
        self.adopt(agent, draft)
    }

    /// Tag according to origin: external agents get the external identity.
    pub fn ensure_identity(&self, agent: &mut AgentDescriptor) -> Option<GovernanceIdentity> {
        if agent.is_external() {
            self.tag_external_agent(Some(agent))
        } else {
            self.tag_agent(Some(agent))
        }
    }

    pub fn get_identity(&self, agent_id: &AgentId) -> Option<GovernanceIdentity> {
        match self.identities.get(agent_id) {
            Ok(identity) => identity,
            Err(e) => {
                error!(agent_id = %agent_id, error = %e, "Identity lookup failed");
                None
            }
        }
    }

    /// Whether the identity's governance proof was issued by a known key
    /// and still matches the identity content.
    pub fn verify_identity_proof(&self, identity: &GovernanceIdentity) -> bool {
        match identity_digest(identity) {
            Ok(digest) => self.verifier.verify_bytes(
                digest.as_bytes(),
                &identity.governance_proof.signature,
                &identity.governance_proof.signed_by,
            ),
            Err(e) => {
                warn!(agent_id = %identity.agent_id, error = %e, "Cannot digest identity");
                false
            }
        }
    }

    fn existing_identity(&self, agent: &mut AgentDescriptor) -> Option<GovernanceIdentity> {
        if let Some(identity) = &agent.governance_identity {
            debug!(agent_id = %agent.id, "Agent already tagged");
            return Some(identity.clone());
        }
        let stored = self.get_identity(&agent.id)?;
        agent.governance_identity = Some(stored.clone());
        Some(stored)
    }

    fn adopt(&self, agent: &mut AgentDescriptor, draft: IdentityDraft) -> Option<GovernanceIdentity> {
        match self.register(draft) {
            Ok(identity) => {
                agent.governance_identity = Some(identity.clone());
                Some(identity)
            }
            Err(e) => {
                error!(agent_id = %agent.id, error = %e, "Failed to issue governance identity");
                None
            }
        }
    }

    /// Issue, sign and store an identity. If another caller stored one for
    /// the same agent first, that identity wins.
    pub(crate) fn register(&self, draft: IdentityDraft) -> IdentityResult<GovernanceIdentity> {
        let now = Utc::now();
        let mut identity = GovernanceIdentity {
            agent_id: draft.agent_id,
            governance_framework: draft.framework,
            constitution_hash: draft.constitution_hash,
            compliance_level: draft.compliance_level,
            memory_integrity: draft.memory_integrity,
            trust_requirements: draft.trust_requirements,
            confidence_modifiers: self.config.default_modifiers.clone(),
            fallback_strategy: draft.fallback_strategy,
            governance_proof: GovernanceProof {
                signed_by: String::new(),
                signature: String::new(),
                timestamp: now,
                valid_until: now + Duration::days(self.config.proof_validity_days),
            },
        };
        let digest = identity_digest(&identity)?;
        let (signature, key_id) = self.verifier.sign_bytes(digest.as_bytes())?;
        identity.governance_proof.signed_by = key_id;
        identity.governance_proof.signature = signature;

        let stored = self.identities.insert_if_absent(identity)?;
        info!(
            agent_id = %stored.agent_id,
            framework = %stored.governance_framework,
            compliance_level = %stored.compliance_level,
            "Tagged agent with governance identity"
        );
        self.events.publish(GovernanceEvent::AgentTagged {
            agent_id: stored.agent_id.clone(),
            framework: stored.governance_framework,
            at: now,
        });
        Ok(stored)
    }

    // ------------------------------------------------------------------
    // Compatibility
    // ------------------------------------------------------------------

    /// Negotiate whether `source` may interact with `target`.
    ///
    /// An untagged target is tagged as external; an untagged source is
    /// tagged according to its origin. Incompatibility is reported in the
    /// result, never as an error.
    pub fn verify_compatibility(
        &self,
        source: Option<&mut AgentDescriptor>,
        target: Option<&mut AgentDescriptor>,
    ) -> CompatibilityResult {
        let (Some(source), Some(target)) = (source, target) else {
            warn!("Governance verification requested with missing agent(s)");
            return CompatibilityResult::missing_agents();
        };

        if !target.is_tagged() {
            info!(agent_id = %target.id, "Target has no governance identity; tagging as external");
        }
        let target_identity = self.tag_external_agent(Some(target));
        let source_identity = self.ensure_identity(source);
        let (Some(source_identity), Some(target_identity)) = (source_identity, target_identity)
        else {
            return CompatibilityResult::unavailable("Governance identity unavailable");
        };

        let unmet = self.unmet_requirements(&source_identity, &target_identity);
        let first = unmet.first().cloned();
        let confidence_modifiers =
            self.calculate_confidence_modifiers(&source_identity, &target_identity);

        let (compatible, policy) = if self.config.enforces() {
            (
                unmet.is_empty(),
                self.determine_interaction_policy(&source_identity, &unmet),
            )
        } else {
            let mut policy = InteractionPolicy::proceed();
            policy.explanation = first.as_ref().map(|u| format!("audit-only: {}", u.reason()));
            (true, policy)
        };

        let verification_id = format!("verification-{}", Uuid::new_v4());
        let result = CompatibilityResult {
            compatible,
            reason: if compatible {
                None
            } else {
                first.as_ref().map(UnmetRequirement::reason)
            },
            unmet: first,
            confidence_modifiers,
            policy,
            verification_id: Some(verification_id.clone()),
        };

        self.record_verification(&source_identity, &target_identity, &result, &verification_id);
        result
    }

    /// First unmet requirement of `source` against `target`, evaluated in
    /// fixed order: memory integrity, reflection, belief trace, compliance level.
    pub fn check_trust_requirements(
        &self,
        source: &GovernanceIdentity,
        target: &GovernanceIdentity,
    ) -> Result<(), UnmetRequirement> {
        match evaluate_requirements(source, target, true).into_iter().next() {
            Some(unmet) => Err(unmet),
            None => Ok(()),
        }
    }

    /// Every unmet requirement, in evaluation order.
    pub fn unmet_requirements(
        &self,
        source: &GovernanceIdentity,
        target: &GovernanceIdentity,
    ) -> Vec<UnmetRequirement> {
        evaluate_requirements(source, target, false)
    }

    /// Confidence penalties for interacting with `target`, using the
    /// magnitudes configured on `source`. Zero for a promethios target with
    /// live memory integrity.
    pub fn calculate_confidence_modifiers(
        &self,
        source: &GovernanceIdentity,
        target: &GovernanceIdentity,
    ) -> ConfidenceAdjustment {
        if target.is_promethios() && target.memory_integrity.is_live() {
            return ConfidenceAdjustment::none();
        }

        let magnitudes = &source.confidence_modifiers;
        let mut adjustment = ConfidenceAdjustment::none();
        if matches!(
            target.governance_framework,
            GovernanceFramework::Unknown | GovernanceFramework::External
        ) {
            adjustment.unknown_governance = magnitudes.unknown_governance;
        }
        if !target.trust_requirements.reflection_enforced {
            adjustment.missing_reflection = magnitudes.missing_reflection;
        }
        if !target.trust_requirements.belief_trace {
            adjustment.missing_belief_trace = magnitudes.missing_belief_trace;
        }
        if !target.memory_integrity.is_live() {
            adjustment.missing_memory_integrity = magnitudes.missing_memory_integrity;
        }
        adjustment.total = (adjustment.unknown_governance
            + adjustment.missing_reflection
            + adjustment.missing_belief_trace
            + adjustment.missing_memory_integrity)
            .min(1.0);
        adjustment
    }

    /// Map unmet requirements onto the source's fallback strategy.
    pub fn determine_interaction_policy(
        &self,
        source: &GovernanceIdentity,
        unmet: &[UnmetRequirement],
    ) -> InteractionPolicy {
        let Some(first) = unmet.first() else {
            return InteractionPolicy::proceed();
        };
        let reason = first.reason();

        match source.fallback_strategy {
            FallbackStrategy::Reject => InteractionPolicy {
                action: PolicyAction::Reject,
                restrictions: Vec::new(),
                explanation: Some(reason),
            },
            FallbackStrategy::LogAndRestrict => restrict(unmet, reason),
            FallbackStrategy::LogAndProceed if self.config.allow_soft_fail => {
                warn!(
                    agent_id = %source.agent_id,
                    reason = %reason,
                    "Proceeding despite unmet trust requirements"
                );
                InteractionPolicy {
                    action: PolicyAction::Proceed,
                    restrictions: Vec::new(),
                    explanation: Some(reason),
                }
            }
            FallbackStrategy::LogAndProceed => {
                info!(
                    agent_id = %source.agent_id,
                    "Soft-fail disabled; escalating log-and-proceed to restrict"
                );
                restrict(unmet, reason)
            }
        }
    }

    fn record_verification(
        &self,
        source: &GovernanceIdentity,
        target: &GovernanceIdentity,
        result: &CompatibilityResult,
        verification_id: &str,
    ) {
        let record = InteractionRecord::new(
            InteractionKind::Verification,
            source.agent_id.clone(),
            target.agent_id.clone(),
        )
        .with_id(verification_id)
        .with_context(json!({
            "source_framework": source.governance_framework,
            "target_framework": target.governance_framework,
            "enforcement": self.config.enforcement,
        }))
        .with_result(serde_json::to_value(result).unwrap_or_default());
        self.record_interaction(record);

        let now = Utc::now();
        self.events.publish(GovernanceEvent::GovernanceVerified {
            verification_id: verification_id.to_string(),
            source_agent_id: source.agent_id.clone(),
            target_agent_id: target.agent_id.clone(),
            compatible: result.compatible,
            action: result.policy.action,
            at: now,
        });
        if result.policy.is_rejected() {
            self.events.publish(GovernanceEvent::InteractionRejected {
                source_agent_id: source.agent_id.clone(),
                target_agent_id: target.agent_id.clone(),
                reason: result.reason.clone().unwrap_or_default(),
                at: now,
            });
        }
        debug!(
            verification_id,
            source = %source.agent_id,
            target = %target.agent_id,
            compatible = result.compatible,
            "Recorded governance verification"
        );
    }

    // ------------------------------------------------------------------
    // History and attestation
    // ------------------------------------------------------------------

    /// Append to the interaction history. Failures are logged, not raised.
    pub fn record_interaction(&self, record: InteractionRecord) -> bool {
        match self.history.record(record) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to record interaction");
                false
            }
        }
    }

    pub fn interactions_for(&self, agent_id: &AgentId, window: TimeWindow) -> Vec<InteractionRecord> {
        self.history.for_agent(agent_id, window).unwrap_or_else(|e| {
            error!(agent_id = %agent_id, error = %e, "Interaction history query failed");
            Vec::new()
        })
    }

    pub fn verification_records(&self) -> Vec<InteractionRecord> {
        self.history
            .by_kind(InteractionKind::Verification)
            .unwrap_or_else(|e| {
                error!(error = %e, "Interaction history query failed");
                Vec::new()
            })
    }

    pub fn get_verification(&self, verification_id: &str) -> Option<InteractionRecord> {
        self.history.get(verification_id).ok().flatten()
    }

    /// Refresh `memory_integrity.last_verified` on the stored identity and
    /// on the descriptor. Returns the attestation time, or `None` for an
    /// untagged agent.
    pub fn mark_memory_verified(&self, agent: &mut AgentDescriptor) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        let identity = agent.governance_identity.as_mut()?;
        identity.memory_integrity.last_verified = Some(now);

        if let Err(e) = self.identities.mark_memory_verified(&agent.id, now) {
            error!(agent_id = %agent.id, error = %e, "Failed to persist memory attestation");
        }
        self.events.publish(GovernanceEvent::MemoryAttested {
            agent_id: agent.id.clone(),
            at: now,
        });
        Some(now)
    }
}

fn evaluate_requirements(
    source: &GovernanceIdentity,
    target: &GovernanceIdentity,
    first_only: bool,
) -> Vec<UnmetRequirement> {
    let required = &source.trust_requirements;
    let checks = [
        (required.memory_integrity && !target.memory_integrity.is_live())
            .then_some(UnmetRequirement::MemoryIntegrity),
        (required.reflection_enforced && !target.trust_requirements.reflection_enforced)
            .then_some(UnmetRequirement::Reflection),
        (required.belief_trace && !target.trust_requirements.belief_trace)
            .then_some(UnmetRequirement::BeliefTrace),
        (target.compliance_level < required.minimum_compliance_level).then(|| {
            UnmetRequirement::ComplianceLevel {
                required: required.minimum_compliance_level,
                actual: target.compliance_level,
            }
        }),
    ];

    let unmet = checks.into_iter().flatten();
    if first_only {
        unmet.take(1).collect()
    } else {
        unmet.collect()
    }
}

fn restrict(unmet: &[UnmetRequirement], reason: String) -> InteractionPolicy {
    let mut restrictions: Vec<Restriction> = Vec::new();
    for restriction in unmet.iter().map(UnmetRequirement::restriction) {
        if !restrictions.contains(&restriction) {
            restrictions.push(restriction);
        }
    }
    InteractionPolicy {
        action: PolicyAction::Restrict,
        restrictions,
        explanation: Some(reason),
    }
}

/// Digest the proof signs: the identity without its proof and without the
/// mutable `last_verified` timestamp.
fn identity_digest(identity: &GovernanceIdentity) -> IdentityResult<String> {
    let mut value =
        serde_json::to_value(identity).map_err(|e| IdentityError::Serialization(e.to_string()))?;
    if let Some(map) = value.as_object_mut() {
        map.remove("governance_proof");
        if let Some(memory) = map
            .get_mut("memory_integrity")
            .and_then(|m| m.as_object_mut())
        {
            memory.remove("last_verified");
        }
    }
    Ok(sha256_hex(canonical_json(&value).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnforcementMode;
    use governance_crypto::KeyStore;
    use governance_types::DeclaredCapabilities;
    use proptest::prelude::*;

    fn service(config: IdentityConfig) -> GovernanceIdentityService {
        let verifier = Arc::new(CryptographicVerifier::new(Arc::new(KeyStore::ephemeral())));
        GovernanceIdentityService::new(config, verifier)
    }

    fn strict_agent(id: &str) -> AgentDescriptor {
        AgentDescriptor::new(id, id).with_capabilities(
            DeclaredCapabilities::new()
                .with_memory_integrity()
                .with_reflection()
                .with_belief_trace(),
        )
    }

    #[test]
    fn tagging_synthesizes_identity_from_capabilities() {
        let svc = service(IdentityConfig::default());
        let mut agent = strict_agent("alpha");
        let identity = svc.tag_agent(Some(&mut agent)).unwrap();

        assert_eq!(identity.governance_framework, GovernanceFramework::Promethios);
        assert_eq!(identity.compliance_level, ComplianceLevel::Strict);
        assert_eq!(identity.memory_integrity.kind, MemoryIntegrityKind::HashChain);
        assert_eq!(identity.fallback_strategy, FallbackStrategy::LogAndRestrict);
        assert!(!identity.constitution_hash.is_empty());
        assert!(agent.is_tagged());
        assert!(svc.verify_identity_proof(&identity));
    }

    #[test]
    fn tagging_is_idempotent() {
        let svc = service(IdentityConfig::default());
        let mut agent = strict_agent("alpha");
        let first = svc.tag_agent(Some(&mut agent)).unwrap();
        let second = svc.tag_agent(Some(&mut agent)).unwrap();
        assert_eq!(first, second);
        assert_eq!(svc.events().count("agent_tagged"), 1);
    }

    #[test]
    fn tagging_nothing_returns_none() {
        let svc = service(IdentityConfig::default());
        assert!(svc.tag_agent(None).is_none());
        assert!(svc.tag_external_agent(None).is_none());
    }

    #[test]
    fn tampered_identity_fails_proof_check() {
        let svc = service(IdentityConfig::default());
        let mut agent = strict_agent("alpha");
        let mut identity = svc.tag_agent(Some(&mut agent)).unwrap();
        identity.compliance_level = ComplianceLevel::Custom;
        assert!(!svc.verify_identity_proof(&identity));
    }

    #[test]
    fn missing_agent_is_incompatible() {
        let svc = service(IdentityConfig::default());
        let mut agent = strict_agent("alpha");
        let result = svc.verify_compatibility(Some(&mut agent), None);
        assert!(!result.compatible);
        assert_eq!(result.reason.as_deref(), Some("Missing agent(s)"));
    }

    #[test]
    fn untagged_target_is_tagged_external_and_fails_memory_integrity() {
        let svc = service(IdentityConfig::default());
        let mut source = strict_agent("alpha");
        let mut target = AgentDescriptor::new("beta", "beta");

        let result = svc.verify_compatibility(Some(&mut source), Some(&mut target));
        assert!(!result.compatible);
        assert!(result.reason.unwrap().starts_with("Memory integrity"));
        assert_eq!(
            target.governance_identity.unwrap().governance_framework,
            GovernanceFramework::External
        );
        assert_eq!(result.policy.action, PolicyAction::Restrict);
        assert!(result.policy.restricts(Restriction::NoMemoryWrite));
        assert!(result.policy.restricts(Restriction::NoReflectionSharing));
    }

    #[test]
    fn requirements_are_checked_in_fixed_order() {
        let svc = service(IdentityConfig::default());
        let mut source = strict_agent("alpha");
        let mut target = AgentDescriptor::new("beta", "beta")
            .with_capabilities(DeclaredCapabilities::new().with_memory_integrity());
        let source_id = svc.tag_agent(Some(&mut source)).unwrap();
        let target_id = svc.tag_agent(Some(&mut target)).unwrap();

        let err = svc
            .check_trust_requirements(&source_id, &target_id)
            .unwrap_err();
        assert_eq!(err, UnmetRequirement::Reflection);

        let all = svc.unmet_requirements(&source_id, &target_id);
        assert_eq!(all.len(), 3);
        assert_eq!(all[1], UnmetRequirement::BeliefTrace);
        assert_eq!(
            all[2],
            UnmetRequirement::ComplianceLevel {
                required: ComplianceLevel::Standard,
                actual: ComplianceLevel::Minimal,
            }
        );
    }

    #[test]
    fn compatible_pair_proceeds_without_penalty() {
        let svc = service(IdentityConfig::default());
        let mut source = strict_agent("alpha");
        let mut target = strict_agent("beta");
        let result = svc.verify_compatibility(Some(&mut source), Some(&mut target));

        assert!(result.compatible);
        assert_eq!(result.policy, InteractionPolicy::proceed());
        assert_eq!(result.confidence_modifiers.total, 0.0);
        let id = result.verification_id.unwrap();
        assert!(svc.get_verification(&id).is_some());
        assert_eq!(svc.events().count("governance_verified"), 1);
    }

    #[test]
    fn reject_strategy_rejects_and_announces() {
        let svc = service(IdentityConfig::default());
        let mut source = strict_agent("alpha");
        let mut identity = svc.tag_agent(Some(&mut source)).unwrap();
        identity.fallback_strategy = FallbackStrategy::Reject;
        source.governance_identity = Some(identity);

        let mut target = AgentDescriptor::external("ext", "ext");
        let result = svc.verify_compatibility(Some(&mut source), Some(&mut target));
        assert!(result.policy.is_rejected());
        assert_eq!(svc.events().count("interaction_rejected"), 1);
    }

    #[test]
    fn log_and_proceed_honours_soft_fail_switch() {
        let mut source = AgentDescriptor::new("alpha", "alpha").with_capabilities(
            DeclaredCapabilities::new()
                .with_memory_integrity()
                .with_reflection(),
        );
        let svc = service(IdentityConfig::default());
        let mut target = AgentDescriptor::external("ext", "ext");
        let result = svc.verify_compatibility(Some(&mut source.clone()), Some(&mut target));
        assert!(!result.compatible);
        assert_eq!(result.policy.action, PolicyAction::Proceed);
        assert!(result.policy.explanation.is_some());

        let strict = service(IdentityConfig {
            allow_soft_fail: false,
            ..IdentityConfig::default()
        });
        let mut target = AgentDescriptor::external("ext", "ext");
        let result = strict.verify_compatibility(Some(&mut source), Some(&mut target));
        assert_eq!(result.policy.action, PolicyAction::Restrict);
    }

    #[test]
    fn audit_only_mode_reports_compatible() {
        let svc = service(IdentityConfig {
            enforcement: EnforcementMode::AuditOnly,
            ..IdentityConfig::default()
        });
        let mut source = strict_agent("alpha");
        let mut target = AgentDescriptor::external("ext", "ext");
        let result = svc.verify_compatibility(Some(&mut source), Some(&mut target));

        assert!(result.compatible);
        assert_eq!(result.unmet, Some(UnmetRequirement::MemoryIntegrity));
        assert_eq!(result.policy.action, PolicyAction::Proceed);
        assert!(result.confidence_modifiers.total > 0.0);
    }

    #[test]
    fn external_target_gets_full_penalty() {
        let svc = service(IdentityConfig::default());
        let mut source = strict_agent("alpha");
        let mut target = AgentDescriptor::external("ext", "ext");
        let source_id = svc.tag_agent(Some(&mut source)).unwrap();
        let target_id = svc.tag_external_agent(Some(&mut target)).unwrap();

        let adj = svc.calculate_confidence_modifiers(&source_id, &target_id);
        assert!((adj.unknown_governance - 0.3).abs() < 1e-9);
        assert!((adj.total - 0.8).abs() < 1e-9);
    }

    #[test]
    fn memory_attestation_refreshes_timestamp() {
        let svc = service(IdentityConfig::default());
        let mut agent = strict_agent("alpha");
        let before = svc
            .tag_agent(Some(&mut agent))
            .unwrap()
            .memory_integrity
            .last_verified;
        let at = svc.mark_memory_verified(&mut agent).unwrap();

        assert!(Some(at) >= before);
        let stored = svc.get_identity(&agent.id).unwrap();
        assert_eq!(stored.memory_integrity.last_verified, Some(at));
        assert!(svc.verify_identity_proof(&stored));
    }

    #[test]
    fn history_is_queryable_by_agent() {
        let svc = service(IdentityConfig::default());
        let mut a = strict_agent("alpha");
        let mut b = strict_agent("beta");
        svc.verify_compatibility(Some(&mut a), Some(&mut b));
        svc.verify_compatibility(Some(&mut b), Some(&mut a));

        assert_eq!(svc.interactions_for(&a.id, TimeWindow::all()).len(), 2);
        assert_eq!(svc.verification_records().len(), 2);
    }

    proptest! {
        #[test]
        fn fully_governed_target_satisfies_any_source(
            memory in any::<bool>(),
            reflection in any::<bool>(),
            belief in any::<bool>(),
        ) {
            let svc = service(IdentityConfig::default());
            let mut caps = DeclaredCapabilities::new();
            caps.memory_integrity = memory;
            caps.reflection = reflection;
            caps.belief_trace = belief;
            let mut source = AgentDescriptor::new("src", "src").with_capabilities(caps);
            let mut target = strict_agent("tgt");

            let result = svc.verify_compatibility(Some(&mut source), Some(&mut target));
            prop_assert!(result.compatible);
            prop_assert_eq!(result.confidence_modifiers.total, 0.0);
        }

        #[test]
        fn penalty_total_stays_in_unit_range(
            reflection in any::<bool>(),
            belief in any::<bool>(),
        ) {
            let svc = service(IdentityConfig::default());
            let mut source = strict_agent("src");
            let mut caps = DeclaredCapabilities::new()
                .with_framework(GovernanceFramework::Unknown);
            caps.reflection = reflection;
            caps.belief_trace = belief;
            let mut target = AgentDescriptor::new("tgt", "tgt").with_capabilities(caps);

            let result = svc.verify_compatibility(Some(&mut source), Some(&mut target));
            prop_assert!(result.confidence_modifiers.total >= 0.0);
            prop_assert!(result.confidence_modifiers.total <= 1.0);
        }
    }
}
