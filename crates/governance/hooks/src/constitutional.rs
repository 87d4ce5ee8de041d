//! Governance handlers for the eight lifecycle hooks.
//!
//! `beforeAgentExecution` guarantees every running agent carries a
//! governance identity and `beforeAgentInteraction` gates every message.
//! Memory hooks protect strict agents from external writes and keep the
//! memory-integrity attestation fresh. Reflection hooks only observe.

use crate::error::{HookError, HookResult};
use crate::registry::{HookEvent, HookHandler, HookManager, HookOutcome, HookPayload, MemoryOperation};
use governance_identity::{ContractExtension, ExtendOptions, GovernanceIdentityService};
use governance_types::{
    AgentContract, AgentDescriptor, AgentId, ComplianceLevel, InteractionKind, InteractionRecord,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

pub struct ConstitutionalHooks {
    identity: Arc<GovernanceIdentityService>,
    contracts: ContractExtension,
    manager: Option<Arc<dyn HookManager>>,
    registered: AtomicBool,
}

impl ConstitutionalHooks {
    pub fn new(
        identity: Arc<GovernanceIdentityService>,
        manager: Option<Arc<dyn HookManager>>,
    ) -> Self {
        Self {
            contracts: ContractExtension::new(identity.clone()),
            identity,
            manager,
            registered: AtomicBool::new(false),
        }
    }

    pub fn manager(&self) -> Option<&Arc<dyn HookManager>> {
        self.manager.as_ref()
    }

    /// Register all eight handlers with the hook manager. Returns `false`
    /// when no manager is configured or registration fails. Repeated calls
    /// after a successful registration return `true` without registering
    /// the handlers again.
    pub fn register_hooks(self: &Arc<Self>) -> bool {
        let Some(manager) = &self.manager else {
            warn!("No hook manager configured; governance hooks not registered");
            return false;
        };
        if self.registered.swap(true, Ordering::SeqCst) {
            debug!("Governance hooks already registered");
            return true;
        }

        for event in HookEvent::ALL {
            if let Err(e) = manager.register(event, self.handler(event)) {
                error!(event = %event, error = %e, "Failed to register governance hook");
                self.registered.store(false, Ordering::SeqCst);
                return false;
            }
        }
        info!(hooks = HookEvent::ALL.len(), "Registered governance hooks");
        true
    }

    fn handler(self: &Arc<Self>, event: HookEvent) -> HookHandler {
        // Handlers live in the manager this struct owns
        let this: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |payload: &mut HookPayload| match this.upgrade() {
            Some(hooks) => hooks.handle(event, payload),
            None => Ok(HookOutcome::Proceed),
        })
    }

    fn handle(&self, event: HookEvent, payload: &mut HookPayload) -> HookResult<HookOutcome> {
        let outcome = match (event, payload) {
            (HookEvent::BeforeAgentExecution, HookPayload::Execution { agent }) => {
                self.before_agent_execution(agent)
            }
            (
                HookEvent::BeforeAgentInteraction,
                HookPayload::Interaction {
                    source,
                    target,
                    confidence,
                },
            ) => self.before_agent_interaction(source, target, *confidence),
            (
                HookEvent::AfterAgentInteraction,
                HookPayload::InteractionCompleted {
                    source,
                    target,
                    outcome,
                },
            ) => self.after_agent_interaction(source, target, outcome.clone()),
            (HookEvent::ValidateAgentContract, HookPayload::Contract { contract }) => {
                self.validate_agent_contract(contract)
            }
            (
                HookEvent::BeforeMemoryAccess,
                HookPayload::MemoryAccess {
                    owner,
                    accessor,
                    operation,
                },
            ) => self.before_memory_access(owner, accessor, *operation),
            (HookEvent::AfterMemoryMutation, HookPayload::MemoryMutation { agent }) => {
                self.after_memory_mutation(agent)
            }
            (HookEvent::BeforeReflection, HookPayload::Reflection { agent_id, details }) => {
                self.before_reflection(agent_id, details)
            }
            (HookEvent::AfterReflection, HookPayload::Reflection { agent_id, details }) => {
                self.after_reflection(agent_id, details)
            }
            (event, payload) => {
                return Err(HookError::PayloadMismatch {
                    event,
                    received: payload.kind(),
                })
            }
        };
        Ok(outcome)
    }

    /// Make sure the agent carries a governance identity before it runs.
    pub fn before_agent_execution(&self, agent: &mut AgentDescriptor) -> HookOutcome {
        match self.identity.ensure_identity(agent) {
            Some(_) => HookOutcome::Proceed,
            None => {
                error!(agent_id = %agent.id, "Blocking execution of untagged agent");
                HookOutcome::Blocked {
                    reason: "Governance identity unavailable".to_string(),
                }
            }
        }
    }

    /// Verify compatibility and either reject or return the
    /// penalty-adjusted confidence together with the policy.
    pub fn before_agent_interaction(
        &self,
        source: &mut AgentDescriptor,
        target: &mut AgentDescriptor,
        confidence: f64,
    ) -> HookOutcome {
        let result = self
            .identity
            .verify_compatibility(Some(&mut *source), Some(&mut *target));
        if result.policy.is_rejected() {
            let reason = result
                .policy
                .explanation
                .or(result.reason)
                .unwrap_or_else(|| "Interaction rejected by governance policy".to_string());
            warn!(source = %source.id, target = %target.id, reason = %reason, "Interaction blocked");
            return HookOutcome::Blocked { reason };
        }

        HookOutcome::Adjusted {
            confidence: result.confidence_modifiers.apply(confidence),
            policy: result.policy,
            verification_id: result.verification_id,
        }
    }

    pub fn after_agent_interaction(
        &self,
        source: &AgentId,
        target: &AgentId,
        outcome: serde_json::Value,
    ) -> HookOutcome {
        let record = InteractionRecord::new(InteractionKind::Message, source.clone(), target.clone())
            .with_result(outcome);
        if !self.identity.record_interaction(record) {
            warn!(source = %source, target = %target, "Interaction was not recorded");
        }
        HookOutcome::Observed
    }

    /// Extend the contract with governance metadata and block it when the
    /// result does not validate.
    pub fn validate_agent_contract(&self, contract: &mut AgentContract) -> HookOutcome {
        if let Err(e) = self
            .contracts
            .extend_contract(contract, &ExtendOptions::default())
        {
            error!(agent_id = %contract.agent_id, error = %e, "Contract extension failed");
            return HookOutcome::Blocked {
                reason: format!("Contract extension failed: {}", e),
            };
        }

        let validation = self.contracts.validate_contract(contract);
        if validation.valid {
            HookOutcome::Proceed
        } else {
            HookOutcome::Blocked {
                reason: validation.errors.join("; "),
            }
        }
    }

    /// Reads are always allowed. A write from an external agent into a
    /// strict agent's memory is re-verified and blocked when incompatible.
    pub fn before_memory_access(
        &self,
        owner: &mut AgentDescriptor,
        accessor: &mut AgentDescriptor,
        operation: MemoryOperation,
    ) -> HookOutcome {
        if operation != MemoryOperation::Write || !accessor.is_external() {
            return HookOutcome::Proceed;
        }
        let owner_level = owner
            .governance_identity
            .as_ref()
            .map(|identity| identity.compliance_level)
            .or_else(|| {
                self.identity
                    .get_identity(&owner.id)
                    .map(|identity| identity.compliance_level)
            });
        if owner_level != Some(ComplianceLevel::Strict) {
            return HookOutcome::Proceed;
        }

        let result = self
            .identity
            .verify_compatibility(Some(&mut *owner), Some(&mut *accessor));
        if result.compatible {
            return HookOutcome::Proceed;
        }
        let reason = result
            .reason
            .unwrap_or_else(|| "Governance incompatibility".to_string());
        warn!(
            owner = %owner.id,
            accessor = %accessor.id,
            reason = %reason,
            "Blocked external memory write"
        );
        HookOutcome::Blocked { reason }
    }

    /// Refresh the memory-integrity attestation after every mutation.
    pub fn after_memory_mutation(&self, agent: &mut AgentDescriptor) -> HookOutcome {
        if self.identity.mark_memory_verified(agent).is_none() {
            debug!(agent_id = %agent.id, "Memory mutation on untagged agent");
        }
        HookOutcome::Observed
    }

    pub fn before_reflection(&self, agent_id: &AgentId, details: &serde_json::Value) -> HookOutcome {
        debug!(agent_id = %agent_id, details = %details, "Reflection starting");
        HookOutcome::Observed
    }

    pub fn after_reflection(&self, agent_id: &AgentId, details: &serde_json::Value) -> HookOutcome {
        debug!(agent_id = %agent_id, details = %details, "Reflection finished");
        HookOutcome::Observed
    }
}
