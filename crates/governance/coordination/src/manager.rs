//! Coordination contexts: governed agent membership, role-gated task
//! flow and the metrics derived from them.

use crate::config::CoordinationConfig;
use crate::error::{CoordinationError, CoordinationResult};
use crate::metrics::{
    agent_performance, cohorts, message_traffic, ratio, CoordinationMetrics, GovernanceContrast,
    TrustBoundaries, TrustLevel,
};
use crate::model::{
    ContextConfig, CoordinationContext, CoordinationMessage, MessageKind, Permission,
    RegisteredAgent, TaskAllocation, TaskRequest, TaskStatus,
};
use crate::ports::{
    AgentRegistry, CandidatePool, InMemoryAgentRegistry, InMemoryMessageBus, InMemoryRoleManager,
    InMemoryTaskAllocator, MessageBus, RoleManager, TaskAllocator,
};
use chrono::Utc;
use governance_identity::GovernanceIdentityService;
use governance_types::{AgentDescriptor, AgentId, GovernanceFramework};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub struct CoordinationManager {
    config: CoordinationConfig,
    identity: Arc<GovernanceIdentityService>,
    roles: Arc<dyn RoleManager>,
    registry: Arc<dyn AgentRegistry>,
    allocator: Arc<dyn TaskAllocator>,
    bus: Arc<dyn MessageBus>,
    contexts: RwLock<HashMap<String, CoordinationContext>>,
}

impl CoordinationManager {
    /// Manager backed by the in-process ports.
    pub fn new(config: CoordinationConfig, identity: Arc<GovernanceIdentityService>) -> Self {
        let bus = Arc::new(InMemoryMessageBus::new(config.message_capacity));
        Self::with_ports(
            config,
            identity,
            Arc::new(InMemoryRoleManager::new()),
            Arc::new(InMemoryAgentRegistry::new()),
            Arc::new(InMemoryTaskAllocator::new()),
            bus,
        )
    }

    pub fn with_ports(
        config: CoordinationConfig,
        identity: Arc<GovernanceIdentityService>,
        roles: Arc<dyn RoleManager>,
        registry: Arc<dyn AgentRegistry>,
        allocator: Arc<dyn TaskAllocator>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            config,
            identity,
            roles,
            registry,
            allocator,
            bus,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationMessage> {
        self.bus.subscribe()
    }

    // ------------------------------------------------------------------
    // Context lifecycle
    // ------------------------------------------------------------------

    pub fn create_coordination_context(
        &self,
        config: ContextConfig,
    ) -> CoordinationResult<CoordinationContext> {
        let id = format!("context-{}", uuid::Uuid::new_v4());
        let roles = self.roles.define_roles(&id, &config.roles)?;

        if let Some(default_role) = &config.default_role {
            if !roles.iter().any(|r| &r.name == default_role) {
                self.roles.remove_context(&id);
                return Err(CoordinationError::InvalidRole(format!(
                    "default role {default_role} is not defined"
                )));
            }
        }

        let context = CoordinationContext {
            id: id.clone(),
            name: config.name,
            roles: roles.into_iter().map(|r| r.name).collect(),
            default_role: config.default_role,
            created_at: Utc::now(),
        };
        self.contexts
            .write()
            .map_err(|_| CoordinationError::LockPoisoned("contexts"))?
            .insert(id.clone(), context.clone());

        info!(context_id = %id, name = %context.name, roles = ?context.roles, "Coordination context created");
        Ok(context)
    }

    pub fn get_context(&self, context_id: &str) -> Option<CoordinationContext> {
        self.contexts.read().ok()?.get(context_id).cloned()
    }

    /// Remove a context and everything recorded under it. Later calls
    /// against the context fail with [`CoordinationError::ContextNotFound`].
    pub fn teardown_context(&self, context_id: &str) -> bool {
        let removed = match self.contexts.write() {
            Ok(mut contexts) => contexts.remove(context_id).is_some(),
            Err(_) => {
                warn!(context_id, "Context map poisoned during teardown");
                return false;
            }
        };
        if removed {
            self.roles.remove_context(context_id);
            self.registry.remove_context(context_id);
            self.allocator.remove_context(context_id);
            self.bus.remove_context(context_id);
            info!(context_id, "Coordination context torn down");
        }
        removed
    }

    fn context(&self, context_id: &str) -> CoordinationResult<CoordinationContext> {
        self.get_context(context_id)
            .ok_or_else(|| CoordinationError::ContextNotFound(context_id.to_string()))
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Register `agent`, tagging it with a governance identity if it has
    /// none. A role that cannot be assigned leaves the agent registered
    /// without one.
    pub fn register_agent(
        &self,
        context_id: &str,
        agent: &mut AgentDescriptor,
        role: Option<&str>,
    ) -> CoordinationResult<RegisteredAgent> {
        let context = self.context(context_id)?;

        let identity = self.identity.ensure_identity(agent);
        let (framework, governed) = match &identity {
            Some(identity) => {
                let proof_ok = self.identity.verify_identity_proof(identity)
                    && !identity.is_invalid(Utc::now());
                if !proof_ok {
                    warn!(agent_id = %agent.id, "Governance proof did not verify");
                }
                (
                    identity.governance_framework,
                    proof_ok && identity.is_promethios(),
                )
            }
            None => {
                warn!(agent_id = %agent.id, "Registering agent without governance identity");
                (GovernanceFramework::Unknown, false)
            }
        };

        let mut registered = RegisteredAgent {
            agent_id: agent.id.clone(),
            name: agent.name.clone(),
            governance_framework: framework,
            governed,
            role: None,
            registered_at: Utc::now(),
        };
        self.registry.register(context_id, registered.clone())?;

        if let Some(role) = role.map(str::to_string).or(context.default_role) {
            match self
                .roles
                .assign_role(context_id, &agent.id, &role)
                .and_then(|()| self.registry.update_role(context_id, &agent.id, Some(role.clone())))
            {
                Ok(()) => registered.role = Some(role),
                Err(e) => {
                    warn!(context_id, agent_id = %agent.id, role = %role, error = %e, "Role assignment failed");
                }
            }
        }

        info!(
            context_id,
            agent_id = %agent.id,
            framework = %framework,
            governed,
            role = ?registered.role,
            "Agent registered"
        );
        Ok(registered)
    }

    fn require_permission(
        &self,
        context_id: &str,
        agent_id: &AgentId,
        permission: Permission,
    ) -> CoordinationResult<()> {
        if self.registry.get(context_id, agent_id).is_none() {
            return Err(CoordinationError::AgentNotRegistered {
                agent: agent_id.clone(),
                context: context_id.to_string(),
            });
        }
        let allowed = self
            .roles
            .role_of(context_id, agent_id)
            .map(|role| role.allows(permission))
            .unwrap_or(false);
        if allowed {
            Ok(())
        } else {
            Err(CoordinationError::PermissionDenied {
                agent: agent_id.clone(),
                permission: permission.to_string(),
            })
        }
    }

    /// Whether `agent_id` may read, or with `write` also modify, the
    /// context's shared memory.
    pub fn check_memory_access(
        &self,
        context_id: &str,
        agent_id: &AgentId,
        write: bool,
    ) -> CoordinationResult<()> {
        self.context(context_id)?;
        let permission = if write {
            Permission::WriteMemory
        } else {
            Permission::ReadMemory
        };
        self.require_permission(context_id, agent_id, permission)
    }

    // ------------------------------------------------------------------
    // Tasks and messages
    // ------------------------------------------------------------------

    pub fn submit_task(
        &self,
        context_id: &str,
        submitter: &AgentId,
        task: TaskRequest,
    ) -> CoordinationResult<TaskAllocation> {
        self.context(context_id)?;
        self.require_permission(context_id, submitter, Permission::AssignTasks)?;

        let pools = if task.target_roles.is_empty() {
            let reporters = self
                .registry
                .agents(context_id)
                .into_iter()
                .map(|a| a.agent_id)
                .filter(|id| {
                    self.roles
                        .role_of(context_id, id)
                        .is_some_and(|r| r.allows(Permission::ReportResults))
                })
                .collect();
            vec![CandidatePool {
                role: None,
                agents: reporters,
            }]
        } else {
            task.target_roles
                .iter()
                .map(|role| CandidatePool {
                    role: Some(role.clone()),
                    agents: self.roles.agents_with_role(context_id, role),
                })
                .collect()
        };

        let allocation = self.allocator.allocate(context_id, submitter, &task, &pools)?;

        let message = CoordinationMessage::new(
            context_id,
            MessageKind::TaskAllocated,
            submitter.clone(),
            allocation.assignees(),
        )
        .for_task(&allocation.task_id)
        .with_payload(json!({
            "description": task.description,
            "payload": task.payload,
            "assignments": allocation.assignments,
        }));
        self.bus.publish(message)?;

        info!(
            context_id,
            task_id = %allocation.task_id,
            submitter = %submitter,
            subtasks = allocation.assignments.len(),
            "Task allocated"
        );
        Ok(allocation)
    }

    pub fn report_task_completion(
        &self,
        context_id: &str,
        agent_id: &AgentId,
        task_id: &str,
        result: serde_json::Value,
    ) -> CoordinationResult<TaskAllocation> {
        self.context(context_id)?;
        self.require_permission(context_id, agent_id, Permission::ReportResults)?;

        let allocation = self
            .allocator
            .get(task_id)
            .filter(|t| t.context_id == context_id)
            .ok_or_else(|| CoordinationError::TaskNotFound(task_id.to_string()))?;
        if allocation.assignment_for(agent_id).is_none() {
            return Err(CoordinationError::NotAssigned {
                agent: agent_id.clone(),
                task: task_id.to_string(),
            });
        }

        let allocation = self.allocator.complete(task_id, agent_id, result.clone())?;
        let message = CoordinationMessage::new(
            context_id,
            MessageKind::TaskCompleted,
            agent_id.clone(),
            vec![allocation.submitted_by.clone()],
        )
        .for_task(task_id)
        .with_payload(json!({
            "result": result,
            "status": allocation.status,
        }));
        self.bus.publish(message)?;

        debug!(context_id, task_id, agent_id = %agent_id, status = ?allocation.status, "Task completion reported");
        Ok(allocation)
    }

    pub fn broadcast(
        &self,
        context_id: &str,
        sender: &AgentId,
        payload: serde_json::Value,
    ) -> CoordinationResult<CoordinationMessage> {
        self.context(context_id)?;
        self.require_permission(context_id, sender, Permission::BroadcastMessages)?;

        let recipients = self
            .registry
            .agents(context_id)
            .into_iter()
            .map(|a| a.agent_id)
            .filter(|id| id != sender)
            .collect();
        let message =
            CoordinationMessage::new(context_id, MessageKind::Broadcast, sender.clone(), recipients)
                .with_payload(payload);
        self.bus.publish(message)
    }

    pub fn message_history(&self, context_id: &str) -> CoordinationResult<Vec<CoordinationMessage>> {
        self.context(context_id)?;
        Ok(self.bus.history(context_id))
    }

    pub fn agents(&self, context_id: &str) -> CoordinationResult<Vec<RegisteredAgent>> {
        self.context(context_id)?;
        Ok(self.registry.agents(context_id))
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    pub fn get_coordination_metrics(&self, context_id: &str) -> CoordinationResult<CoordinationMetrics> {
        self.context(context_id)?;
        let agents = self.registry.agents(context_id);
        let messages = self.bus.history(context_id);
        let tasks = self.allocator.allocations(context_id);

        let governed_count = agents.iter().filter(|a| a.governed).count();
        let mut frameworks = BTreeMap::new();
        for agent in &agents {
            *frameworks
                .entry(agent.governance_framework.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(CoordinationMetrics {
            context_id: context_id.to_string(),
            agent_count: agents.len(),
            governed_count,
            governed_ratio: ratio(governed_count, agents.len()),
            frameworks,
            messages: message_traffic(&messages),
            tasks_total: tasks.len(),
            tasks_completed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count(),
            trust_boundaries: TrustBoundaries::from_traffic(&agents, &messages),
        })
    }

    /// Governed vs non-governed completion rates, with a trust label taken
    /// from how much of the governed cohort's traffic stays inside it.
    pub fn get_governance_contrast_visualization(
        &self,
        context_id: &str,
    ) -> CoordinationResult<GovernanceContrast> {
        self.context(context_id)?;
        let agents = self.registry.agents(context_id);
        let messages = self.bus.history(context_id);
        let tasks = self.allocator.allocations(context_id);

        let boundaries = TrustBoundaries::from_traffic(&agents, &messages);
        let rows = agent_performance(&agents, &tasks);
        let (governed, non_governed) = cohorts(&rows);

        let adjacency = boundaries.governed_adjacency();
        let trust_level = if adjacency >= self.config.high_trust_adjacency {
            TrustLevel::High
        } else if adjacency >= self.config.medium_trust_adjacency {
            TrustLevel::Medium
        } else {
            TrustLevel::Low
        };

        Ok(GovernanceContrast {
            context_id: context_id.to_string(),
            completion_rate_delta: governed.completion_rate - non_governed.completion_rate,
            governed,
            non_governed,
            adjacency,
            trust_level,
            trust_boundaries: boundaries,
            agents: rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoleDefinition;
    use governance_crypto::{CryptographicVerifier, KeyStore};
    use governance_identity::IdentityConfig;
    use governance_types::DeclaredCapabilities;

    fn manager() -> CoordinationManager {
        let verifier = Arc::new(CryptographicVerifier::new(Arc::new(KeyStore::ephemeral())));
        let identity = Arc::new(GovernanceIdentityService::new(IdentityConfig::default(), verifier));
        CoordinationManager::new(CoordinationConfig::default(), identity)
    }

    fn team() -> ContextConfig {
        ContextConfig::new("research")
            .with_role(
                RoleDefinition::new("coordinator")
                    .with_permission("assign_tasks")
                    .with_permission("broadcast_messages")
                    .with_permission("read_memory"),
            )
            .with_role(
                RoleDefinition::new("worker")
                    .with_permission("report_results")
                    .with_permission("read_memory"),
            )
    }

    fn governed(id: &str) -> AgentDescriptor {
        AgentDescriptor::new(id, id).with_capabilities(
            DeclaredCapabilities::new()
                .with_memory_integrity()
                .with_reflection()
                .with_belief_trace(),
        )
    }

    #[test]
    fn malformed_roles_reject_the_context() {
        let manager = manager();
        let config = ContextConfig::new("x").with_role(RoleDefinition::new("").with_permission("assign_tasks"));
        assert!(matches!(
            manager.create_coordination_context(config),
            Err(CoordinationError::InvalidRole(_))
        ));

        let config = team().with_default_role("pilot");
        assert!(manager.create_coordination_context(config).is_err());
    }

    #[test]
    fn registration_requires_a_live_context() {
        let manager = manager();
        let err = manager
            .register_agent("context-missing", &mut governed("a"), None)
            .unwrap_err();
        assert!(err.to_string().contains("Context not found"));
    }

    #[test]
    fn registration_tags_and_soft_fails_roles() {
        let manager = manager();
        let ctx = manager.create_coordination_context(team()).unwrap();

        let mut local = governed("lead");
        let lead = manager
            .register_agent(&ctx.id, &mut local, Some("coordinator"))
            .unwrap();
        assert!(local.is_tagged());
        assert!(lead.governed);
        assert_eq!(lead.role.as_deref(), Some("coordinator"));

        let mut outsider = AgentDescriptor::external("ext", "ext");
        let ext = manager
            .register_agent(&ctx.id, &mut outsider, Some("pilot"))
            .unwrap();
        assert!(!ext.governed);
        assert_eq!(ext.governance_framework, GovernanceFramework::External);
        assert!(ext.role.is_none());
        assert_eq!(manager.agents(&ctx.id).unwrap().len(), 2);
    }

    #[test]
    fn workers_cannot_submit_tasks() {
        let manager = manager();
        let ctx = manager.create_coordination_context(team()).unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("w1"), Some("worker"))
            .unwrap();

        let err = manager
            .submit_task(&ctx.id, &AgentId::new("w1"), TaskRequest::new("x").for_role("worker"))
            .unwrap_err();
        assert!(err.to_string().contains("does not have permission"));
    }

    #[test]
    fn task_flow_publishes_in_order() {
        let manager = manager();
        let ctx = manager.create_coordination_context(team()).unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("lead"), Some("coordinator"))
            .unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("w1"), Some("worker"))
            .unwrap();
        manager
            .register_agent(&ctx.id, &mut AgentDescriptor::external("w2", "w2"), Some("worker"))
            .unwrap();

        let lead = AgentId::new("lead");
        let task = manager
            .submit_task(&ctx.id, &lead, TaskRequest::new("survey"))
            .unwrap();
        assert_eq!(task.assignments.len(), 2);

        let err = manager
            .report_task_completion(&ctx.id, &lead, &task.task_id, json!(null))
            .unwrap_err();
        assert!(err.to_string().contains("does not have permission"));

        manager
            .report_task_completion(&ctx.id, &AgentId::new("w1"), &task.task_id, json!("done"))
            .unwrap();

        let history = manager.message_history(&ctx.id).unwrap();
        let kinds: Vec<_> = history.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::TaskAllocated, MessageKind::TaskCompleted]);
        assert!(history[0].sequence < history[1].sequence);
    }

    #[test]
    fn completion_outside_the_allocation_is_rejected() {
        let manager = manager();
        let ctx = manager.create_coordination_context(team()).unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("lead"), Some("coordinator"))
            .unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("w1"), Some("worker"))
            .unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("w2"), Some("worker"))
            .unwrap();

        let task = manager
            .submit_task(&ctx.id, &AgentId::new("lead"), TaskRequest::new("t").for_role("worker"))
            .unwrap();
        let idle = if task.assignees() == vec![AgentId::new("w1")] { "w2" } else { "w1" };
        let err = manager
            .report_task_completion(&ctx.id, &AgentId::new(idle), &task.task_id, json!(null))
            .unwrap_err();
        assert!(err.to_string().contains("not assigned to task"));
    }

    #[test]
    fn teardown_invalidates_the_context() {
        let manager = manager();
        let ctx = manager.create_coordination_context(team()).unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("lead"), Some("coordinator"))
            .unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("w1"), Some("worker"))
            .unwrap();
        let task = manager
            .submit_task(&ctx.id, &AgentId::new("lead"), TaskRequest::new("t"))
            .unwrap();

        assert!(manager.teardown_context(&ctx.id));
        assert!(!manager.teardown_context(&ctx.id));
        let err = manager
            .report_task_completion(&ctx.id, &AgentId::new("w1"), &task.task_id, json!(1))
            .unwrap_err();
        assert!(err.to_string().contains("Context not found"));
    }

    #[test]
    fn memory_access_follows_role_permissions() {
        let manager = manager();
        let ctx = manager.create_coordination_context(team()).unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("w1"), Some("worker"))
            .unwrap();
        let w1 = AgentId::new("w1");
        assert!(manager.check_memory_access(&ctx.id, &w1, false).is_ok());
        assert!(manager.check_memory_access(&ctx.id, &w1, true).is_err());
    }

    #[test]
    fn contrast_compares_cohorts() {
        let manager = manager();
        let ctx = manager.create_coordination_context(team()).unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("lead"), Some("coordinator"))
            .unwrap();
        manager
            .register_agent(&ctx.id, &mut governed("w1"), Some("worker"))
            .unwrap();
        manager
            .register_agent(&ctx.id, &mut AgentDescriptor::external("w2", "w2"), Some("worker"))
            .unwrap();

        let task = manager
            .submit_task(&ctx.id, &AgentId::new("lead"), TaskRequest::new("t"))
            .unwrap();
        manager
            .report_task_completion(&ctx.id, &AgentId::new("w1"), &task.task_id, json!(1))
            .unwrap();

        let contrast = manager.get_governance_contrast_visualization(&ctx.id).unwrap();
        assert_eq!(contrast.governed.completion_rate, 1.0);
        assert_eq!(contrast.non_governed.completion_rate, 0.0);
        assert_eq!(contrast.completion_rate_delta, 1.0);
        // lead->w1, lead->w2, w1->lead
        assert_eq!(contrast.trust_boundaries.governed_edges, 2);
        assert_eq!(contrast.trust_boundaries.crossing_edges, 1);
        assert_eq!(contrast.trust_level, TrustLevel::Medium);

        let metrics = manager.get_coordination_metrics(&ctx.id).unwrap();
        assert_eq!(metrics.agent_count, 3);
        assert_eq!(metrics.governed_count, 2);
        assert_eq!(metrics.frameworks.get("external"), Some(&1));
        assert_eq!(metrics.messages.total, 2);
        assert_eq!(metrics.tasks_completed, 0);
    }
}
