//! Injectable collaborators of [`CoordinationManager`](crate::CoordinationManager)
//! and their in-process implementations.

use crate::error::{CoordinationError, CoordinationResult};
use crate::model::{
    Assignment, CoordinationMessage, RegisteredAgent, Role, RoleDefinition, TaskAllocation,
    TaskRequest, TaskStatus,
};
use chrono::Utc;
use governance_types::AgentId;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Role definitions and assignments, per context.
pub trait RoleManager: Send + Sync {
    /// Validate and install the roles of a context. Nothing is installed
    /// when any definition is malformed.
    fn define_roles(&self, context_id: &str, roles: &[RoleDefinition]) -> CoordinationResult<Vec<Role>>;

    fn assign_role(&self, context_id: &str, agent_id: &AgentId, role: &str) -> CoordinationResult<()>;

    fn role_of(&self, context_id: &str, agent_id: &AgentId) -> Option<Role>;

    fn agents_with_role(&self, context_id: &str, role: &str) -> Vec<AgentId>;

    fn remove_context(&self, context_id: &str);
}

/// Context membership.
pub trait AgentRegistry: Send + Sync {
    /// Insert or replace an agent's membership.
    fn register(&self, context_id: &str, agent: RegisteredAgent) -> CoordinationResult<()>;

    fn update_role(&self, context_id: &str, agent_id: &AgentId, role: Option<String>) -> CoordinationResult<()>;

    fn get(&self, context_id: &str, agent_id: &AgentId) -> Option<RegisteredAgent>;

    /// Members in registration order
    fn agents(&self, context_id: &str) -> Vec<RegisteredAgent>;

    fn remove_context(&self, context_id: &str);
}

/// Agents eligible for one slice of a task.
#[derive(Clone, Debug)]
pub struct CandidatePool {
    /// `Some` targets one agent holding the role, `None` every agent listed
    pub role: Option<String>,
    pub agents: Vec<AgentId>,
}

/// Splits tasks into subtasks and tracks their completion.
pub trait TaskAllocator: Send + Sync {
    fn allocate(
        &self,
        context_id: &str,
        submitter: &AgentId,
        request: &TaskRequest,
        pools: &[CandidatePool],
    ) -> CoordinationResult<TaskAllocation>;

    fn get(&self, task_id: &str) -> Option<TaskAllocation>;

    /// Record `agent_id`'s result. Fails with
    /// [`CoordinationError::NotAssigned`] unless the agent holds a subtask.
    fn complete(
        &self,
        task_id: &str,
        agent_id: &AgentId,
        result: serde_json::Value,
    ) -> CoordinationResult<TaskAllocation>;

    /// Allocations of a context, oldest first
    fn allocations(&self, context_id: &str) -> Vec<TaskAllocation>;

    fn remove_context(&self, context_id: &str);
}

/// Delivery of coordination messages.
///
/// Messages published for a context are delivered in publication order.
pub trait MessageBus: Send + Sync {
    /// Publish and return the message with its sequence number assigned.
    fn publish(&self, message: CoordinationMessage) -> CoordinationResult<CoordinationMessage>;

    fn history(&self, context_id: &str) -> Vec<CoordinationMessage>;

    fn subscribe(&self) -> broadcast::Receiver<CoordinationMessage>;

    fn remove_context(&self, context_id: &str);
}

#[derive(Default)]
struct ContextRoles {
    roles: HashMap<String, Role>,
    assignments: HashMap<AgentId, String>,
}

#[derive(Default)]
pub struct InMemoryRoleManager {
    contexts: RwLock<HashMap<String, ContextRoles>>,
}

impl InMemoryRoleManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoleManager for InMemoryRoleManager {
    fn define_roles(&self, context_id: &str, roles: &[RoleDefinition]) -> CoordinationResult<Vec<Role>> {
        let validated = roles
            .iter()
            .map(RoleDefinition::validate)
            .collect::<CoordinationResult<Vec<_>>>()?;

        let mut contexts = self
            .contexts
            .write()
            .map_err(|_| CoordinationError::LockPoisoned("roles"))?;
        let entry = contexts.entry(context_id.to_string()).or_default();
        for role in &validated {
            entry.roles.insert(role.name.clone(), role.clone());
        }
        Ok(validated)
    }

    fn assign_role(&self, context_id: &str, agent_id: &AgentId, role: &str) -> CoordinationResult<()> {
        let mut contexts = self
            .contexts
            .write()
            .map_err(|_| CoordinationError::LockPoisoned("roles"))?;
        let entry = contexts
            .get_mut(context_id)
            .ok_or_else(|| CoordinationError::ContextNotFound(context_id.to_string()))?;
        if !entry.roles.contains_key(role) {
            return Err(CoordinationError::RoleNotFound(role.to_string()));
        }
        entry.assignments.insert(agent_id.clone(), role.to_string());
        Ok(())
    }

    fn role_of(&self, context_id: &str, agent_id: &AgentId) -> Option<Role> {
        let contexts = self.contexts.read().ok()?;
        let entry = contexts.get(context_id)?;
        let name = entry.assignments.get(agent_id)?;
        entry.roles.get(name).cloned()
    }

    fn agents_with_role(&self, context_id: &str, role: &str) -> Vec<AgentId> {
        let Ok(contexts) = self.contexts.read() else {
            return Vec::new();
        };
        let mut agents: Vec<AgentId> = contexts
            .get(context_id)
            .map(|entry| {
                entry
                    .assignments
                    .iter()
                    .filter(|(_, assigned)| assigned.as_str() == role)
                    .map(|(agent, _)| agent.clone())
                    .collect()
            })
            .unwrap_or_default();
        agents.sort();
        agents
    }

    fn remove_context(&self, context_id: &str) {
        if let Ok(mut contexts) = self.contexts.write() {
            contexts.remove(context_id);
        }
    }
}

#[derive(Default)]
pub struct InMemoryAgentRegistry {
    contexts: RwLock<HashMap<String, Vec<RegisteredAgent>>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgentRegistry for InMemoryAgentRegistry {
    fn register(&self, context_id: &str, agent: RegisteredAgent) -> CoordinationResult<()> {
        let mut contexts = self
            .contexts
            .write()
            .map_err(|_| CoordinationError::LockPoisoned("registry"))?;
        let members = contexts.entry(context_id.to_string()).or_default();
        match members.iter_mut().find(|m| m.agent_id == agent.agent_id) {
            Some(existing) => *existing = agent,
            None => members.push(agent),
        }
        Ok(())
    }

    fn update_role(&self, context_id: &str, agent_id: &AgentId, role: Option<String>) -> CoordinationResult<()> {
        let mut contexts = self
            .contexts
            .write()
            .map_err(|_| CoordinationError::LockPoisoned("registry"))?;
        let member = contexts
            .get_mut(context_id)
            .and_then(|members| members.iter_mut().find(|m| &m.agent_id == agent_id))
            .ok_or_else(|| CoordinationError::AgentNotRegistered {
                agent: agent_id.clone(),
                context: context_id.to_string(),
            })?;
        member.role = role;
        Ok(())
    }

    fn get(&self, context_id: &str, agent_id: &AgentId) -> Option<RegisteredAgent> {
        let contexts = self.contexts.read().ok()?;
        contexts
            .get(context_id)?
            .iter()
            .find(|m| &m.agent_id == agent_id)
            .cloned()
    }

    fn agents(&self, context_id: &str) -> Vec<RegisteredAgent> {
        self.contexts
            .read()
            .ok()
            .and_then(|contexts| contexts.get(context_id).cloned())
            .unwrap_or_default()
    }

    fn remove_context(&self, context_id: &str) {
        if let Ok(mut contexts) = self.contexts.write() {
            contexts.remove(context_id);
        }
    }
}

/// Sends each role-targeted subtask to the least loaded holder of the
/// role, breaking ties by agent id.
#[derive(Default)]
pub struct InMemoryTaskAllocator {
    tasks: RwLock<Vec<TaskAllocation>>,
}

impl InMemoryTaskAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_load(tasks: &[TaskAllocation], context_id: &str, agent_id: &AgentId) -> usize {
        tasks
            .iter()
            .filter(|t| t.context_id == context_id)
            .flat_map(|t| t.assignments.iter())
            .filter(|a| &a.agent_id == agent_id && !a.is_complete())
            .count()
    }
}

impl TaskAllocator for InMemoryTaskAllocator {
    fn allocate(
        &self,
        context_id: &str,
        submitter: &AgentId,
        request: &TaskRequest,
        pools: &[CandidatePool],
    ) -> CoordinationResult<TaskAllocation> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|_| CoordinationError::LockPoisoned("tasks"))?;

        let task_id = format!("task-{}", uuid::Uuid::new_v4());
        let mut assignments = Vec::new();
        for pool in pools {
            let chosen: Vec<&AgentId> = match &pool.role {
                Some(_) => pool
                    .agents
                    .iter()
                    .min_by(|a, b| {
                        let load_a = Self::open_load(&tasks, context_id, a);
                        let load_b = Self::open_load(&tasks, context_id, b);
                        load_a.cmp(&load_b).then_with(|| a.cmp(b))
                    })
                    .into_iter()
                    .collect(),
                None => pool.agents.iter().collect(),
            };
            for agent_id in chosen {
                assignments.push(Assignment {
                    subtask_id: format!("{task_id}-{}", assignments.len() + 1),
                    agent_id: agent_id.clone(),
                    role: pool.role.clone(),
                    completed_at: None,
                    result: None,
                });
            }
        }

        if assignments.is_empty() {
            return Err(CoordinationError::NoCandidates(task_id));
        }

        let allocation = TaskAllocation {
            task_id,
            context_id: context_id.to_string(),
            description: request.description.clone(),
            submitted_by: submitter.clone(),
            assignments,
            status: TaskStatus::Allocated,
            created_at: Utc::now(),
        };
        tasks.push(allocation.clone());
        Ok(allocation)
    }

    fn get(&self, task_id: &str) -> Option<TaskAllocation> {
        let tasks = self.tasks.read().ok()?;
        tasks.iter().find(|t| t.task_id == task_id).cloned()
    }

    fn complete(
        &self,
        task_id: &str,
        agent_id: &AgentId,
        result: serde_json::Value,
    ) -> CoordinationResult<TaskAllocation> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|_| CoordinationError::LockPoisoned("tasks"))?;
        let task = tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| CoordinationError::TaskNotFound(task_id.to_string()))?;

        // An agent holding several subtasks completes them one at a time
        let assignment = task
            .assignments
            .iter_mut()
            .filter(|a| &a.agent_id == agent_id)
            .min_by_key(|a| a.is_complete())
            .ok_or_else(|| CoordinationError::NotAssigned {
                agent: agent_id.clone(),
                task: task_id.to_string(),
            })?;
        if !assignment.is_complete() {
            assignment.completed_at = Some(Utc::now());
            assignment.result = Some(result);
        }

        if task.assignments.iter().all(Assignment::is_complete) {
            task.status = TaskStatus::Completed;
        }
        Ok(task.clone())
    }

    fn allocations(&self, context_id: &str) -> Vec<TaskAllocation> {
        self.tasks
            .read()
            .map(|tasks| {
                tasks
                    .iter()
                    .filter(|t| t.context_id == context_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove_context(&self, context_id: &str) {
        if let Ok(mut tasks) = self.tasks.write() {
            tasks.retain(|t| t.context_id != context_id);
        }
    }
}

/// Keeps a per-context log and fans messages out over a broadcast channel.
pub struct InMemoryMessageBus {
    log: RwLock<HashMap<String, Vec<CoordinationMessage>>>,
    sender: broadcast::Sender<CoordinationMessage>,
}

impl InMemoryMessageBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            log: RwLock::new(HashMap::new()),
            sender,
        }
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MessageBus for InMemoryMessageBus {
    fn publish(&self, mut message: CoordinationMessage) -> CoordinationResult<CoordinationMessage> {
        // Sequence assignment and fan-out share the write guard
        let mut log = self
            .log
            .write()
            .map_err(|_| CoordinationError::LockPoisoned("messages"))?;
        let messages = log.entry(message.context_id.clone()).or_default();
        message.sequence = messages.len() as u64 + 1;
        messages.push(message.clone());
        let _ = self.sender.send(message.clone());
        Ok(message)
    }

    fn history(&self, context_id: &str) -> Vec<CoordinationMessage> {
        self.log
            .read()
            .ok()
            .and_then(|log| log.get(context_id).cloned())
            .unwrap_or_default()
    }

    fn subscribe(&self) -> broadcast::Receiver<CoordinationMessage> {
        self.sender.subscribe()
    }

    fn remove_context(&self, context_id: &str) {
        if let Ok(mut log) = self.log.write() {
            log.remove(context_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageKind;

    fn ids(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::new(*n)).collect()
    }

    #[test]
    fn malformed_role_installs_nothing() {
        let roles = InMemoryRoleManager::new();
        let defs = [
            RoleDefinition::new("worker").with_permission("report_results"),
            RoleDefinition::new("bad").with_permission("teleport"),
        ];
        assert!(roles.define_roles("ctx", &defs).is_err());

        let err = roles
            .assign_role("ctx", &AgentId::new("a"), "worker")
            .unwrap_err();
        assert!(matches!(err, CoordinationError::ContextNotFound(_)));
    }

    #[test]
    fn assignment_requires_a_defined_role() {
        let roles = InMemoryRoleManager::new();
        roles
            .define_roles("ctx", &[RoleDefinition::new("worker")])
            .unwrap();
        let err = roles
            .assign_role("ctx", &AgentId::new("a"), "pilot")
            .unwrap_err();
        assert!(matches!(err, CoordinationError::RoleNotFound(_)));

        roles.assign_role("ctx", &AgentId::new("b"), "worker").unwrap();
        roles.assign_role("ctx", &AgentId::new("a"), "worker").unwrap();
        assert_eq!(roles.agents_with_role("ctx", "worker"), ids(&["a", "b"]));
    }

    #[test]
    fn allocator_balances_role_targeted_subtasks() {
        let allocator = InMemoryTaskAllocator::new();
        let pool = [CandidatePool {
            role: Some("worker".into()),
            agents: ids(&["w1", "w2"]),
        }];
        let request = TaskRequest::new("index").for_role("worker");
        let submitter = AgentId::new("lead");

        let first = allocator.allocate("ctx", &submitter, &request, &pool).unwrap();
        let second = allocator.allocate("ctx", &submitter, &request, &pool).unwrap();
        assert_eq!(first.assignees(), ids(&["w1"]));
        assert_eq!(second.assignees(), ids(&["w2"]));
    }

    #[test]
    fn untargeted_pool_fans_out_to_every_agent() {
        let allocator = InMemoryTaskAllocator::new();
        let pool = [CandidatePool {
            role: None,
            agents: ids(&["a", "b", "c"]),
        }];
        let allocation = allocator
            .allocate("ctx", &AgentId::new("lead"), &TaskRequest::new("sweep"), &pool)
            .unwrap();
        assert_eq!(allocation.assignments.len(), 3);

        let empty = [CandidatePool {
            role: Some("worker".into()),
            agents: Vec::new(),
        }];
        let err = allocator
            .allocate("ctx", &AgentId::new("lead"), &TaskRequest::new("x"), &empty)
            .unwrap_err();
        assert!(matches!(err, CoordinationError::NoCandidates(_)));
    }

    #[test]
    fn completion_requires_an_assignment() {
        let allocator = InMemoryTaskAllocator::new();
        let pool = [CandidatePool {
            role: None,
            agents: ids(&["a", "b"]),
        }];
        let task = allocator
            .allocate("ctx", &AgentId::new("lead"), &TaskRequest::new("t"), &pool)
            .unwrap();

        let err = allocator
            .complete(&task.task_id, &AgentId::new("z"), serde_json::Value::Null)
            .unwrap_err();
        assert!(err.to_string().contains("not assigned to task"));

        let partial = allocator
            .complete(&task.task_id, &AgentId::new("a"), serde_json::json!(1))
            .unwrap();
        assert_eq!(partial.status, TaskStatus::Allocated);
        let done = allocator
            .complete(&task.task_id, &AgentId::new("b"), serde_json::json!(2))
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn bus_preserves_publication_order() {
        let bus = InMemoryMessageBus::new(16);
        let mut rx = bus.subscribe();
        for n in 0..3 {
            bus.publish(
                CoordinationMessage::new("ctx", MessageKind::Broadcast, AgentId::new("a"), vec![])
                    .with_payload(serde_json::json!(n)),
            )
            .unwrap();
        }

        for expected in 1..=3u64 {
            let message = rx.recv().await.unwrap();
            assert_eq!(message.sequence, expected);
        }
        assert_eq!(bus.history("ctx").len(), 3);

        bus.remove_context("ctx");
        assert!(bus.history("ctx").is_empty());
    }
}
