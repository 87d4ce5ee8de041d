//! Coordination domain types: roles, contexts, tasks and messages.

use crate::error::{CoordinationError, CoordinationResult};
use chrono::{DateTime, Utc};
use governance_types::{AgentId, GovernanceFramework};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Something an agent may do inside a coordination context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AssignTasks,
    ReportResults,
    ReadMemory,
    WriteMemory,
    BroadcastMessages,
    ManageRoles,
}

impl Permission {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "assign_tasks" => Some(Self::AssignTasks),
            "report_results" => Some(Self::ReportResults),
            "read_memory" => Some(Self::ReadMemory),
            "write_memory" => Some(Self::WriteMemory),
            "broadcast_messages" => Some(Self::BroadcastMessages),
            "manage_roles" => Some(Self::ManageRoles),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssignTasks => "assign_tasks",
            Self::ReportResults => "report_results",
            Self::ReadMemory => "read_memory",
            Self::WriteMemory => "write_memory",
            Self::BroadcastMessages => "broadcast_messages",
            Self::ManageRoles => "manage_roles",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role as supplied by a caller. Permission names are checked by
/// [`RoleDefinition::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn validate(&self) -> CoordinationResult<Role> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoordinationError::InvalidRole(
                "role name must not be empty".into(),
            ));
        }

        let mut permissions = BTreeSet::new();
        for raw in &self.permissions {
            let permission = Permission::parse(raw).ok_or_else(|| {
                CoordinationError::InvalidRole(format!("role {name} has unknown permission {raw}"))
            })?;
            permissions.insert(permission);
        }

        Ok(Role {
            name: name.to_string(),
            description: self.description.clone(),
            permissions,
        })
    }
}

/// A validated role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: BTreeSet<Permission>,
}

impl Role {
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Requested shape of a new coordination context.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<RoleDefinition>,
    /// Role given to agents registered without an explicit one
    #[serde(default)]
    pub default_role: Option<String>,
}

impl ContextConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: RoleDefinition) -> Self {
        self.roles.push(role);
        self
    }

    pub fn with_default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinationContext {
    pub id: String,
    pub name: String,
    pub roles: Vec<String>,
    pub default_role: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An agent's membership in a context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisteredAgent {
    pub agent_id: AgentId,
    pub name: String,
    pub governance_framework: GovernanceFramework,
    /// True for agents under promethios governance
    pub governed: bool,
    pub role: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Work submitted to a context. An empty `target_roles` sends one subtask
/// to every agent allowed to report results.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRequest {
    pub description: String,
    #[serde(default)]
    pub target_roles: Vec<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TaskRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            target_roles: Vec::new(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn for_role(mut self, role: impl Into<String>) -> Self {
        self.target_roles.push(role.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Allocated,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub subtask_id: String,
    pub agent_id: AgentId,
    pub role: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
}

impl Assignment {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskAllocation {
    pub task_id: String,
    pub context_id: String,
    pub description: String,
    pub submitted_by: AgentId,
    pub assignments: Vec<Assignment>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl TaskAllocation {
    pub fn assignment_for(&self, agent_id: &AgentId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| &a.agent_id == agent_id)
    }

    pub fn assignees(&self) -> Vec<AgentId> {
        self.assignments.iter().map(|a| a.agent_id.clone()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TaskAllocated,
    TaskCompleted,
    Broadcast,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskAllocated => "task_allocated",
            Self::TaskCompleted => "task_completed",
            Self::Broadcast => "broadcast",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMessage {
    pub message_id: String,
    pub context_id: String,
    pub kind: MessageKind,
    pub sender: AgentId,
    pub recipients: Vec<AgentId>,
    pub task_id: Option<String>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// Assigned by the bus, increasing per context
    #[serde(default)]
    pub sequence: u64,
}

impl CoordinationMessage {
    pub fn new(
        context_id: impl Into<String>,
        kind: MessageKind,
        sender: AgentId,
        recipients: Vec<AgentId>,
    ) -> Self {
        Self {
            message_id: format!("message-{}", uuid::Uuid::new_v4()),
            context_id: context_id.into(),
            kind,
            sender,
            recipients,
            task_id: None,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
            sequence: 0,
        }
    }

    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
