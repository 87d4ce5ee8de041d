use governance_types::AgentId;
use thiserror::Error;

/// Result type for coordination operations
pub type CoordinationResult<T> = Result<T, CoordinationError>;

#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("Context not found: {0}")]
    ContextNotFound(String),

    #[error("Invalid role definition: {0}")]
    InvalidRole(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Agent {agent} is not registered in context {context}")]
    AgentNotRegistered { agent: AgentId, context: String },

    #[error("Agent {agent} does not have permission {permission}")]
    PermissionDenied { agent: AgentId, permission: String },

    #[error("Agent {agent} is not assigned to task {task}")]
    NotAssigned { agent: AgentId, task: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {0} targets no agents")]
    NoCandidates(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_carry_stable_text() {
        let denied = CoordinationError::PermissionDenied {
            agent: AgentId::new("w1"),
            permission: "assign_tasks".into(),
        };
        assert!(denied.to_string().contains("does not have permission"));

        let unassigned = CoordinationError::NotAssigned {
            agent: AgentId::new("w1"),
            task: "task-1".into(),
        };
        assert!(unassigned.to_string().contains("not assigned to task"));

        let missing = CoordinationError::ContextNotFound("ctx".into());
        assert!(missing.to_string().starts_with("Context not found"));
    }
}
