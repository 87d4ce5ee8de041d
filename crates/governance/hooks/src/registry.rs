//! Generic lifecycle hook registry.
//!
//! Hosts expose a [`HookManager`]; governance registers handlers against
//! named lifecycle events and the host dispatches payloads to them.

use crate::error::{HookError, HookResult};
use governance_types::{AgentContract, AgentDescriptor, AgentId, InteractionPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Lifecycle points governance attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookEvent {
    BeforeAgentExecution,
    BeforeAgentInteraction,
    AfterAgentInteraction,
    ValidateAgentContract,
    BeforeMemoryAccess,
    AfterMemoryMutation,
    BeforeReflection,
    AfterReflection,
}

impl HookEvent {
    pub const ALL: [HookEvent; 8] = [
        Self::BeforeAgentExecution,
        Self::BeforeAgentInteraction,
        Self::AfterAgentInteraction,
        Self::ValidateAgentContract,
        Self::BeforeMemoryAccess,
        Self::AfterMemoryMutation,
        Self::BeforeReflection,
        Self::AfterReflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeAgentExecution => "beforeAgentExecution",
            Self::BeforeAgentInteraction => "beforeAgentInteraction",
            Self::AfterAgentInteraction => "afterAgentInteraction",
            Self::ValidateAgentContract => "validateAgentContract",
            Self::BeforeMemoryAccess => "beforeMemoryAccess",
            Self::AfterMemoryMutation => "afterMemoryMutation",
            Self::BeforeReflection => "beforeReflection",
            Self::AfterReflection => "afterReflection",
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryOperation {
    Read,
    Write,
}

/// Data handed to hook handlers. Handlers may update agents in place.
#[derive(Clone, Debug)]
pub enum HookPayload {
    Execution {
        agent: AgentDescriptor,
    },
    Interaction {
        source: AgentDescriptor,
        target: AgentDescriptor,
        /// Caller's confidence in the interaction before governance penalties
        confidence: f64,
    },
    InteractionCompleted {
        source: AgentId,
        target: AgentId,
        outcome: serde_json::Value,
    },
    Contract {
        contract: AgentContract,
    },
    MemoryAccess {
        owner: AgentDescriptor,
        accessor: AgentDescriptor,
        operation: MemoryOperation,
    },
    MemoryMutation {
        agent: AgentDescriptor,
    },
    Reflection {
        agent_id: AgentId,
        details: serde_json::Value,
    },
}

impl HookPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Execution { .. } => "execution",
            Self::Interaction { .. } => "interaction",
            Self::InteractionCompleted { .. } => "interaction_completed",
            Self::Contract { .. } => "contract",
            Self::MemoryAccess { .. } => "memory_access",
            Self::MemoryMutation { .. } => "memory_mutation",
            Self::Reflection { .. } => "reflection",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HookOutcome {
    /// Continue unchanged
    Proceed,
    /// Stop the lifecycle step
    Blocked { reason: String },
    /// Continue with a governance-adjusted interaction
    Adjusted {
        confidence: f64,
        policy: InteractionPolicy,
        verification_id: Option<String>,
    },
    /// Handler only observed the event
    Observed,
}

impl HookOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Callback type for hook handlers
pub type HookHandler = Arc<dyn Fn(&mut HookPayload) -> HookResult<HookOutcome> + Send + Sync>;

/// Host-side hook registration contract.
pub trait HookManager: Send + Sync {
    fn register(&self, event: HookEvent, handler: HookHandler) -> HookResult<()>;

    /// Run the handlers for `event` in registration order, stopping after
    /// the first one that blocks.
    fn dispatch(&self, event: HookEvent, payload: &mut HookPayload) -> HookResult<Vec<HookOutcome>>;

    fn handler_count(&self, event: HookEvent) -> usize;
}

/// In-process hook manager.
#[derive(Default)]
pub struct InMemoryHookManager {
    handlers: RwLock<HashMap<HookEvent, Vec<HookHandler>>>,
}

impl InMemoryHookManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HookManager for InMemoryHookManager {
    fn register(&self, event: HookEvent, handler: HookHandler) -> HookResult<()> {
        let mut handlers = self.handlers.write().map_err(|_| HookError::LockPoisoned)?;
        handlers.entry(event).or_default().push(handler);
        Ok(())
    }

    fn dispatch(&self, event: HookEvent, payload: &mut HookPayload) -> HookResult<Vec<HookOutcome>> {
        // Handlers run outside the lock so they may register or dispatch
        let handlers = {
            let guard = self.handlers.read().map_err(|_| HookError::LockPoisoned)?;
            guard.get(&event).cloned().unwrap_or_default()
        };

        let mut outcomes = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let outcome = handler(&mut *payload)?;
            let blocked = outcome.is_blocked();
            outcomes.push(outcome);
            if blocked {
                break;
            }
        }
        Ok(outcomes)
    }

    fn handler_count(&self, event: HookEvent) -> usize {
        self.handlers
            .read()
            .map(|guard| guard.get(&event).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}
