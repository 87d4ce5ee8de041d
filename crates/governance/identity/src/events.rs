//! Governance event bus.
//!
//! Events are broadcast to any number of subscribers; publishing with no
//! subscribers is not an error.

use chrono::{DateTime, Utc};
use governance_types::{AgentId, GovernanceFramework, PolicyAction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GovernanceEvent {
    AgentTagged {
        agent_id: AgentId,
        framework: GovernanceFramework,
        at: DateTime<Utc>,
    },
    GovernanceVerified {
        verification_id: String,
        source_agent_id: AgentId,
        target_agent_id: AgentId,
        compatible: bool,
        action: PolicyAction,
        at: DateTime<Utc>,
    },
    MemoryAttested {
        agent_id: AgentId,
        at: DateTime<Utc>,
    },
    InteractionRejected {
        source_agent_id: AgentId,
        target_agent_id: AgentId,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl GovernanceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentTagged { .. } => "agent_tagged",
            Self::GovernanceVerified { .. } => "governance_verified",
            Self::MemoryAttested { .. } => "memory_attested",
            Self::InteractionRejected { .. } => "interaction_rejected",
        }
    }
}

pub struct GovernanceEventBus {
    sender: broadcast::Sender<GovernanceEvent>,
    counts: RwLock<HashMap<&'static str, u64>>,
}

impl GovernanceEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            counts: RwLock::new(HashMap::new()),
        }
    }

    pub fn publish(&self, event: GovernanceEvent) {
        if let Ok(mut counts) = self.counts.write() {
            *counts.entry(event.kind()).or_insert(0) += 1;
        }
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GovernanceEvent> {
        self.sender.subscribe()
    }

    /// Number of events of `kind` published so far.
    pub fn count(&self, kind: &str) -> u64 {
        self.counts
            .read()
            .map(|counts| counts.get(kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
