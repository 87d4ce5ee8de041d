//! Append-only interaction history entries.

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// A governance compatibility verification
    Verification,
    /// A message exchanged between agents
    Message,
    /// A governed memory read or write
    MemoryAccess,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    pub kind: InteractionKind,
    pub source_agent_id: AgentId,
    pub target_agent_id: AgentId,
    #[serde(default)]
    pub context: serde_json::Value,
    #[serde(default)]
    pub result: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(kind: InteractionKind, source: AgentId, target: AgentId) -> Self {
        Self {
            id: format!("interaction-{}", uuid::Uuid::new_v4()),
            kind,
            source_agent_id: source,
            target_agent_id: target,
            context: serde_json::Value::Null,
            result: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = result;
        self
    }

    pub fn involves(&self, agent_id: &AgentId) -> bool {
        self.source_agent_id == *agent_id || self.target_agent_id == *agent_id
    }
}

/// Inclusive time window for history queries. Open ends are unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *at >= from) && self.to.map_or(true, |to| *at <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now();
        let window = TimeWindow::between(now - Duration::hours(1), now);
        assert!(window.contains(&now));
        assert!(window.contains(&(now - Duration::hours(1))));
        assert!(!window.contains(&(now + Duration::seconds(1))));
    }

    #[test]
    fn open_window_contains_everything() {
        assert!(TimeWindow::all().contains(&Utc::now()));
    }

    #[test]
    fn record_involves_both_parties() {
        let record = InteractionRecord::new(
            InteractionKind::Message,
            AgentId::new("a"),
            AgentId::new("b"),
        );
        assert!(record.involves(&AgentId::new("a")));
        assert!(record.involves(&AgentId::new("b")));
        assert!(!record.involves(&AgentId::new("c")));
    }
}
