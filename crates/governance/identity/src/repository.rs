//! Identity and interaction-history repositories.
//!
//! Both are synchronous: every call is a short in-memory operation and the
//! service that owns them never suspends while holding a guard.

use crate::error::{IdentityError, IdentityResult};
use chrono::{DateTime, Utc};
use governance_types::{
    AgentId, GovernanceIdentity, InteractionKind, InteractionRecord, TimeWindow,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// One current governance identity per agent.
pub trait IdentityRepository: Send + Sync {
    fn get(&self, agent_id: &AgentId) -> IdentityResult<Option<GovernanceIdentity>>;

    /// Insert unless an identity is already present; returns the stored identity.
    fn insert_if_absent(&self, identity: GovernanceIdentity) -> IdentityResult<GovernanceIdentity>;

    /// Refresh `memory_integrity.last_verified`, the only mutable field.
    fn mark_memory_verified(
        &self,
        agent_id: &AgentId,
        at: DateTime<Utc>,
    ) -> IdentityResult<Option<GovernanceIdentity>>;

    fn count(&self) -> IdentityResult<usize>;
}

#[derive(Default)]
pub struct InMemoryIdentityRepository {
    identities: RwLock<HashMap<AgentId, GovernanceIdentity>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityRepository for InMemoryIdentityRepository {
    fn get(&self, agent_id: &AgentId) -> IdentityResult<Option<GovernanceIdentity>> {
        let guard = self
            .identities
            .read()
            .map_err(|_| IdentityError::LockPoisoned("identities"))?;
        Ok(guard.get(agent_id).cloned())
    }

    fn insert_if_absent(&self, identity: GovernanceIdentity) -> IdentityResult<GovernanceIdentity> {
        let mut guard = self
            .identities
            .write()
            .map_err(|_| IdentityError::LockPoisoned("identities"))?;
        Ok(guard
            .entry(identity.agent_id.clone())
            .or_insert(identity)
            .clone())
    }

    fn mark_memory_verified(
        &self,
        agent_id: &AgentId,
        at: DateTime<Utc>,
    ) -> IdentityResult<Option<GovernanceIdentity>> {
        let mut guard = self
            .identities
            .write()
            .map_err(|_| IdentityError::LockPoisoned("identities"))?;
        Ok(guard.get_mut(agent_id).map(|identity| {
            identity.memory_integrity.last_verified = Some(at);
            identity.clone()
        }))
    }

    fn count(&self) -> IdentityResult<usize> {
        let guard = self
            .identities
            .read()
            .map_err(|_| IdentityError::LockPoisoned("identities"))?;
        Ok(guard.len())
    }
}

/// Append-only interaction log.
pub trait InteractionHistory: Send + Sync {
    fn record(&self, record: InteractionRecord) -> IdentityResult<()>;

    fn get(&self, id: &str) -> IdentityResult<Option<InteractionRecord>>;

    /// Records involving `agent_id` inside `window`, oldest first.
    fn for_agent(
        &self,
        agent_id: &AgentId,
        window: TimeWindow,
    ) -> IdentityResult<Vec<InteractionRecord>>;

    fn by_kind(&self, kind: InteractionKind) -> IdentityResult<Vec<InteractionRecord>>;
}

#[derive(Default)]
pub struct InMemoryInteractionHistory {
    records: RwLock<Vec<InteractionRecord>>,
}

impl InMemoryInteractionHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteractionHistory for InMemoryInteractionHistory {
    fn record(&self, record: InteractionRecord) -> IdentityResult<()> {
        self.records
            .write()
            .map_err(|_| IdentityError::LockPoisoned("interaction history"))?
            .push(record);
        Ok(())
    }

    fn get(&self, id: &str) -> IdentityResult<Option<InteractionRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| IdentityError::LockPoisoned("interaction history"))?;
        Ok(guard.iter().find(|r| r.id == id).cloned())
    }

    fn for_agent(
        &self,
        agent_id: &AgentId,
        window: TimeWindow,
    ) -> IdentityResult<Vec<InteractionRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| IdentityError::LockPoisoned("interaction history"))?;
        Ok(guard
            .iter()
            .filter(|r| r.involves(agent_id) && window.contains(&r.timestamp))
            .cloned()
            .collect())
    }

    fn by_kind(&self, kind: InteractionKind) -> IdentityResult<Vec<InteractionRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| IdentityError::LockPoisoned("interaction history"))?;
        Ok(guard.iter().filter(|r| r.kind == kind).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn history_filters_by_agent_and_window() {
        let history = InMemoryInteractionHistory::new();
        let now = Utc::now();
        let (a, b, c) = (AgentId::new("a"), AgentId::new("b"), AgentId::new("c"));

        let mut old = InteractionRecord::new(InteractionKind::Message, a.clone(), b.clone());
        old.timestamp = now - Duration::days(2);
        history.record(old).unwrap();
        history
            .record(InteractionRecord::new(
                InteractionKind::Verification,
                a.clone(),
                c.clone(),
            ))
            .unwrap();

        assert_eq!(history.for_agent(&a, TimeWindow::all()).unwrap().len(), 2);
        assert_eq!(
            history
                .for_agent(&a, TimeWindow::since(now - Duration::hours(1)))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(history.for_agent(&b, TimeWindow::all()).unwrap().len(), 1);
        assert_eq!(
            history.by_kind(InteractionKind::Verification).unwrap().len(),
            1
        );
    }
}
