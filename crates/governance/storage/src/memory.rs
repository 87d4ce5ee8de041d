//! In-memory reference implementation of the trust storage traits.
//!
//! Deterministic and test-friendly. Each write takes a single write guard,
//! so a scorecard and its latest pointer land together.

use crate::traits::{newest_first_lineage, newest_first_scorecards, LineageStore, ScorecardStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use governance_types::{AgentId, Scorecard, TimeWindow, TrustLineageRecord};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct ScorecardState {
    by_agent: HashMap<AgentId, HashMap<String, Scorecard>>,
    latest: HashMap<AgentId, String>,
    /// (agent, scorecard id) in write order
    global: Vec<(AgentId, String)>,
}

#[derive(Default)]
struct LineageState {
    by_id: HashMap<String, TrustLineageRecord>,
    by_source: HashMap<AgentId, Vec<String>>,
    by_target: HashMap<AgentId, Vec<String>>,
    pairs: HashMap<(AgentId, AgentId), String>,
}

/// In-memory trust storage adapter.
#[derive(Default)]
pub struct InMemoryTrustStorage {
    scorecards: RwLock<ScorecardState>,
    lineage: RwLock<LineageState>,
}

impl InMemoryTrustStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> StorageError {
    StorageError::Backend(format!("{} lock poisoned", what))
}

#[async_trait]
impl ScorecardStore for InMemoryTrustStorage {
    async fn store_scorecard(&self, scorecard: Scorecard) -> StorageResult<()> {
        let mut guard = self.scorecards.write().map_err(|_| poisoned("scorecards"))?;
        let agent_id = scorecard.agent_id.clone();
        let scorecard_id = scorecard.scorecard_id.clone();

        let history = guard.by_agent.entry(agent_id.clone()).or_default();
        if history.contains_key(&scorecard_id) {
            return Err(StorageError::Conflict(format!(
                "scorecard {} already exists for agent {}",
                scorecard_id, agent_id
            )));
        }
        history.insert(scorecard_id.clone(), scorecard);
        guard.latest.insert(agent_id.clone(), scorecard_id.clone());
        guard.global.push((agent_id, scorecard_id));
        Ok(())
    }

    async fn latest_scorecard(&self, agent_id: &AgentId) -> StorageResult<Option<Scorecard>> {
        let guard = self.scorecards.read().map_err(|_| poisoned("scorecards"))?;
        Ok(guard
            .latest
            .get(agent_id)
            .and_then(|id| guard.by_agent.get(agent_id)?.get(id))
            .cloned())
    }

    async fn get_scorecard(
        &self,
        agent_id: &AgentId,
        scorecard_id: &str,
    ) -> StorageResult<Option<Scorecard>> {
        let guard = self.scorecards.read().map_err(|_| poisoned("scorecards"))?;
        Ok(guard
            .by_agent
            .get(agent_id)
            .and_then(|history| history.get(scorecard_id))
            .cloned())
    }

    async fn scorecard_history(
        &self,
        agent_id: &AgentId,
        window: TimeWindow,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Scorecard>> {
        let guard = self.scorecards.read().map_err(|_| poisoned("scorecards"))?;
        let mut values: Vec<Scorecard> = guard
            .by_agent
            .get(agent_id)
            .map(|history| {
                history
                    .values()
                    .filter(|sc| window.contains(&sc.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        newest_first_scorecards(&mut values);
        if let Some(limit) = limit {
            values.truncate(limit);
        }
        Ok(values)
    }

    async fn global_history(&self, limit: usize) -> StorageResult<Vec<Scorecard>> {
        let guard = self.scorecards.read().map_err(|_| poisoned("scorecards"))?;
        Ok(guard
            .global
            .iter()
            .rev()
            .filter_map(|(agent, id)| guard.by_agent.get(agent)?.get(id).cloned())
            .take(limit)
            .collect())
    }

    async fn list_agents(&self) -> StorageResult<Vec<AgentId>> {
        let guard = self.scorecards.read().map_err(|_| poisoned("scorecards"))?;
        let mut agents: Vec<AgentId> = guard.latest.keys().cloned().collect();
        agents.sort();
        Ok(agents)
    }
}

#[async_trait]
impl LineageStore for InMemoryTrustStorage {
    async fn store_lineage(&self, record: TrustLineageRecord) -> StorageResult<()> {
        let mut guard = self.lineage.write().map_err(|_| poisoned("lineage"))?;
        if guard.by_id.contains_key(&record.lineage_id) {
            return Err(StorageError::Conflict(format!(
                "lineage record {} already exists",
                record.lineage_id
            )));
        }

        let id = record.lineage_id.clone();
        let source = record.source_agent.id.clone();
        let target = record.target_agent.id.clone();
        guard
            .by_source
            .entry(source.clone())
            .or_default()
            .push(id.clone());
        guard
            .by_target
            .entry(target.clone())
            .or_default()
            .push(id.clone());
        guard.pairs.insert((source, target), id.clone());
        guard.by_id.insert(id, record);
        Ok(())
    }

    async fn get_lineage(&self, lineage_id: &str) -> StorageResult<Option<TrustLineageRecord>> {
        let guard = self.lineage.read().map_err(|_| poisoned("lineage"))?;
        Ok(guard.by_id.get(lineage_id).cloned())
    }

    async fn lineage_by_source(
        &self,
        agent_id: &AgentId,
    ) -> StorageResult<Vec<TrustLineageRecord>> {
        let guard = self.lineage.read().map_err(|_| poisoned("lineage"))?;
        let mut records = resolve(&guard.by_id, guard.by_source.get(agent_id));
        newest_first_lineage(&mut records);
        Ok(records)
    }

    async fn lineage_by_target(
        &self,
        agent_id: &AgentId,
    ) -> StorageResult<Vec<TrustLineageRecord>> {
        let guard = self.lineage.read().map_err(|_| poisoned("lineage"))?;
        let mut records = resolve(&guard.by_id, guard.by_target.get(agent_id));
        newest_first_lineage(&mut records);
        Ok(records)
    }

    async fn pair_lookup(
        &self,
        source: &AgentId,
        target: &AgentId,
    ) -> StorageResult<Option<String>> {
        let guard = self.lineage.read().map_err(|_| poisoned("lineage"))?;
        Ok(guard.pairs.get(&(source.clone(), target.clone())).cloned())
    }
}

fn resolve(
    by_id: &HashMap<String, TrustLineageRecord>,
    ids: Option<&Vec<String>>,
) -> Vec<TrustLineageRecord> {
    ids.map(|ids| ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{lineage, scorecard};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn latest_pointer_follows_writes() {
        let store = InMemoryTrustStorage::new();
        let agent = AgentId::new("alpha");
        assert!(store.latest_scorecard(&agent).await.unwrap().is_none());

        let now = Utc::now();
        store
            .store_scorecard(scorecard("alpha", "sc-1", now - Duration::minutes(5)))
            .await
            .unwrap();
        store
            .store_scorecard(scorecard("alpha", "sc-2", now))
            .await
            .unwrap();

        let latest = store.latest_scorecard(&agent).await.unwrap().unwrap();
        assert_eq!(latest.scorecard_id, "sc-2");
        assert!(store.get_scorecard(&agent, "sc-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scorecards_are_immutable() {
        let store = InMemoryTrustStorage::new();
        let sc = scorecard("alpha", "sc-1", Utc::now());
        store.store_scorecard(sc.clone()).await.unwrap();
        let err = store.store_scorecard(sc).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn history_is_windowed_and_newest_first() {
        let store = InMemoryTrustStorage::new();
        let now = Utc::now();
        for (i, age) in [30, 20, 10].iter().enumerate() {
            store
                .store_scorecard(scorecard(
                    "alpha",
                    &format!("sc-{}", i),
                    now - Duration::days(*age),
                ))
                .await
                .unwrap();
        }
        let agent = AgentId::new("alpha");
        let recent = store
            .scorecard_history(&agent, TimeWindow::since(now - Duration::days(25)), None)
            .await
            .unwrap();
        let ids: Vec<_> = recent.iter().map(|s| s.scorecard_id.as_str()).collect();
        assert_eq!(ids, vec!["sc-2", "sc-1"]);

        let limited = store
            .scorecard_history(&agent, TimeWindow::all(), Some(1))
            .await
            .unwrap();
        assert_eq!(limited[0].scorecard_id, "sc-2");
    }

    #[tokio::test]
    async fn global_history_spans_agents() {
        let store = InMemoryTrustStorage::new();
        let now = Utc::now();
        store.store_scorecard(scorecard("a", "sc-a", now)).await.unwrap();
        store.store_scorecard(scorecard("b", "sc-b", now)).await.unwrap();

        let global = store.global_history(10).await.unwrap();
        assert_eq!(global.len(), 2);
        assert_eq!(global[0].scorecard_id, "sc-b");
        assert_eq!(store.list_agents().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lineage_is_indexed_three_ways_plus_pair() {
        let store = InMemoryTrustStorage::new();
        let now = Utc::now();
        store
            .store_lineage(lineage("l-1", "a", "b", now - Duration::minutes(1)))
            .await
            .unwrap();
        store.store_lineage(lineage("l-2", "a", "b", now)).await.unwrap();
        store.store_lineage(lineage("l-3", "c", "a", now)).await.unwrap();

        let a = AgentId::new("a");
        let b = AgentId::new("b");
        assert!(store.get_lineage("l-1").await.unwrap().is_some());
        assert_eq!(store.lineage_by_source(&a).await.unwrap().len(), 2);
        assert_eq!(store.lineage_by_target(&a).await.unwrap().len(), 1);
        assert_eq!(
            store.pair_lookup(&a, &b).await.unwrap().as_deref(),
            Some("l-2")
        );
        assert!(store.pair_lookup(&b, &a).await.unwrap().is_none());
    }
}
