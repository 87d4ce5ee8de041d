use crate::StorageResult;
use async_trait::async_trait;
use governance_types::{AgentId, Scorecard, TimeWindow, TrustLineageRecord};

/// Storage interface for signed scorecards.
#[async_trait]
pub trait ScorecardStore: Send + Sync {
    /// Persist a scorecard into agent-scoped and global history and move the
    /// agent's latest pointer to it. Either everything is written or nothing is.
    async fn store_scorecard(&self, scorecard: Scorecard) -> StorageResult<()>;

    /// The scorecard the agent's latest pointer refers to.
    async fn latest_scorecard(&self, agent_id: &AgentId) -> StorageResult<Option<Scorecard>>;

    async fn get_scorecard(
        &self,
        agent_id: &AgentId,
        scorecard_id: &str,
    ) -> StorageResult<Option<Scorecard>>;

    /// Agent history newest-first, restricted to `window`.
    async fn scorecard_history(
        &self,
        agent_id: &AgentId,
        window: TimeWindow,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Scorecard>>;

    /// Most recent scorecards across every agent, newest-first.
    async fn global_history(&self, limit: usize) -> StorageResult<Vec<Scorecard>>;

    /// Agents with at least one stored scorecard.
    async fn list_agents(&self) -> StorageResult<Vec<AgentId>>;
}

/// Storage interface for append-only trust lineage records.
#[async_trait]
pub trait LineageStore: Send + Sync {
    /// Persist a record under its id, source and target indices and point
    /// the (source, target) pair index at it.
    async fn store_lineage(&self, record: TrustLineageRecord) -> StorageResult<()>;

    async fn get_lineage(&self, lineage_id: &str) -> StorageResult<Option<TrustLineageRecord>>;

    /// Records delegated by `agent_id`, newest-first.
    async fn lineage_by_source(&self, agent_id: &AgentId)
        -> StorageResult<Vec<TrustLineageRecord>>;

    /// Records delegated to `agent_id`, newest-first.
    async fn lineage_by_target(&self, agent_id: &AgentId)
        -> StorageResult<Vec<TrustLineageRecord>>;

    /// Id of the most recent record from `source` to `target`.
    async fn pair_lookup(&self, source: &AgentId, target: &AgentId)
        -> StorageResult<Option<String>>;
}

/// Unified storage bundle used by the scorecard and lineage services.
pub trait TrustStorage: ScorecardStore + LineageStore + Send + Sync {}

impl<T> TrustStorage for T where T: ScorecardStore + LineageStore + Send + Sync {}

pub(crate) fn newest_first_scorecards(scorecards: &mut [Scorecard]) {
    scorecards.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.scorecard_id.cmp(&a.scorecard_id))
    });
}

pub(crate) fn newest_first_lineage(records: &mut [TrustLineageRecord]) {
    records.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.lineage_id.cmp(&a.lineage_id))
    });
}
