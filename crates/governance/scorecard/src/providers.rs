//! Metric provider ports.
//!
//! Reflection and belief-trace metrics come from PRISM, trust decay and
//! violations from VIGIL. Both are opaque data sources; the static
//! providers here serve tests and deployments that push metrics in.

use crate::error::ScorecardResult;
use async_trait::async_trait;
use governance_types::{AgentId, PrismMetrics, VigilMetrics};
use std::collections::HashMap;
use std::sync::RwLock;

/// Source of reflection and belief-trace metrics.
#[async_trait]
pub trait PrismProvider: Send + Sync {
    async fn agent_metrics(&self, agent_id: &AgentId) -> ScorecardResult<Option<PrismMetrics>>;
}

/// Source of trust-decay and violation metrics.
#[async_trait]
pub trait VigilProvider: Send + Sync {
    async fn agent_metrics(&self, agent_id: &AgentId) -> ScorecardResult<Option<VigilMetrics>>;
}

/// Provider that serves whatever metrics were last pushed for an agent.
pub struct StaticMetrics<M> {
    metrics: RwLock<HashMap<AgentId, M>>,
}

pub type StaticPrismProvider = StaticMetrics<PrismMetrics>;
pub type StaticVigilProvider = StaticMetrics<VigilMetrics>;

impl<M: Clone> StaticMetrics<M> {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the metrics served for `agent_id`.
    pub fn set(&self, agent_id: AgentId, metrics: M) {
        // A poisoned map still holds complete entries
        let mut guard = match self.metrics.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(agent_id, metrics);
    }

    fn get(&self, agent_id: &AgentId) -> Option<M> {
        let guard = match self.metrics.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(agent_id).cloned()
    }
}

impl<M: Clone> Default for StaticMetrics<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrismProvider for StaticMetrics<PrismMetrics> {
    async fn agent_metrics(&self, agent_id: &AgentId) -> ScorecardResult<Option<PrismMetrics>> {
        Ok(self.get(agent_id))
    }
}

#[async_trait]
impl VigilProvider for StaticMetrics<VigilMetrics> {
    async fn agent_metrics(&self, agent_id: &AgentId) -> ScorecardResult<Option<VigilMetrics>> {
        Ok(self.get(agent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governance_types::ReflectionMetrics;

    #[tokio::test]
    async fn serves_pushed_metrics() {
        let prism = StaticPrismProvider::new();
        let agent = AgentId::new("alpha");
        assert!(PrismProvider::agent_metrics(&prism, &agent)
            .await
            .unwrap()
            .is_none());

        prism.set(
            agent.clone(),
            PrismMetrics {
                reflection: ReflectionMetrics {
                    total: 4,
                    compliant: 3,
                },
                ..Default::default()
            },
        );
        let metrics = PrismProvider::agent_metrics(&prism, &agent)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metrics.reflection.compliant, 3);
    }
}
