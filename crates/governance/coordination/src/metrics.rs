//! Read-only views over a coordination context: traffic, trust boundaries
//! and the governed vs non-governed performance comparison.

use crate::model::{CoordinationMessage, RegisteredAgent, TaskAllocation};
use governance_types::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageTraffic {
    pub total: u64,
    pub by_kind: BTreeMap<String, u64>,
}

/// How message edges fall across the governed/non-governed divide.
///
/// An edge is one sender-recipient pair of a message between two members.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustBoundaries {
    pub governed: Vec<AgentId>,
    pub non_governed: Vec<AgentId>,
    pub governed_edges: u64,
    pub non_governed_edges: u64,
    pub crossing_edges: u64,
}

impl TrustBoundaries {
    pub fn from_traffic(agents: &[RegisteredAgent], messages: &[CoordinationMessage]) -> Self {
        let (governed, non_governed): (Vec<_>, Vec<_>) = agents.iter().partition(|a| a.governed);
        let governed: Vec<AgentId> = governed.into_iter().map(|a| a.agent_id.clone()).collect();
        let non_governed: Vec<AgentId> =
            non_governed.into_iter().map(|a| a.agent_id.clone()).collect();

        let governed_set: HashSet<&AgentId> = governed.iter().collect();
        let members: HashSet<&AgentId> = agents.iter().map(|a| &a.agent_id).collect();

        let mut boundaries = Self::default();
        for message in messages {
            if !members.contains(&message.sender) {
                continue;
            }
            let sender_governed = governed_set.contains(&message.sender);
            for recipient in &message.recipients {
                if recipient == &message.sender || !members.contains(recipient) {
                    continue;
                }
                match (sender_governed, governed_set.contains(recipient)) {
                    (true, true) => boundaries.governed_edges += 1,
                    (false, false) => boundaries.non_governed_edges += 1,
                    _ => boundaries.crossing_edges += 1,
                }
            }
        }

        boundaries.governed = governed;
        boundaries.non_governed = non_governed;
        boundaries
    }

    /// Share of the governed cohort's traffic that stays inside it. With no
    /// such traffic, the share of governed members stands in.
    pub fn governed_adjacency(&self) -> f64 {
        let touching = self.governed_edges + self.crossing_edges;
        if touching > 0 {
            return self.governed_edges as f64 / touching as f64;
        }
        let members = self.governed.len() + self.non_governed.len();
        if members == 0 {
            0.0
        } else {
            self.governed.len() as f64 / members as f64
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    pub context_id: String,
    pub agent_count: usize,
    pub governed_count: usize,
    pub governed_ratio: f64,
    /// Members per governance framework
    pub frameworks: BTreeMap<String, usize>,
    pub messages: MessageTraffic,
    pub tasks_total: usize,
    pub tasks_completed: usize,
    pub trust_boundaries: TrustBoundaries,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub agent_id: AgentId,
    pub governed: bool,
    pub assigned: usize,
    pub completed: usize,
    pub completion_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortPerformance {
    pub agents: usize,
    pub assigned: usize,
    pub completed: usize,
    /// Completed over assigned subtasks; zero when nothing was assigned
    pub completion_rate: f64,
}

impl CohortPerformance {
    fn from_agents<'a>(rows: impl Iterator<Item = &'a AgentPerformance>) -> Self {
        let mut cohort = Self::default();
        for row in rows {
            cohort.agents += 1;
            cohort.assigned += row.assigned;
            cohort.completed += row.completed;
        }
        cohort.completion_rate = ratio(cohort.completed, cohort.assigned);
        cohort
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernanceContrast {
    pub context_id: String,
    pub governed: CohortPerformance,
    pub non_governed: CohortPerformance,
    /// Governed minus non-governed completion rate
    pub completion_rate_delta: f64,
    pub adjacency: f64,
    pub trust_level: TrustLevel,
    pub trust_boundaries: TrustBoundaries,
    pub agents: Vec<AgentPerformance>,
}

pub(crate) fn message_traffic(messages: &[CoordinationMessage]) -> MessageTraffic {
    let mut traffic = MessageTraffic::default();
    for message in messages {
        traffic.total += 1;
        *traffic
            .by_kind
            .entry(message.kind.as_str().to_string())
            .or_insert(0) += 1;
    }
    traffic
}

pub(crate) fn agent_performance(
    agents: &[RegisteredAgent],
    tasks: &[TaskAllocation],
) -> Vec<AgentPerformance> {
    agents
        .iter()
        .map(|agent| {
            let mine = tasks
                .iter()
                .flat_map(|t| t.assignments.iter())
                .filter(|a| a.agent_id == agent.agent_id);
            let (assigned, completed) = mine.fold((0, 0), |(assigned, completed), a| {
                (assigned + 1, completed + usize::from(a.is_complete()))
            });
            AgentPerformance {
                agent_id: agent.agent_id.clone(),
                governed: agent.governed,
                assigned,
                completed,
                completion_rate: ratio(completed, assigned),
            }
        })
        .collect()
}

pub(crate) fn cohorts(rows: &[AgentPerformance]) -> (CohortPerformance, CohortPerformance) {
    (
        CohortPerformance::from_agents(rows.iter().filter(|r| r.governed)),
        CohortPerformance::from_agents(rows.iter().filter(|r| !r.governed)),
    )
}

pub(crate) fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
