//! Read-only views derived from stored scorecards and lineage.

use crate::config::AnalyticsConfig;
use crate::lineage::TrustLineageTracker;
use crate::manager::ScorecardManager;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::join_all;
use governance_types::{
    AgentId, GovernanceFramework, Scorecard, TimeWindow, TrustLineageRecord, WarningLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// Score of the latest scorecard issued on or before `date`
    pub trust_score: Option<f64>,
    pub scorecard_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreTrend {
    pub agent_id: AgentId,
    pub days: u32,
    /// Oldest first, one point per day including today
    pub points: Vec<TrendPoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Root,
    Direct,
    Secondary,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub agent_id: AgentId,
    pub role: NodeRole,
    pub governance_framework: GovernanceFramework,
    pub trust_score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub lineage_id: String,
    pub source: AgentId,
    pub target: AgentId,
    pub delegation_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustNetwork {
    pub root: AgentId,
    pub depth: u8,
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Self::Low
        } else if score >= 0.7 {
            Self::Medium
        } else if score >= 0.5 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyCompliance {
    pub family: String,
    /// Compliance in [0, 1]
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub agent_id: AgentId,
    pub scorecard_id: String,
    pub generated_at: DateTime<Utc>,
    pub policies: Vec<PolicyCompliance>,
    pub overall_score: f64,
    pub risk_level: RiskLevel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentComparisonRow {
    pub agent_id: AgentId,
    pub trust_score: Option<f64>,
    pub compliance_score: Option<f64>,
    pub violations: u64,
    pub warning_level: Option<WarningLevel>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentComparison {
    pub agents: Vec<AgentComparisonRow>,
}

pub struct ScorecardAnalytics {
    config: AnalyticsConfig,
    scorecards: Arc<ScorecardManager>,
    lineage: Arc<TrustLineageTracker>,
}

impl ScorecardAnalytics {
    pub fn new(
        config: AnalyticsConfig,
        scorecards: Arc<ScorecardManager>,
        lineage: Arc<TrustLineageTracker>,
    ) -> Self {
        Self {
            config,
            scorecards,
            lineage,
        }
    }

    /// Daily trust score over the last `days` days: `days + 1` points.
    /// Days without a new scorecard carry the previous score forward.
    /// `days` is clamped to the configured `max_trend_days`.
    pub async fn generate_trust_score_trend(&self, agent_id: &AgentId, days: u32) -> TrustScoreTrend {
        let days = days.min(self.config.max_trend_days);
        let today = Utc::now().date_naive();
        // Newest first; older scorecards seed the first points
        let history = self.scorecards.get_scorecard_history(agent_id, None).await;

        let points = (0..=days)
            .rev()
            .filter_map(|offset| {
                let date = today.checked_sub_signed(Duration::days(i64::from(offset)))?;
                let latest = history
                    .iter()
                    .find(|sc| sc.timestamp.date_naive() <= date);
                Some(TrendPoint {
                    date,
                    trust_score: latest.and_then(|sc| sc.trust_score),
                    scorecard_id: latest.map(|sc| sc.scorecard_id.clone()),
                })
            })
            .collect();

        TrustScoreTrend {
            agent_id: agent_id.clone(),
            days,
            points,
        }
    }

    /// Delegation graph around `agent_id`. Depth 1 holds direct
    /// connections; depth 2 adds their connections as secondary nodes.
    /// Other depths are clamped into that range.
    pub async fn generate_trust_network(&self, agent_id: &AgentId, depth: u8) -> TrustNetwork {
        let depth = depth.clamp(1, 2);
        let fan_out = self.config.max_fan_out.max(1);
        let mut builder = NetworkBuilder::default();

        let root_score = self
            .scorecards
            .get_latest_scorecard(agent_id)
            .await;
        builder.add_node(
            agent_id,
            NodeRole::Root,
            root_score
                .as_ref()
                .map(|sc| sc.governance_identity.governance_framework)
                .unwrap_or(GovernanceFramework::Unknown),
            root_score.as_ref().and_then(|sc| sc.trust_score),
        );

        let direct_edges = self.bounded_chain(agent_id, fan_out).await;
        let direct = builder.add_edges(agent_id, &direct_edges, NodeRole::Direct);

        if depth == 2 {
            for neighbour in &direct {
                let edges = self.bounded_chain(neighbour, fan_out).await;
                builder.add_edges(neighbour, &edges, NodeRole::Secondary);
            }
        }

        for node in builder.nodes.iter_mut().filter(|n| n.role != NodeRole::Root) {
            if let Some(latest) = self.scorecards.get_latest_scorecard(&node.agent_id).await {
                node.trust_score = latest.trust_score;
            }
        }

        debug!(
            agent_id = %agent_id,
            depth,
            nodes = builder.nodes.len(),
            edges = builder.edges.len(),
            "Built trust network"
        );
        TrustNetwork {
            root: agent_id.clone(),
            depth,
            nodes: builder.nodes,
            edges: builder.edges,
        }
    }

    async fn bounded_chain(&self, agent_id: &AgentId, fan_out: usize) -> Vec<TrustLineageRecord> {
        let mut chain = self.lineage.get_delegation_chain(agent_id).await;
        chain.truncate(fan_out);
        chain
    }

    /// Compliance per policy family from the latest scorecard, or `None`
    /// when the agent has never been scored.
    pub async fn generate_compliance_report(&self, agent_id: &AgentId) -> Option<ComplianceReport> {
        let scorecard = self.scorecards.get_latest_scorecard(agent_id).await?;
        Some(self.compliance_of(&scorecard))
    }

    fn compliance_of(&self, scorecard: &Scorecard) -> ComplianceReport {
        let saturation = self.scorecards.config().violation_saturation.max(1) as f64;
        let violations = scorecard.violation_history.count as f64;
        let policies = vec![
            PolicyCompliance {
                family: "reflection".into(),
                score: scorecard.reflection_compliance.percentage / 100.0,
            },
            PolicyCompliance {
                family: "belief_trace".into(),
                score: scorecard.belief_trace_integrity.percentage / 100.0,
            },
            PolicyCompliance {
                family: "violations".into(),
                score: 1.0 - violations.min(saturation) / saturation,
            },
            PolicyCompliance {
                family: "governance".into(),
                score: governance_weight(scorecard.governance_identity.governance_framework),
            },
        ];
        let overall_score =
            policies.iter().map(|p| p.score).sum::<f64>() / policies.len() as f64;

        ComplianceReport {
            agent_id: scorecard.agent_id.clone(),
            scorecard_id: scorecard.scorecard_id.clone(),
            generated_at: Utc::now(),
            policies,
            overall_score,
            risk_level: RiskLevel::from_score(overall_score),
        }
    }

    /// Side-by-side view of the latest scorecard of each agent. Agents
    /// that were never scored appear with empty values.
    pub async fn compare_agents(&self, agent_ids: &[AgentId]) -> AgentComparison {
        let latest = join_all(
            agent_ids
                .iter()
                .map(|id| self.scorecards.get_latest_scorecard(id)),
        )
        .await;

        let agents = agent_ids
            .iter()
            .zip(latest)
            .map(|(agent_id, scorecard)| match scorecard {
                Some(sc) => AgentComparisonRow {
                    agent_id: agent_id.clone(),
                    trust_score: sc.trust_score,
                    compliance_score: Some(self.compliance_of(&sc).overall_score),
                    violations: sc.violation_history.count,
                    warning_level: Some(sc.warning_state.level),
                },
                None => AgentComparisonRow {
                    agent_id: agent_id.clone(),
                    trust_score: None,
                    compliance_score: None,
                    violations: 0,
                    warning_level: None,
                },
            })
            .collect();
        AgentComparison { agents }
    }
}

fn governance_weight(framework: GovernanceFramework) -> f64 {
    match framework {
        GovernanceFramework::Promethios => 1.0,
        GovernanceFramework::ExternalVerified => 0.8,
        GovernanceFramework::External => 0.5,
        GovernanceFramework::Unknown => 0.0,
    }
}

#[derive(Default)]
struct NetworkBuilder {
    nodes: Vec<NetworkNode>,
    edges: Vec<NetworkEdge>,
    node_index: HashMap<AgentId, usize>,
    edge_ids: HashSet<String>,
}

impl NetworkBuilder {
    fn add_node(
        &mut self,
        agent_id: &AgentId,
        role: NodeRole,
        framework: GovernanceFramework,
        trust_score: Option<f64>,
    ) -> bool {
        if self.node_index.contains_key(agent_id) {
            return false;
        }
        self.node_index.insert(agent_id.clone(), self.nodes.len());
        self.nodes.push(NetworkNode {
            agent_id: agent_id.clone(),
            role,
            governance_framework: framework,
            trust_score,
        });
        true
    }

    /// Add the edges around `center` and return the counterparts that
    /// were new to the graph.
    fn add_edges(
        &mut self,
        center: &AgentId,
        records: &[TrustLineageRecord],
        role: NodeRole,
    ) -> Vec<AgentId> {
        let mut added = Vec::new();
        for record in records {
            if !self.edge_ids.insert(record.lineage_id.clone()) {
                continue;
            }
            self.edges.push(NetworkEdge {
                lineage_id: record.lineage_id.clone(),
                source: record.source_agent.id.clone(),
                target: record.target_agent.id.clone(),
                delegation_score: record.trust_metrics.delegation_score,
            });

            let other = if record.source_agent.id == *center {
                &record.target_agent
            } else {
                &record.source_agent
            };
            if self.add_node(&other.id, role, other.governance_framework, other.trust_score) {
                added.push(other.id.clone());
            }
        }
        added
    }
}
