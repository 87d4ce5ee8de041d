use serde::{Deserialize, Serialize};

/// Weights of the three trust-score components. They are expected to sum to 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreWeights {
    pub reflection: f64,
    pub belief_trace: f64,
    pub violations: f64,
}

impl Default for TrustScoreWeights {
    fn default() -> Self {
        Self {
            reflection: 0.4,
            belief_trace: 0.3,
            violations: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScorecardConfig {
    /// Trust scores below this raise a `caution` warning
    #[serde(default = "default_caution_threshold")]
    pub caution_threshold: f64,
    /// Number of most recent violations kept on a scorecard
    #[serde(default = "default_recent_violation_limit")]
    pub recent_violation_limit: usize,
    /// Violation count at which the violation component reaches zero
    #[serde(default = "default_violation_saturation")]
    pub violation_saturation: usize,
    #[serde(default)]
    pub weights: TrustScoreWeights,
}

fn default_caution_threshold() -> f64 {
    0.6
}

fn default_recent_violation_limit() -> usize {
    5
}

fn default_violation_saturation() -> usize {
    10
}

impl Default for ScorecardConfig {
    fn default() -> Self {
        Self {
            caution_threshold: default_caution_threshold(),
            recent_violation_limit: default_recent_violation_limit(),
            violation_saturation: default_violation_saturation(),
            weights: TrustScoreWeights::default(),
        }
    }
}

/// Delegation scoring parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Share of the source's trust score in the delegation average
    #[serde(default = "default_source_weight")]
    pub source_weight: f64,
    #[serde(default = "default_same_constitution_bonus")]
    pub same_constitution_bonus: f64,
    #[serde(default = "default_same_framework_bonus")]
    pub same_framework_bonus: f64,
    #[serde(default = "default_framework_mismatch_penalty")]
    pub framework_mismatch_penalty: f64,
    /// Floor of every delegation score and minimum source trust to delegate
    #[serde(default = "default_min_delegation_score")]
    pub min_delegation_score: f64,
}

fn default_source_weight() -> f64 {
    0.7
}

fn default_same_constitution_bonus() -> f64 {
    0.1
}

fn default_same_framework_bonus() -> f64 {
    0.05
}

fn default_framework_mismatch_penalty() -> f64 {
    0.1
}

fn default_min_delegation_score() -> f64 {
    0.5
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            source_weight: default_source_weight(),
            same_constitution_bonus: default_same_constitution_bonus(),
            same_framework_bonus: default_same_framework_bonus(),
            framework_mismatch_penalty: default_framework_mismatch_penalty(),
            min_delegation_score: default_min_delegation_score(),
        }
    }
}

/// Bounds for the derived analytics views.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Direct connections expanded per node in a trust network
    #[serde(default = "default_max_fan_out")]
    pub max_fan_out: usize,
    /// Longest trend window served; larger requests are clamped
    #[serde(default = "default_max_trend_days")]
    pub max_trend_days: u32,
}

fn default_max_fan_out() -> usize {
    25
}

fn default_max_trend_days() -> u32 {
    365
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_fan_out: default_max_fan_out(),
            max_trend_days: default_max_trend_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: ScorecardConfig =
            serde_json::from_str(r#"{ "caution_threshold": 0.7 }"#).unwrap();
        assert_eq!(config.caution_threshold, 0.7);
        assert_eq!(config.recent_violation_limit, 5);
        assert_eq!(config.weights, TrustScoreWeights::default());

        let lineage: LineageConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(lineage, LineageConfig::default());

        let analytics: AnalyticsConfig =
            serde_json::from_str(r#"{ "max_fan_out": 3 }"#).unwrap();
        assert_eq!(analytics.max_fan_out, 3);
        assert_eq!(analytics.max_trend_days, 365);
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = TrustScoreWeights::default();
        assert!((w.reflection + w.belief_trace + w.violations - 1.0).abs() < 1e-9);
    }
}
