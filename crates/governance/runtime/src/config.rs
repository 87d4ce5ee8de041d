//! Layered configuration for the whole subsystem.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. an optional file (format picked from its extension)
//! 3. `GOVERNANCE_*` environment variables, `__` separating nested keys,
//!    e.g. `GOVERNANCE_SCORECARD__CAUTION_THRESHOLD=0.7`

use crate::error::{ConfigError, ConfigResult};
use governance_coordination::CoordinationConfig;
use governance_crypto::CryptoConfig;
use governance_identity::IdentityConfig;
use governance_scorecard::{AnalyticsConfig, LineageConfig, ScorecardConfig};
use governance_storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scorecard: ScorecardConfig,
    #[serde(default)]
    pub lineage: LineageConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GovernanceConfig {
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GOVERNANCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings that would make scores meaningless.
    pub fn validate(&self) -> ConfigResult<()> {
        let weights = &self.scorecard.weights;
        if [weights.reflection, weights.belief_trace, weights.violations]
            .iter()
            .any(|w| *w < 0.0)
        {
            return Err(ConfigError::Invalid(
                "trust score weights must not be negative".into(),
            ));
        }
        let sum = weights.reflection + weights.belief_trace + weights.violations;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "trust score weights must sum to 1, got {sum}"
            )));
        }

        unit_interval("scorecard.caution_threshold", self.scorecard.caution_threshold)?;
        unit_interval("lineage.source_weight", self.lineage.source_weight)?;
        unit_interval("lineage.min_delegation_score", self.lineage.min_delegation_score)?;
        unit_interval(
            "coordination.high_trust_adjacency",
            self.coordination.high_trust_adjacency,
        )?;
        unit_interval(
            "coordination.medium_trust_adjacency",
            self.coordination.medium_trust_adjacency,
        )?;
        if self.coordination.medium_trust_adjacency > self.coordination.high_trust_adjacency {
            return Err(ConfigError::Invalid(
                "coordination.medium_trust_adjacency exceeds high_trust_adjacency".into(),
            ));
        }

        if self.identity.proof_validity_days <= 0 {
            return Err(ConfigError::Invalid(
                "identity.proof_validity_days must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn unit_interval(name: &str, value: f64) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GovernanceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage, StorageConfig::Memory);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("governance.toml");
        std::fs::write(
            &path,
            r#"
[scorecard]
caution_threshold = 0.7

[lineage]
min_delegation_score = 0.4

[storage]
backend = "file"
root = "/var/lib/governance"
"#,
        )
        .unwrap();

        let config = GovernanceConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scorecard.caution_threshold, 0.7);
        assert_eq!(config.lineage.min_delegation_score, 0.4);
        assert_eq!(config.lineage.source_weight, 0.7);
        assert!(matches!(config.storage, StorageConfig::File { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernanceConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.scorecard.caution_threshold, 0.6);
    }

    #[test]
    fn unbalanced_weights_are_rejected() {
        let mut config = GovernanceConfig::default();
        config.scorecard.weights.reflection = 0.9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1"));

        let mut config = GovernanceConfig::default();
        config.coordination.medium_trust_adjacency = 0.9;
        assert!(config.validate().is_err());
    }
}
