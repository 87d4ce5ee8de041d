use governance_types::ConfidenceModifiers;
use serde::{Deserialize, Serialize};

/// Whether failed trust requirements affect the interaction policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Failed requirements drive the source's fallback strategy
    #[default]
    Enforce,
    /// Failures are recorded but every pair is reported compatible
    AuditOnly,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub enforcement: EnforcementMode,
    /// Honour `log-and-proceed`; when false it is escalated to `restrict`
    #[serde(default = "default_allow_soft_fail")]
    pub allow_soft_fail: bool,
    /// Penalties written into newly tagged identities
    #[serde(default)]
    pub default_modifiers: ConfidenceModifiers,
    #[serde(default = "default_proof_validity_days")]
    pub proof_validity_days: i64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_allow_soft_fail() -> bool {
    true
}

fn default_proof_validity_days() -> i64 {
    30
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            enforcement: EnforcementMode::default(),
            allow_soft_fail: default_allow_soft_fail(),
            default_modifiers: ConfidenceModifiers::default(),
            proof_validity_days: default_proof_validity_days(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl IdentityConfig {
    pub fn enforces(&self) -> bool {
        self.enforcement == EnforcementMode::Enforce
    }
}
