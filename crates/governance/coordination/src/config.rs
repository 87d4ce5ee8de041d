use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Buffer of the message bus broadcast channel
    #[serde(default = "default_message_capacity")]
    pub message_capacity: usize,
    /// Governed-cohort adjacency at or above which trust is labelled high
    #[serde(default = "default_high_trust_adjacency")]
    pub high_trust_adjacency: f64,
    /// Governed-cohort adjacency at or above which trust is labelled medium
    #[serde(default = "default_medium_trust_adjacency")]
    pub medium_trust_adjacency: f64,
}

fn default_message_capacity() -> usize {
    256
}

fn default_high_trust_adjacency() -> f64 {
    0.75
}

fn default_medium_trust_adjacency() -> f64 {
    0.4
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            message_capacity: default_message_capacity(),
            high_trust_adjacency: default_high_trust_adjacency(),
            medium_trust_adjacency: default_medium_trust_adjacency(),
        }
    }
}
