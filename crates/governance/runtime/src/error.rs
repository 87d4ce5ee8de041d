use governance_crypto::CryptoError;
use governance_scorecard::ScorecardError;
use governance_storage::StorageError;
use governance_types::AgentId;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("scorecard error: {0}")]
    Scorecard(#[from] ScorecardError),

    #[error("agent {0} could not be given a governance identity")]
    Untagged(AgentId),
}
