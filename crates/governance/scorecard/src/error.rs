use governance_crypto::CryptoError;
use governance_storage::StorageError;
use governance_types::{AgentId, SchemaError};
use thiserror::Error;

/// Result type for scorecard operations.
pub type ScorecardResult<T> = Result<T, ScorecardError>;

/// Result type for lineage operations.
pub type LineageResult<T> = Result<T, LineageError>;

#[derive(Debug, Error)]
pub enum ScorecardError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("scorecard {0} must be signed before it is stored")]
    Unsigned(String),
}

/// Delegation rejections carry their reason in the display text.
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("cannot delegate trust: source agent {0} has a null trust score")]
    NullTrustScore(AgentId),

    #[error("cannot delegate trust: source trust score {score:.3} is below minimum threshold {minimum:.3}")]
    BelowThreshold { score: f64, minimum: f64 },

    #[error("cannot delegate trust: target agent {0} has unknown governance")]
    UnknownGovernance(AgentId),

    #[error("scorecard for {found} does not belong to {expected}")]
    ScorecardMismatch { expected: AgentId, found: AgentId },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
