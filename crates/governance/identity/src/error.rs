use governance_crypto::CryptoError;
use governance_types::SchemaError;
use thiserror::Error;

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("contract file error at {path}: {source}")]
    ContractIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}
