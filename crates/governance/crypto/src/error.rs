use std::path::PathBuf;
use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key I/O error at {path}: {source}")]
    KeyIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key encoding error: {0}")]
    KeyEncoding(String),

    #[error("unknown public key: {0}")]
    UnknownKey(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("record is not signed")]
    Unsigned,

    #[error("key store lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_algorithm_names_algorithm() {
        let err = CryptoError::UnsupportedAlgorithm("rsa".into());
        assert!(err.to_string().contains("rsa"));
    }
}
