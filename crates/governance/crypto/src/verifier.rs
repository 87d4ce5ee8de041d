//! Record signing and verification.
//!
//! Scorecards are signed over their merkle root; lineage records over the
//! SHA-256 of their canonical form. In both cases the `cryptographic_proof`
//! block itself is excluded from what is signed.

use crate::error::{CryptoError, CryptoResult};
use crate::hashing;
use crate::keys::KeyStore;
use crate::merkle::object_merkle_root;
use chrono::Utc;
use ed25519_dalek::{Signature, Verifier};
use governance_types::{Scorecard, TrustLineageRecord, DEFAULT_SIGNATURE_ALGORITHM};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const PROOF_FIELD: &str = "cryptographic_proof";

/// Supported signature algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => DEFAULT_SIGNATURE_ALGORITHM,
        }
    }

    pub fn parse(name: &str) -> CryptoResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(Self::Ed25519),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Key and algorithm settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Directory for persisted key material; keys are ephemeral when unset
    #[serde(default)]
    pub key_dir: Option<PathBuf>,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

fn default_algorithm() -> String {
    DEFAULT_SIGNATURE_ALGORITHM.to_string()
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            key_dir: None,
            algorithm: default_algorithm(),
        }
    }
}

/// Signs and verifies governance records with keys from a [`KeyStore`].
pub struct CryptographicVerifier {
    keys: Arc<KeyStore>,
    algorithm: SignatureAlgorithm,
    signature_checks: AtomicU64,
}

impl CryptographicVerifier {
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self {
            keys,
            algorithm: SignatureAlgorithm::Ed25519,
            signature_checks: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CryptoConfig) -> CryptoResult<Self> {
        let algorithm = SignatureAlgorithm::parse(&config.algorithm)?;
        let keys = match &config.key_dir {
            Some(dir) => KeyStore::file_backed(dir),
            None => KeyStore::ephemeral(),
        };
        Ok(Self {
            keys: Arc::new(keys),
            algorithm,
            signature_checks: AtomicU64::new(0),
        })
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Load or generate the signing key. Idempotent.
    pub fn ensure_keys(&self) -> CryptoResult<String> {
        self.keys.ensure_keys()
    }

    /// Replace the signing key. Records signed by earlier keys still verify.
    pub fn rotate_keys(&self) -> CryptoResult<String> {
        self.keys.rotate()
    }

    /// SHA-256 of the canonical form of any serializable value.
    pub fn hash_content<T: Serialize + ?Sized>(&self, value: &T) -> CryptoResult<String> {
        hashing::hash_content(value)
    }

    /// Merkle root over every scorecard field except the proof block.
    pub fn compute_scorecard_merkle_root(&self, scorecard: &Scorecard) -> CryptoResult<String> {
        object_merkle_root(scorecard, &[PROOF_FIELD])
    }

    /// Fill in the scorecard's proof block.
    pub fn sign_scorecard(&self, mut scorecard: Scorecard) -> CryptoResult<Scorecard> {
        let root = self.compute_scorecard_merkle_root(&scorecard)?;
        let (signature, key_id) = self.keys.sign(root.as_bytes())?;

        let proof = &mut scorecard.cryptographic_proof;
        proof.signature = Some(hex::encode(signature.to_bytes()));
        proof.public_key_id = Some(key_id);
        proof.merkle_root = Some(root);
        proof.timestamp = Some(Utc::now());
        proof.algorithm = self.algorithm.as_str().to_string();

        debug!(
            agent_id = %scorecard.agent_id,
            scorecard_id = %scorecard.scorecard_id,
            "Signed scorecard"
        );
        Ok(scorecard)
    }

    /// True only when the merkle root matches the content and the signature
    /// over that root verifies.
    pub fn verify_scorecard(&self, scorecard: &Scorecard) -> bool {
        match self.check_scorecard(scorecard) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(
                    scorecard_id = %scorecard.scorecard_id,
                    error = %e,
                    "Scorecard verification failed"
                );
                false
            }
        }
    }

    fn check_scorecard(&self, scorecard: &Scorecard) -> CryptoResult<bool> {
        let proof = &scorecard.cryptographic_proof;
        let (Some(signature), Some(key_id), Some(stored_root)) = (
            proof.signature.as_deref(),
            proof.public_key_id.as_deref(),
            proof.merkle_root.as_deref(),
        ) else {
            return Err(CryptoError::Unsigned);
        };
        SignatureAlgorithm::parse(&proof.algorithm)?;

        let root = self.compute_scorecard_merkle_root(scorecard)?;
        if root != stored_root {
            warn!(
                scorecard_id = %scorecard.scorecard_id,
                "Scorecard merkle root mismatch"
            );
            return Ok(false);
        }
        self.check_signature(root.as_bytes(), signature, key_id)
    }

    /// SHA-256 over the canonical lineage record without its proof block.
    pub fn lineage_digest(&self, record: &TrustLineageRecord) -> CryptoResult<String> {
        let mut value =
            serde_json::to_value(record).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        if let Some(map) = value.as_object_mut() {
            map.remove(PROOF_FIELD);
        }
        Ok(hashing::sha256_hex(hashing::canonical_json(&value).as_bytes()))
    }

    pub fn sign_lineage_record(
        &self,
        mut record: TrustLineageRecord,
    ) -> CryptoResult<TrustLineageRecord> {
        let digest = self.lineage_digest(&record)?;
        let (signature, key_id) = self.keys.sign(digest.as_bytes())?;

        let proof = &mut record.cryptographic_proof;
        proof.signature = Some(hex::encode(signature.to_bytes()));
        proof.public_key_id = Some(key_id);
        proof.merkle_root = None;
        proof.timestamp = Some(Utc::now());
        proof.algorithm = self.algorithm.as_str().to_string();
        Ok(record)
    }

    pub fn verify_lineage_record(&self, record: &TrustLineageRecord) -> bool {
        let proof = &record.cryptographic_proof;
        let (Some(signature), Some(key_id)) =
            (proof.signature.as_deref(), proof.public_key_id.as_deref())
        else {
            return false;
        };
        let result = self
            .lineage_digest(record)
            .and_then(|digest| self.check_signature(digest.as_bytes(), signature, key_id));
        match result {
            Ok(valid) => valid,
            Err(e) => {
                warn!(lineage_id = %record.lineage_id, error = %e, "Lineage verification failed");
                false
            }
        }
    }

    /// Sign arbitrary bytes. Returns the hex signature and the signing key id.
    pub fn sign_bytes(&self, message: &[u8]) -> CryptoResult<(String, String)> {
        let (signature, key_id) = self.keys.sign(message)?;
        Ok((hex::encode(signature.to_bytes()), key_id))
    }

    /// Verify a hex signature produced by [`Self::sign_bytes`].
    pub fn verify_bytes(&self, message: &[u8], signature: &str, key_id: &str) -> bool {
        match self.check_signature(message, signature, key_id) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(key_id, error = %e, "Signature check failed");
                false
            }
        }
    }

    /// Number of signature checks performed so far.
    pub fn signature_verifications(&self) -> u64 {
        self.signature_checks.load(Ordering::Relaxed)
    }

    fn check_signature(&self, message: &[u8], signature: &str, key_id: &str) -> CryptoResult<bool> {
        let key = self
            .keys
            .verifying_key(key_id)
            .ok_or_else(|| CryptoError::UnknownKey(key_id.to_string()))?;
        let bytes = hex::decode(signature).map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;

        self.signature_checks.fetch_add(1, Ordering::Relaxed);
        Ok(key.verify(message, &signature).is_ok())
    }
}
