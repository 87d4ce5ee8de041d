//! Ed25519 key lifecycle.
//!
//! Keys are generated on first use and are idempotent afterwards. A
//! file-backed store persists the active pair as `<key_dir>/private.pem`
//! and `<key_dir>/public.pem`; rotated-out public keys are archived under
//! `<key_dir>/archive/<key_id>.pem` so historic signatures stay verifiable.

use crate::error::{CryptoError, CryptoResult};
use crate::hashing::sha256_hex;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use zeroize::Zeroizing;

const PRIVATE_KEY_FILE: &str = "private.pem";
const PUBLIC_KEY_FILE: &str = "public.pem";
const ARCHIVE_DIR: &str = "archive";

/// Stable identifier for a public key: the first 16 hex chars of its SHA-256.
pub fn key_id_for(key: &VerifyingKey) -> String {
    sha256_hex(key.as_bytes())[..16].to_string()
}

struct ActiveKey {
    signing: SigningKey,
    key_id: String,
}

/// Holds the active signing key and every public key it has seen.
pub struct KeyStore {
    key_dir: Option<PathBuf>,
    active: RwLock<Option<Arc<ActiveKey>>>,
    public_keys: RwLock<HashMap<String, VerifyingKey>>,
}

impl KeyStore {
    /// In-memory store; keys die with the process.
    pub fn ephemeral() -> Self {
        Self {
            key_dir: None,
            active: RwLock::new(None),
            public_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Store persisting key material under `key_dir`.
    pub fn file_backed(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: Some(key_dir.into()),
            active: RwLock::new(None),
            public_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Store seeded with a fixed signing key (deterministic deployments and tests).
    pub fn with_signing_key(signing: SigningKey) -> Self {
        let store = Self::ephemeral();
        let key_id = key_id_for(&signing.verifying_key());
        if let Ok(mut keys) = store.public_keys.write() {
            keys.insert(key_id.clone(), signing.verifying_key());
        }
        if let Ok(mut active) = store.active.write() {
            *active = Some(Arc::new(ActiveKey { signing, key_id }));
        }
        store
    }

    pub fn key_dir(&self) -> Option<&Path> {
        self.key_dir.as_deref()
    }

    /// Make sure an active key pair exists, loading or generating it.
    /// Returns the active key id.
    pub fn ensure_keys(&self) -> CryptoResult<String> {
        if let Some(active) = self.active_key()? {
            return Ok(active.key_id.clone());
        }

        let mut guard = self.active.write().map_err(|_| CryptoError::LockPoisoned)?;
        // Another caller may have won the race while we waited for the lock.
        if let Some(active) = guard.as_ref() {
            return Ok(active.key_id.clone());
        }

        let signing = match &self.key_dir {
            Some(dir) => match load_signing_key(dir)? {
                Some(signing) => {
                    self.load_archive(dir)?;
                    info!(key_dir = %dir.display(), "Loaded signing key");
                    signing
                }
                None => {
                    let signing = generate_signing_key();
                    persist_key_pair(dir, &signing)?;
                    info!(key_dir = %dir.display(), "Generated and persisted signing key");
                    signing
                }
            },
            None => {
                debug!("Generated ephemeral signing key");
                generate_signing_key()
            }
        };

        let key_id = key_id_for(&signing.verifying_key());
        self.remember(signing.verifying_key())?;
        *guard = Some(Arc::new(ActiveKey {
            signing,
            key_id: key_id.clone(),
        }));
        Ok(key_id)
    }

    /// Replace the active key pair. The previous public key stays resolvable.
    pub fn rotate(&self) -> CryptoResult<String> {
        let signing = generate_signing_key();
        let key_id = key_id_for(&signing.verifying_key());
        let mut guard = self.active.write().map_err(|_| CryptoError::LockPoisoned)?;

        if let Some(dir) = &self.key_dir {
            if let Some(previous) = guard.as_ref() {
                archive_public_key(dir, &previous.signing.verifying_key(), &previous.key_id)?;
            }
            persist_key_pair(dir, &signing)?;
        }

        self.remember(signing.verifying_key())?;
        info!(key_id = %key_id, "Rotated signing key");
        *guard = Some(Arc::new(ActiveKey {
            signing,
            key_id: key_id.clone(),
        }));
        Ok(key_id)
    }

    /// Sign `message` with the active key, generating one if needed.
    pub fn sign(&self, message: &[u8]) -> CryptoResult<(Signature, String)> {
        self.ensure_keys()?;
        let active = self
            .active_key()?
            .ok_or_else(|| CryptoError::KeyEncoding("no active signing key".to_string()))?;
        Ok((active.signing.sign(message), active.key_id.clone()))
    }

    /// Resolve a public key by id.
    pub fn verifying_key(&self, key_id: &str) -> Option<VerifyingKey> {
        self.public_keys
            .read()
            .ok()
            .and_then(|keys| keys.get(key_id).copied())
    }

    /// Trust an additional public key (e.g. a peer's). Returns its id.
    pub fn register_public_key(&self, key: VerifyingKey) -> CryptoResult<String> {
        self.remember(key)
    }

    pub fn active_key_id(&self) -> Option<String> {
        self.active_key()
            .ok()
            .flatten()
            .map(|active| active.key_id.clone())
    }

    pub fn known_key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .public_keys
            .read()
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn active_key(&self) -> CryptoResult<Option<Arc<ActiveKey>>> {
        Ok(self
            .active
            .read()
            .map_err(|_| CryptoError::LockPoisoned)?
            .clone())
    }

    fn remember(&self, key: VerifyingKey) -> CryptoResult<String> {
        let key_id = key_id_for(&key);
        self.public_keys
            .write()
            .map_err(|_| CryptoError::LockPoisoned)?
            .insert(key_id.clone(), key);
        Ok(key_id)
    }

    fn load_archive(&self, dir: &Path) -> CryptoResult<()> {
        let archive = dir.join(ARCHIVE_DIR);
        if !archive.exists() {
            return Ok(());
        }
        let entries = std::fs::read_dir(&archive).map_err(|source| CryptoError::KeyIo {
            path: archive.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            let pem = read_file(&path)?;
            let key = VerifyingKey::from_public_key_pem(&pem)
                .map_err(|e| CryptoError::KeyEncoding(format!("{}: {}", path.display(), e)))?;
            self.remember(key)?;
        }
        Ok(())
    }
}

fn generate_signing_key() -> SigningKey {
    let mut seed = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(seed.as_mut());
    SigningKey::from_bytes(&seed)
}

fn load_signing_key(dir: &Path) -> CryptoResult<Option<SigningKey>> {
    let path = dir.join(PRIVATE_KEY_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let pem = Zeroizing::new(read_file(&path)?);
    SigningKey::from_pkcs8_pem(&pem)
        .map(Some)
        .map_err(|e| CryptoError::KeyEncoding(format!("{}: {}", path.display(), e)))
}

fn persist_key_pair(dir: &Path, signing: &SigningKey) -> CryptoResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| CryptoError::KeyIo {
        path: dir.to_path_buf(),
        source,
    })?;

    let private_pem = signing
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
    let public_pem = signing
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;

    let private_path = dir.join(PRIVATE_KEY_FILE);
    write_file(&private_path, private_pem.as_bytes())?;
    restrict_permissions(&private_path)?;
    write_file(&dir.join(PUBLIC_KEY_FILE), public_pem.as_bytes())
}

fn archive_public_key(dir: &Path, key: &VerifyingKey, key_id: &str) -> CryptoResult<()> {
    let archive = dir.join(ARCHIVE_DIR);
    std::fs::create_dir_all(&archive).map_err(|source| CryptoError::KeyIo {
        path: archive.clone(),
        source,
    })?;
    let pem = key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
    write_file(&archive.join(format!("{}.pem", key_id)), pem.as_bytes())
}

fn read_file(path: &Path) -> CryptoResult<String> {
    std::fs::read_to_string(path).map_err(|source| CryptoError::KeyIo {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> CryptoResult<()> {
    std::fs::write(path, contents).map_err(|source| CryptoError::KeyIo {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> CryptoResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
        CryptoError::KeyIo {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> CryptoResult<()> {
    Ok(())
}
