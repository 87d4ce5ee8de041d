use crate::file::FileTrustStorage;
use crate::memory::InMemoryTrustStorage;
use crate::traits::TrustStorage;
use crate::StorageResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Persistence backend selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    #[default]
    Memory,
    File { root: PathBuf },
}

impl StorageConfig {
    /// Build the configured backend.
    pub async fn open(&self) -> StorageResult<Arc<dyn TrustStorage>> {
        match self {
            Self::Memory => Ok(Arc::new(InMemoryTrustStorage::new())),
            Self::File { root } => Ok(Arc::new(FileTrustStorage::open(root.clone()).await?)),
        }
    }
}
