use crate::ArtifactStore;
use async_trait::async_trait;
use director_core::{sha256_hex, DirectorError};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// An in-memory artifact store used in tests and for sandboxes with no
/// durable backing.
#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, DirectorError> {
        let hash = sha256_hex(bytes);
        self.blobs.write().await.insert(hash.clone(), bytes.to_vec());
        Ok(hash)
    }

    async fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, DirectorError> {
        Ok(self.blobs.read().await.get(hash).cloned())
    }
}
