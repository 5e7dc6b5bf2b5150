use crate::ArtifactStore;
use async_trait::async_trait;
use director_core::{sha256_hex, DirectorError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A directory-backed, content-addressed artifact store. Blobs are sharded
/// two-deep by hash prefix (`ab/cd/abcdef...`) to keep any one directory
/// from growing unbounded, the same layout git's object store uses.
#[derive(Debug)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Roots a store at `root`, creating it if absent.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        let (shard, rest) = hash.split_at(hash.len().min(4));
        let (a, b) = shard.split_at(2.min(shard.len()));
        self.root.join(a).join(b).join(rest)
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, DirectorError> {
        let hash = sha256_hex(bytes);
        let path = self.blob_path(&hash);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(DirectorError::Io)?;
        }
        if !path_exists(&path).await {
            fs::write(&path, bytes).await.map_err(DirectorError::Io)?;
            debug!(hash = %hash, bytes = bytes.len(), "artifact stored");
        }
        Ok(hash)
    }

    async fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, DirectorError> {
        let path = self.blob_path(hash);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DirectorError::Io(e)),
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}
