#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Content-addressed artifact storage (spec §6.4): "large payloads may be
//! offloaded by hash reference." Verifier stdout/stderr and other raw,
//! untrusted evidence live here, never inline in an event payload (P4).

mod file;
mod memory;

pub use file::FileArtifactStore;
pub use memory::MemoryArtifactStore;

use async_trait::async_trait;
use director_core::DirectorError;

/// A content-addressed blob store keyed by the SHA-256 hex digest of its
/// contents. Storing the same bytes twice returns the same hash and does
/// not duplicate storage (puts are idempotent by content).
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` and returns its SHA-256 hex digest.
    ///
    /// # Errors
    /// Returns [`DirectorError::Io`] if the bytes cannot be persisted.
    async fn put(&self, bytes: &[u8]) -> Result<String, DirectorError>;

    /// Retrieves the bytes for `hash`, if present.
    ///
    /// # Errors
    /// Returns [`DirectorError::Io`] on a storage-layer read failure;
    /// a missing artifact is `Ok(None)`, not an error.
    async fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, DirectorError>;

    /// `true` when an artifact with `hash` is present.
    async fn contains(&self, hash: &str) -> bool {
        matches!(self.get(hash).await, Ok(Some(_)))
    }
}
