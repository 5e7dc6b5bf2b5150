//! Content-addressed attestation storage. An [`Attestation`] is the only
//! object that may promote an atom (I4); its id is derived from its content
//! so two independently produced attestations over the same outcome collapse
//! to the same record instead of accumulating duplicates.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use director_core::{canonical_json, content_uuid, Attestation, DirectorError, VerifierResult};
use tokio::sync::RwLock;

/// Builds an [`Attestation`] with a content-derived id, referencing
/// `(command, config, artifact_hash, report_hash, verifier_version, result)`
/// per spec §3.1.
///
/// # Errors
/// Returns [`DirectorError::Serialization`] if the inputs cannot be hashed.
#[allow(clippy::too_many_arguments)]
pub fn build_attestation(
    target_atom_hash: &str,
    verifier_type: &str,
    command: &str,
    config: &str,
    artifact_hash: &str,
    report_hash: &str,
    verifier_version: &str,
    result: VerifierResult,
    confidence: f64,
) -> Result<Attestation, DirectorError> {
    let seed = canonical_json(&(
        command,
        config,
        artifact_hash,
        report_hash,
        verifier_version,
        result,
    ))?;
    Ok(Attestation {
        attestation_id: content_uuid(seed.as_bytes()),
        target_atom_hash: target_atom_hash.to_string(),
        verifier_type: verifier_type.to_string(),
        result,
        artifact_hash: artifact_hash.to_string(),
        verifier_version: verifier_version.to_string(),
        confidence,
    })
}

/// Durable store for attestations, keyed by their content-derived id.
#[async_trait]
pub trait AttestationStore: Send + Sync {
    /// Persists an attestation, overwriting nothing (same content, same id).
    async fn put(&self, attestation: Attestation) -> Result<(), DirectorError>;

    /// Looks up a previously stored attestation by id.
    async fn get(&self, attestation_id: uuid::Uuid) -> Result<Option<Attestation>, DirectorError>;
}

/// In-memory attestation store, used by tests and by callers without a
/// durable artifact backend.
#[derive(Debug, Default)]
pub struct MemoryAttestationStore {
    inner: RwLock<HashMap<uuid::Uuid, Attestation>>,
}

#[async_trait]
impl AttestationStore for MemoryAttestationStore {
    async fn put(&self, attestation: Attestation) -> Result<(), DirectorError> {
        self.inner.write().await.insert(attestation.attestation_id, attestation);
        Ok(())
    }

    async fn get(&self, attestation_id: uuid::Uuid) -> Result<Option<Attestation>, DirectorError> {
        Ok(self.inner.read().await.get(&attestation_id).cloned())
    }
}

/// Convenience alias for the shared-ownership form every runner holds.
pub type SharedAttestationStore = Arc<dyn AttestationStore>;
