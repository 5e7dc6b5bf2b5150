use crate::{ExecOutcome, FileChange, OperationId, Patch, Sandbox, SandboxPolicy};
use async_trait::async_trait;
use director_core::{sha256_hex, DirectorError};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// An in-memory sandbox with no real process isolation, for unit and
/// integration tests that only need the lifecycle contract to behave
/// correctly. Files live in a flat `path -> bytes` map; `exec` always
/// succeeds with a configurable canned outcome.
#[derive(Default)]
pub struct MockSandbox {
    files: RwLock<HashMap<Uuid, HashMap<String, Vec<u8>>>>,
    checkpoints: RwLock<HashMap<(Uuid, String), HashMap<String, Vec<u8>>>>,
    destroyed: RwLock<HashSet<Uuid>>,
    seen_operations: RwLock<HashSet<OperationId>>,
}

impl MockSandbox {
    /// Creates an empty mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn already_applied(&self, operation_id: OperationId) -> bool {
        !self.seen_operations.write().await.insert(operation_id)
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn create(&self, operation_id: OperationId, _policy: SandboxPolicy) -> Result<Uuid, DirectorError> {
        let sandbox_id = Uuid::new_v4();
        self.seen_operations.write().await.insert(operation_id);
        self.files.write().await.insert(sandbox_id, HashMap::new());
        Ok(sandbox_id)
    }

    async fn exec(
        &self,
        _sandbox_id: Uuid,
        operation_id: OperationId,
        command: &str,
    ) -> Result<ExecOutcome, DirectorError> {
        self.already_applied(operation_id).await;
        Ok(ExecOutcome {
            exit_code: 0,
            stdout_ref: sha256_hex(command.as_bytes()),
            stderr_ref: sha256_hex(b""),
        })
    }

    async fn write_files(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        patch: &Patch,
    ) -> Result<String, DirectorError> {
        if self.already_applied(operation_id).await {
            return Ok(sha256_hex(b"cached"));
        }

        let mut files = self.files.write().await;
        let entry = files.entry(sandbox_id).or_default();
        let mut digest_input = Vec::new();
        for change in patch {
            match change {
                FileChange::Write { path, contents } => {
                    entry.insert(path.to_string_lossy().to_string(), contents.clone());
                    digest_input.extend_from_slice(contents);
                }
                FileChange::Delete { path } => {
                    entry.remove(&path.to_string_lossy().to_string());
                }
                FileChange::Move { from, to } => {
                    if let Some(bytes) = entry.remove(&from.to_string_lossy().to_string()) {
                        entry.insert(to.to_string_lossy().to_string(), bytes);
                    }
                }
            }
        }
        Ok(sha256_hex(&digest_input))
    }

    async fn checkpoint(&self, sandbox_id: Uuid, operation_id: OperationId) -> Result<String, DirectorError> {
        self.already_applied(operation_id).await;
        let checkpoint_ref = Uuid::new_v4().to_string();
        let snapshot = self.files.read().await.get(&sandbox_id).cloned().unwrap_or_default();
        self.checkpoints
            .write()
            .await
            .insert((sandbox_id, checkpoint_ref.clone()), snapshot);
        Ok(checkpoint_ref)
    }

    async fn restore(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        checkpoint_ref: &str,
    ) -> Result<(), DirectorError> {
        self.already_applied(operation_id).await;
        let snapshot = self
            .checkpoints
            .read()
            .await
            .get(&(sandbox_id, checkpoint_ref.to_string()))
            .cloned()
            .ok_or_else(|| DirectorError::SandboxUnavailable {
                sandbox_id: sandbox_id.to_string(),
                reason: "unknown checkpoint".to_string(),
            })?;
        self.files.write().await.insert(sandbox_id, snapshot);
        Ok(())
    }

    async fn destroy(&self, sandbox_id: Uuid, operation_id: OperationId) -> Result<(), DirectorError> {
        self.already_applied(operation_id).await;
        self.files.write().await.remove(&sandbox_id);
        self.destroyed.write().await.insert(sandbox_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_checkpoint_mutate_restore_round_trips() {
        let sb = MockSandbox::new();
        let sandbox_id = sb.create(Uuid::new_v4(), SandboxPolicy::default()).await.unwrap();
        sb.write_files(
            sandbox_id,
            Uuid::new_v4(),
            &vec![FileChange::Write {
                path: "a.txt".into(),
                contents: b"before".to_vec(),
            }],
        )
        .await
        .unwrap();
        let checkpoint_ref = sb.checkpoint(sandbox_id, Uuid::new_v4()).await.unwrap();
        sb.write_files(
            sandbox_id,
            Uuid::new_v4(),
            &vec![FileChange::Write {
                path: "a.txt".into(),
                contents: b"after".to_vec(),
            }],
        )
        .await
        .unwrap();
        sb.restore(sandbox_id, Uuid::new_v4(), &checkpoint_ref).await.unwrap();

        let files = sb.files.read().await;
        assert_eq!(files.get(&sandbox_id).unwrap().get("a.txt"), Some(&b"before".to_vec()));
    }

    #[tokio::test]
    async fn restore_unknown_checkpoint_fails() {
        let sb = MockSandbox::new();
        let sandbox_id = sb.create(Uuid::new_v4(), SandboxPolicy::default()).await.unwrap();
        let err = sb.restore(sandbox_id, Uuid::new_v4(), "ghost").await.unwrap_err();
        assert!(matches!(err, DirectorError::SandboxUnavailable { .. }));
    }
}
