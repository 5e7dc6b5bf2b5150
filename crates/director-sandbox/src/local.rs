use crate::{ExecOutcome, FileChange, OperationId, Patch, Sandbox, SandboxPolicy};
use async_trait::async_trait;
use director_artifact::ArtifactStore;
use director_core::{sha256_hex, DirectorError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};
use tracing::info;
use uuid::Uuid;

/// Cached result of a single idempotent operation, keyed by `operation_id`.
/// Reusing an `operation_id` after its first successful application returns
/// the cached value instead of repeating the side effect (spec §4.3: "All
/// operations are idempotent on `(sandbox_id, operation_id)`").
#[derive(Debug, Clone)]
enum CachedOp {
    Create(Uuid),
    Exec(ExecOutcome),
    WriteFiles(String),
    Checkpoint(String),
    Restore,
    Destroy,
}

struct Instance {
    root: TempDir,
    checkpoint_root: TempDir,
    policy: SandboxPolicy,
    checkpoints: HashMap<String, PathBuf>,
    destroyed: bool,
}

/// A real, filesystem-backed local sandbox. Each sandbox is a temporary
/// directory; commands run as real child processes scoped to that
/// directory; checkpoints are full directory snapshots.
pub struct LocalSandbox {
    artifacts: Arc<dyn ArtifactStore>,
    instances: RwLock<HashMap<Uuid, Instance>>,
    operations: RwLock<HashMap<OperationId, CachedOp>>,
}

impl LocalSandbox {
    /// Builds a local sandbox provider storing captured stdout/stderr in
    /// `artifacts`.
    #[must_use]
    pub fn new(artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            artifacts,
            instances: RwLock::new(HashMap::new()),
            operations: RwLock::new(HashMap::new()),
        }
    }

    async fn cached<T, F>(&self, operation_id: OperationId, extract: F) -> Option<T>
    where
        F: FnOnce(&CachedOp) -> Option<T>,
    {
        self.operations.read().await.get(&operation_id).and_then(extract)
    }

    async fn remember(&self, operation_id: OperationId, op: CachedOp) {
        self.operations.write().await.insert(operation_id, op);
    }

    async fn scope_check(scope: &[String], path: &Path) -> Result<(), DirectorError> {
        if glob_set(scope).is_match(path) {
            Ok(())
        } else {
            Err(DirectorError::CapabilityDenied {
                syscall_class: "write".to_string(),
            })
        }
    }
}

fn glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

async fn snapshot_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dst).await?;
    let mut stack = vec![src.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let relative = dir.strip_prefix(src).unwrap_or(&dir);
        let target_dir = dst.join(relative);
        tokio::fs::create_dir_all(&target_dir).await?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                let rel = path.strip_prefix(src).unwrap_or(&path);
                let dest = dst.join(rel);
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(&path, &dest).await?;
            }
        }
    }
    Ok(())
}

async fn clear_dir(dir: &Path) -> std::io::Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn create(&self, operation_id: OperationId, policy: SandboxPolicy) -> Result<Uuid, DirectorError> {
        if let Some(id) = self.cached(operation_id, |op| match op {
            CachedOp::Create(id) => Some(*id),
            _ => None,
        }).await {
            return Ok(id);
        }

        let root = TempDir::new().map_err(DirectorError::Io)?;
        let checkpoint_root = TempDir::new().map_err(DirectorError::Io)?;
        let sandbox_id = Uuid::new_v4();
        self.instances.write().await.insert(
            sandbox_id,
            Instance {
                root,
                checkpoint_root,
                policy,
                checkpoints: HashMap::new(),
                destroyed: false,
            },
        );
        self.remember(operation_id, CachedOp::Create(sandbox_id)).await;
        info!(sandbox_id = %sandbox_id, "local sandbox created");
        Ok(sandbox_id)
    }

    async fn exec(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        command: &str,
    ) -> Result<ExecOutcome, DirectorError> {
        if let Some(cached) = self.cached(operation_id, |op| match op {
            CachedOp::Exec(outcome) => Some(outcome.clone()),
            _ => None,
        }).await {
            return Ok(cached);
        }

        let (workdir, max_wall_ms, exec_permitted) = {
            let instances = self.instances.read().await;
            let instance = instances.get(&sandbox_id).ok_or_else(unavailable)?;
            (
                instance.root.path().to_path_buf(),
                instance.policy.max_wall_ms,
                instance.policy.exec_permitted,
            )
        };

        if !exec_permitted {
            return Err(DirectorError::CapabilityDenied {
                syscall_class: "exec".to_string(),
            });
        }

        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(DirectorError::CapabilityDenied {
            syscall_class: "exec".to_string(),
        })?;
        let args: Vec<&str> = parts.collect();

        let deadline = Duration::from_millis(max_wall_ms.max(1));
        let output = timeout(deadline, Command::new(program).args(args).current_dir(&workdir).output())
            .await
            .map_err(|_| DirectorError::SandboxUnavailable {
                sandbox_id: sandbox_id.to_string(),
                reason: "exec deadline exceeded".to_string(),
            })?
            .map_err(DirectorError::Io)?;

        let stdout_ref = self.artifacts.put(&output.stdout).await?;
        let stderr_ref = self.artifacts.put(&output.stderr).await?;
        let outcome = ExecOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout_ref,
            stderr_ref,
        };
        self.remember(operation_id, CachedOp::Exec(outcome.clone())).await;
        Ok(outcome)
    }

    async fn write_files(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        patch: &Patch,
    ) -> Result<String, DirectorError> {
        if let Some(cached) = self.cached(operation_id, |op| match op {
            CachedOp::WriteFiles(hash) => Some(hash.clone()),
            _ => None,
        }).await {
            return Ok(cached);
        }

        let (workdir, allowed_write) = {
            let instances = self.instances.read().await;
            let instance = instances.get(&sandbox_id).ok_or_else(unavailable)?;
            (instance.root.path().to_path_buf(), instance.policy.allowed_write.clone())
        };

        let mut digest_input = Vec::new();
        for change in patch {
            match change {
                FileChange::Write { path, contents } => {
                    Self::scope_check(&allowed_write, path).await?;
                    let full = workdir.join(path);
                    if let Some(parent) = full.parent() {
                        tokio::fs::create_dir_all(parent).await.map_err(DirectorError::Io)?;
                    }
                    tokio::fs::write(&full, contents).await.map_err(DirectorError::Io)?;
                    digest_input.extend_from_slice(path.to_string_lossy().as_bytes());
                    digest_input.extend_from_slice(contents);
                }
                FileChange::Delete { path } => {
                    Self::scope_check(&allowed_write, path).await?;
                    let full = workdir.join(path);
                    let _ = tokio::fs::remove_file(&full).await;
                    digest_input.extend_from_slice(path.to_string_lossy().as_bytes());
                }
                FileChange::Move { from, to } => {
                    Self::scope_check(&allowed_write, from).await?;
                    Self::scope_check(&allowed_write, to).await?;
                    let full_from = workdir.join(from);
                    let full_to = workdir.join(to);
                    if let Some(parent) = full_to.parent() {
                        tokio::fs::create_dir_all(parent).await.map_err(DirectorError::Io)?;
                    }
                    tokio::fs::rename(&full_from, &full_to).await.map_err(DirectorError::Io)?;
                    digest_input.extend_from_slice(from.to_string_lossy().as_bytes());
                    digest_input.extend_from_slice(to.to_string_lossy().as_bytes());
                }
            }
        }

        let diff_hash = sha256_hex(&digest_input);
        self.remember(operation_id, CachedOp::WriteFiles(diff_hash.clone())).await;
        Ok(diff_hash)
    }

    async fn checkpoint(&self, sandbox_id: Uuid, operation_id: OperationId) -> Result<String, DirectorError> {
        if let Some(cached) = self.cached(operation_id, |op| match op {
            CachedOp::Checkpoint(ckpt) => Some(ckpt.clone()),
            _ => None,
        }).await {
            return Ok(cached);
        }

        let mut instances = self.instances.write().await;
        let instance = instances.get_mut(&sandbox_id).ok_or_else(unavailable)?;
        let checkpoint_ref = Uuid::new_v4().to_string();
        let snapshot_path = instance.checkpoint_root.path().join(&checkpoint_ref);
        snapshot_dir(instance.root.path(), &snapshot_path).await.map_err(DirectorError::Io)?;
        instance.checkpoints.insert(checkpoint_ref.clone(), snapshot_path);
        drop(instances);
        self.remember(operation_id, CachedOp::Checkpoint(checkpoint_ref.clone())).await;
        Ok(checkpoint_ref)
    }

    async fn restore(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        checkpoint_ref: &str,
    ) -> Result<(), DirectorError> {
        if self.cached(operation_id, |op| matches!(op, CachedOp::Restore).then_some(())).await.is_some() {
            return Ok(());
        }

        let (root, snapshot) = {
            let instances = self.instances.read().await;
            let instance = instances.get(&sandbox_id).ok_or_else(unavailable)?;
            let snapshot = instance
                .checkpoints
                .get(checkpoint_ref)
                .cloned()
                .ok_or_else(unavailable)?;
            (instance.root.path().to_path_buf(), snapshot)
        };

        clear_dir(&root).await.map_err(DirectorError::Io)?;
        snapshot_dir(&snapshot, &root).await.map_err(DirectorError::Io)?;
        self.remember(operation_id, CachedOp::Restore).await;
        Ok(())
    }

    async fn destroy(&self, sandbox_id: Uuid, operation_id: OperationId) -> Result<(), DirectorError> {
        if self.cached(operation_id, |op| matches!(op, CachedOp::Destroy).then_some(())).await.is_some() {
            return Ok(());
        }

        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.get_mut(&sandbox_id) {
            instance.destroyed = true;
        }
        instances.remove(&sandbox_id);
        drop(instances);
        self.remember(operation_id, CachedOp::Destroy).await;
        info!(sandbox_id = %sandbox_id, "local sandbox destroyed");
        Ok(())
    }
}

fn unavailable() -> DirectorError {
    DirectorError::SandboxUnavailable {
        sandbox_id: "unknown".to_string(),
        reason: "sandbox not found".to_string(),
    }
}
