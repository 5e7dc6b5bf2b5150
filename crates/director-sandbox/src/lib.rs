#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The Sandbox Provider (spec §4.3): "a uniform interface over one or more
//! isolated execution backends (a local runner and a remote adapter)."
//!
//! All operations are idempotent on `(sandbox_id, operation_id)` per the
//! spec's failure semantics; each implementation is responsible for caching
//! the result of an operation id it has already seen rather than repeating
//! side effects.

mod local;
mod mock;
mod policy;
mod remote;

pub use local::LocalSandbox;
pub use mock::MockSandbox;
pub use policy::{Egress, SandboxPolicy};
pub use remote::{RemoteSandbox, RetryConfig};

use async_trait::async_trait;
use director_core::DirectorError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A single file-level mutation in a structured patch (spec §4.3
/// `write_files(sandbox_id, patch) -> diff_hash`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FileChange {
    /// Write (create or overwrite) a file with the given contents.
    Write {
        /// Path relative to the sandbox worktree root.
        path: PathBuf,
        /// New file contents.
        contents: Vec<u8>,
    },
    /// Delete a file.
    Delete {
        /// Path relative to the sandbox worktree root.
        path: PathBuf,
    },
    /// Move/rename a file.
    Move {
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
    },
}

/// A structured patch: an ordered list of file changes applied atomically.
pub type Patch = Vec<FileChange>;

/// The outcome of running a command inside a sandbox. Raw stdout/stderr are
/// never returned inline — only their content-addressed artifact hashes
/// (spec §4.3: "streamed to content-addressed artifacts, not returned
/// inline"; P4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Process exit code.
    pub exit_code: i32,
    /// Artifact hash of captured stdout.
    pub stdout_ref: String,
    /// Artifact hash of captured stderr.
    pub stderr_ref: String,
}

/// A single trusted byte sequence operation id pairs an idempotency key with
/// the provider call it protects. Reusing the same `operation_id` against
/// the same `sandbox_id` must return the original result without repeating
/// the underlying side effect.
pub type OperationId = Uuid;

/// The sandbox lifecycle contract (spec §4.3).
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Allocates a new sandbox governed by `policy`.
    ///
    /// # Errors
    /// Returns [`DirectorError::SandboxUnavailable`] if allocation fails.
    async fn create(&self, operation_id: OperationId, policy: SandboxPolicy) -> Result<Uuid, DirectorError>;

    /// Runs `command` inside `sandbox_id`. `exec_permitted` in the
    /// sandbox's policy must be `true` or this returns
    /// [`DirectorError::CapabilityDenied`].
    ///
    /// # Errors
    /// Returns [`DirectorError::SandboxUnavailable`] on backend failure,
    /// [`DirectorError::CapabilityDenied`] if exec is not permitted.
    async fn exec(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        command: &str,
    ) -> Result<ExecOutcome, DirectorError>;

    /// Applies a structured patch and returns its content hash.
    ///
    /// # Errors
    /// Returns [`DirectorError::CapabilityDenied`] if a path falls outside
    /// the sandbox's allowed write scope, [`DirectorError::SandboxUnavailable`]
    /// on backend failure.
    async fn write_files(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        patch: &Patch,
    ) -> Result<String, DirectorError>;

    /// Captures a restorable checkpoint, returning its reference.
    ///
    /// # Errors
    /// Returns [`DirectorError::SandboxUnavailable`] on backend failure.
    async fn checkpoint(&self, sandbox_id: Uuid, operation_id: OperationId) -> Result<String, DirectorError>;

    /// Rolls the sandbox back to a previously captured checkpoint (L2: a
    /// checkpoint-then-restore with no intervening mutation is a no-op).
    ///
    /// # Errors
    /// Returns [`DirectorError::SandboxUnavailable`] if the checkpoint is
    /// unknown or the backend fails.
    async fn restore(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        checkpoint_ref: &str,
    ) -> Result<(), DirectorError>;

    /// Releases all resources held by `sandbox_id`. Irreversible.
    ///
    /// # Errors
    /// Returns [`DirectorError::SandboxUnavailable`] on backend failure.
    async fn destroy(&self, sandbox_id: Uuid, operation_id: OperationId) -> Result<(), DirectorError>;

    /// Requests a tunnel URL for UI rehydration. Optional: backends that
    /// don't support it return `Ok(None)`.
    async fn proxy(&self, _sandbox_id: Uuid, _port: u16) -> Result<Option<String>, DirectorError> {
        Ok(None)
    }
}
