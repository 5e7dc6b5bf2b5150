use crate::{ExecOutcome, OperationId, Patch, Sandbox, SandboxPolicy};
use async_trait::async_trait;
use director_core::DirectorError;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::warn;
use uuid::Uuid;

/// Backoff and deadline parameters for [`RemoteSandbox`] (spec §4.3:
/// "Network errors against a remote backend are retried with exponential
/// backoff and a deadline; on deadline expiry the operation surfaces a
/// `sandbox_unavailable` error").
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum attempts before giving up, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub multiplier: u32,
    /// The wall-clock deadline for a single attempt.
    pub per_attempt_deadline: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(50),
            multiplier: 2,
            per_attempt_deadline: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt)
    }
}

/// Wraps any [`Sandbox`] with the remote-backend retry/deadline policy.
/// The wrapped sandbox is typically a transport-backed adapter; this type
/// owns only the retry discipline, not the transport.
pub struct RemoteSandbox {
    inner: Arc<dyn Sandbox>,
    retry: RetryConfig,
}

impl RemoteSandbox {
    /// Wraps `inner` with `retry`'s backoff/deadline policy.
    #[must_use]
    pub fn new(inner: Arc<dyn Sandbox>, retry: RetryConfig) -> Self {
        Self { inner, retry }
    }

    async fn with_retry<T, F, Fut>(&self, sandbox_id_hint: &str, mut call: F) -> Result<T, DirectorError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, DirectorError>>,
    {
        let mut attempt = 0;
        loop {
            match timeout(self.retry.per_attempt_deadline, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if attempt + 1 < self.retry.max_attempts && e.is_retryable() => {
                    warn!(sandbox_id = sandbox_id_hint, attempt, "remote sandbox call failed, retrying");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) if attempt + 1 < self.retry.max_attempts => {
                    warn!(sandbox_id = sandbox_id_hint, attempt, "remote sandbox call timed out, retrying");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(_) => {
                    return Err(DirectorError::SandboxUnavailable {
                        sandbox_id: sandbox_id_hint.to_string(),
                        reason: "deadline exceeded after retries exhausted".to_string(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl Sandbox for RemoteSandbox {
    async fn create(&self, operation_id: OperationId, policy: SandboxPolicy) -> Result<Uuid, DirectorError> {
        self.with_retry("new", || self.inner.create(operation_id, policy.clone())).await
    }

    async fn exec(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        command: &str,
    ) -> Result<ExecOutcome, DirectorError> {
        self.with_retry(&sandbox_id.to_string(), || self.inner.exec(sandbox_id, operation_id, command))
            .await
    }

    async fn write_files(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        patch: &Patch,
    ) -> Result<String, DirectorError> {
        self.with_retry(&sandbox_id.to_string(), || self.inner.write_files(sandbox_id, operation_id, patch))
            .await
    }

    async fn checkpoint(&self, sandbox_id: Uuid, operation_id: OperationId) -> Result<String, DirectorError> {
        self.with_retry(&sandbox_id.to_string(), || self.inner.checkpoint(sandbox_id, operation_id))
            .await
    }

    async fn restore(
        &self,
        sandbox_id: Uuid,
        operation_id: OperationId,
        checkpoint_ref: &str,
    ) -> Result<(), DirectorError> {
        self.with_retry(&sandbox_id.to_string(), || self.inner.restore(sandbox_id, operation_id, checkpoint_ref))
            .await
    }

    async fn destroy(&self, sandbox_id: Uuid, operation_id: OperationId) -> Result<(), DirectorError> {
        self.with_retry(&sandbox_id.to_string(), || self.inner.destroy(sandbox_id, operation_id))
            .await
    }

    async fn proxy(&self, sandbox_id: Uuid, port: u16) -> Result<Option<String>, DirectorError> {
        self.with_retry(&sandbox_id.to_string(), || self.inner.proxy(sandbox_id, port)).await
    }
}
