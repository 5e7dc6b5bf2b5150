//! Cooperative cancellation (spec §5): "a run consults a cancellation flag
//! between safe points. In-flight verifier processes are terminated ...
//! after a 5s grace."
//!
//! `CancellationToken`/`CancellationReason`/`CancellableRun` use the same
//! `Arc<AtomicBool>` + `Notify` shape, idempotent cancel, and
//! first-reason-wins semantics as a conventional cooperative-cancellation
//! primitive; [`VERIFIER_KILL_GRACE`] and [`run_with_grace`] add the
//! run-level grace period this system's verifier-kill timing needs.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use director_core::DirectorError;
use tokio::sync::Notify;

/// The bounded grace period before an in-flight verifier is treated as
/// unresponsive to cancellation (spec §5).
pub const VERIFIER_KILL_GRACE: Duration = Duration::from_secs(5);

struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cheaply cloneable handle that can be signalled once and observed from
/// many places. Cancelling is idempotent; every clone observes the same flag.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Creates a token in the un-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signals cancellation. Idempotent: a second call is a no-op.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation is signalled; resolves immediately if it
    /// already has been.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Why a run was cancelled; the first reason recorded wins (spec §4.6's
/// `discarded` transitions all route through this).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// A client requested cancellation directly.
    UserRequested,
    /// A run-level budget was exhausted.
    BudgetExhausted,
    /// The commit gate refused.
    PolicyRefused,
    /// An external deadline expired.
    Timeout,
    /// The process is shutting down.
    SystemShutdown,
}

impl CancellationReason {
    /// A short human-readable description, suitable for a discard note.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::UserRequested => "cancelled by user request",
            Self::BudgetExhausted => "run budget exhausted",
            Self::PolicyRefused => "commit refused by policy",
            Self::Timeout => "external deadline expired",
            Self::SystemShutdown => "system shutting down",
        }
    }
}

/// Pairs a [`CancellationToken`] with the first reason it was cancelled for.
#[derive(Clone)]
pub struct CancellableRun {
    token: CancellationToken,
    reason: Arc<Mutex<Option<CancellationReason>>>,
}

impl Default for CancellableRun {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellableRun {
    /// Creates a fresh, un-cancelled handle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Cancels with `reason`. The first call's reason is retained; later
    /// calls only re-signal the token.
    pub fn cancel(&self, reason: CancellationReason) {
        let mut slot = self.reason.lock().expect("reason mutex poisoned");
        if slot.is_none() {
            *slot = Some(reason);
        }
        drop(slot);
        self.token.cancel();
    }

    /// Whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The recorded reason, if cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<CancellationReason> {
        *self.reason.lock().expect("reason mutex poisoned")
    }

    /// The underlying token, for passing into a future that should observe
    /// cancellation without taking ownership of the reason.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Races `fut` against cancellation, allowing `grace` for `fut` to finish on
/// its own once cancellation fires before giving up.
///
/// # Errors
/// Returns [`DirectorError::Cancelled`] if `fut` has not resolved by the end
/// of the grace period. Otherwise forwards `fut`'s own result.
pub async fn run_with_grace<F, T>(token: &CancellationToken, grace: Duration, fut: F) -> Result<T, DirectorError>
where
    F: Future<Output = Result<T, DirectorError>>,
{
    tokio::pin!(fut);
    tokio::select! {
        biased;
        res = &mut fut => res,
        () = token.cancelled() => {
            match tokio::time::timeout(grace, &mut fut).await {
                Ok(res) => res,
                Err(_) => Err(DirectorError::Cancelled { reason: "grace period exceeded".into() }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn clone_observes_same_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_if_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await.unwrap();
    }

    #[test]
    fn first_reason_wins() {
        let run = CancellableRun::new();
        run.cancel(CancellationReason::BudgetExhausted);
        run.cancel(CancellationReason::UserRequested);
        assert_eq!(run.reason(), Some(CancellationReason::BudgetExhausted));
    }

    #[tokio::test]
    async fn run_with_grace_forwards_result_when_uncancelled() {
        let token = CancellationToken::new();
        let result = run_with_grace(&token, Duration::from_millis(50), async { Ok::<_, DirectorError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn run_with_grace_times_out_when_cancelled_and_unresponsive() {
        let token = CancellationToken::new();
        token.cancel();
        let result = run_with_grace(&token, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, DirectorError>(())
        })
        .await;
        assert!(matches!(result, Err(DirectorError::Cancelled { .. })));
    }
}
