//! Run budget tracking (spec §4.6 "Timeouts"): "each run carries `time_ms`,
//! `tokens`, `iterations`, and `diff_bytes` budgets; crossing any budget
//! transitions to `discarded`".
//!
//! Atomic-counter design covering the run's four budget dimensions.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering::Relaxed};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use director_core::RunBudgets;

/// Usage at or above this fraction of a cap is reported as [`BudgetStatus::Warning`]
/// even though the hard limit has not yet been crossed.
pub const WARNING_THRESHOLD: f64 = 0.8;

/// Tracks consumption against a run's [`RunBudgets`] cap, independent of the
/// run's position in the state machine.
pub struct BudgetTracker {
    limit: RunBudgets,
    tokens_used: AtomicU64,
    iterations_used: AtomicU32,
    diff_bytes_used: AtomicU64,
    start: Mutex<Option<Instant>>,
}

impl BudgetTracker {
    /// Creates a tracker against `limit`, with consumption at zero.
    #[must_use]
    pub fn new(limit: RunBudgets) -> Self {
        Self {
            limit,
            tokens_used: AtomicU64::new(0),
            iterations_used: AtomicU32::new(0),
            diff_bytes_used: AtomicU64::new(0),
            start: Mutex::new(None),
        }
    }

    /// Starts the wall-clock timer for the `time_ms` dimension. Idempotent:
    /// later calls do not reset an already-running timer.
    pub fn start_timer(&self) {
        let mut start = self.start.lock().expect("start mutex poisoned");
        if start.is_none() {
            *start = Some(Instant::now());
        }
    }

    /// Records `count` tokens consumed.
    pub fn record_tokens(&self, count: u64) {
        self.tokens_used.fetch_add(count, Relaxed);
    }

    /// Records one iteration (one orchestrator turn) consumed.
    pub fn record_iteration(&self) {
        self.iterations_used.fetch_add(1, Relaxed);
    }

    /// Records `bytes` of diff produced by a patch.
    pub fn record_diff_bytes(&self, bytes: u64) {
        self.diff_bytes_used.fetch_add(bytes, Relaxed);
    }

    fn elapsed_ms(&self) -> u64 {
        self.start
            .lock()
            .expect("start mutex poisoned")
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    /// Checks every dimension against its cap, in the order `tokens,
    /// time_ms, iterations, diff_bytes`, returning the first hard violation
    /// found, or a warning if the highest usage fraction has crossed
    /// [`WARNING_THRESHOLD`] without exceeding any cap.
    #[must_use]
    pub fn check(&self) -> BudgetStatus {
        let tokens = self.tokens_used.load(Relaxed);
        let time_ms = self.elapsed_ms();
        let iterations = self.iterations_used.load(Relaxed);
        let diff_bytes = self.diff_bytes_used.load(Relaxed);

        if tokens > self.limit.tokens {
            return BudgetStatus::Exceeded(BudgetViolation::TokensExceeded { used: tokens, limit: self.limit.tokens });
        }
        if time_ms > self.limit.time_ms {
            return BudgetStatus::Exceeded(BudgetViolation::TimeExceeded { used_ms: time_ms, limit_ms: self.limit.time_ms });
        }
        if iterations > self.limit.iterations {
            return BudgetStatus::Exceeded(BudgetViolation::IterationsExceeded { used: iterations, limit: self.limit.iterations });
        }
        if diff_bytes > self.limit.diff_bytes {
            return BudgetStatus::Exceeded(BudgetViolation::DiffBytesExceeded { used: diff_bytes, limit: self.limit.diff_bytes });
        }

        let mut max_pct: f64 = 0.0;
        if self.limit.tokens > 0 {
            max_pct = max_pct.max(tokens as f64 / self.limit.tokens as f64);
        }
        if self.limit.time_ms > 0 {
            max_pct = max_pct.max(time_ms as f64 / self.limit.time_ms as f64);
        }
        if self.limit.iterations > 0 {
            max_pct = max_pct.max(iterations as f64 / self.limit.iterations as f64);
        }
        if self.limit.diff_bytes > 0 {
            max_pct = max_pct.max(diff_bytes as f64 / self.limit.diff_bytes as f64);
        }

        if max_pct >= WARNING_THRESHOLD {
            BudgetStatus::Warning { usage_pct: max_pct * 100.0 }
        } else {
            BudgetStatus::WithinLimits
        }
    }
}

/// Result of a budget check.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetStatus {
    /// All dimensions are below the warning threshold.
    WithinLimits,
    /// At least one dimension has crossed its hard cap.
    Exceeded(BudgetViolation),
    /// No cap was crossed, but the highest usage fraction is at or above
    /// [`WARNING_THRESHOLD`].
    Warning {
        /// Highest usage percentage across all dimensions.
        usage_pct: f64,
    },
}

impl BudgetStatus {
    /// The budget dimension name this status's violation applies to, used to
    /// populate `receipt.timeout`'s `budget` field. `None` when not exceeded.
    #[must_use]
    pub fn dimension(&self) -> Option<&'static str> {
        match self {
            Self::Exceeded(v) => Some(v.dimension()),
            _ => None,
        }
    }
}

/// Which dimension was exceeded, and by how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetViolation {
    /// Token cap exceeded.
    TokensExceeded {
        /// Tokens consumed.
        used: u64,
        /// Configured cap.
        limit: u64,
    },
    /// Wall-clock time cap exceeded.
    TimeExceeded {
        /// Milliseconds elapsed.
        used_ms: u64,
        /// Configured cap in milliseconds.
        limit_ms: u64,
    },
    /// Iteration cap exceeded.
    IterationsExceeded {
        /// Iterations consumed.
        used: u32,
        /// Configured cap.
        limit: u32,
    },
    /// Cumulative diff-byte cap exceeded.
    DiffBytesExceeded {
        /// Bytes produced.
        used: u64,
        /// Configured cap.
        limit: u64,
    },
}

impl BudgetViolation {
    /// The dimension name as carried on `receipt.timeout`.
    #[must_use]
    pub fn dimension(&self) -> &'static str {
        match self {
            Self::TokensExceeded { .. } => "tokens",
            Self::TimeExceeded { .. } => "time_ms",
            Self::IterationsExceeded { .. } => "iterations",
            Self::DiffBytesExceeded { .. } => "diff_bytes",
        }
    }
}

impl fmt::Display for BudgetViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokensExceeded { used, limit } => write!(f, "token budget exceeded: used {used}, limit {limit}"),
            Self::TimeExceeded { used_ms, limit_ms } => write!(f, "time budget exceeded: used {used_ms}ms, limit {limit_ms}ms"),
            Self::IterationsExceeded { used, limit } => write!(f, "iteration budget exceeded: used {used}, limit {limit}"),
            Self::DiffBytesExceeded { used, limit } => write!(f, "diff-byte budget exceeded: used {used}, limit {limit}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(tokens: u64, time_ms: u64, iterations: u32, diff_bytes: u64) -> RunBudgets {
        RunBudgets { tokens, time_ms, iterations, diff_bytes }
    }

    #[test]
    fn within_limits_when_under_cap() {
        let t = BudgetTracker::new(caps(1000, 1000, 10, 1000));
        t.record_tokens(10);
        assert_eq!(t.check(), BudgetStatus::WithinLimits);
    }

    #[test]
    fn tokens_exceeded_reports_dimension() {
        let t = BudgetTracker::new(caps(100, 1000, 10, 1000));
        t.record_tokens(101);
        let status = t.check();
        assert_eq!(status.dimension(), Some("tokens"));
        assert!(matches!(status, BudgetStatus::Exceeded(BudgetViolation::TokensExceeded { used: 101, limit: 100 })));
    }

    #[test]
    fn iterations_exceeded() {
        let t = BudgetTracker::new(caps(1000, 1000, 2, 1000));
        t.record_iteration();
        t.record_iteration();
        t.record_iteration();
        assert!(matches!(t.check(), BudgetStatus::Exceeded(BudgetViolation::IterationsExceeded { used: 3, limit: 2 })));
    }

    #[test]
    fn diff_bytes_exceeded() {
        let t = BudgetTracker::new(caps(1000, 1000, 10, 500));
        t.record_diff_bytes(600);
        assert!(matches!(t.check(), BudgetStatus::Exceeded(BudgetViolation::DiffBytesExceeded { used: 600, limit: 500 })));
    }

    #[test]
    fn warning_at_eighty_percent_tokens() {
        let t = BudgetTracker::new(caps(100, 1000, 10, 1000));
        t.record_tokens(81);
        assert!(matches!(t.check(), BudgetStatus::Warning { .. }));
    }

    #[test]
    fn time_exceeded_requires_timer_started() {
        let t = BudgetTracker::new(caps(1000, 1, 10, 1000));
        t.start_timer();
        std::thread::sleep(Duration::from_millis(10));
        assert!(matches!(t.check(), BudgetStatus::Exceeded(BudgetViolation::TimeExceeded { .. })));
    }
}
