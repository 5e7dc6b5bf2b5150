//! The error taxonomy from spec §7, expressed as a typed [`DirectorError`]
//! enum with a stable `DIR-X###` code per variant.

use std::fmt;

/// A stable, documentation-friendly error code: one category letter plus a
/// three-digit number within that category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    /// Category letter: `C` contract, `P` projection, `S` sandbox, `V` verifier,
    /// `R` runtime/budget, `L` policy/lease, `Y` system.
    pub category: char,
    /// Number within the category.
    pub number: u16,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DIR-{}{:03}", self.category, self.number)
    }
}

/// The error kinds from spec §7's taxonomy, plus the ambient `Serialization`
/// and `Io` kinds every component eventually needs.
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    /// `contract_violation` — event failed structural validation; fatal at the producer.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// `projection_inconsistency` — rebuild disagrees with live projection.
    #[error("projection inconsistency at seq {at_seq}: {reason}")]
    ProjectionInconsistency {
        /// Sequence number where the disagreement was detected.
        at_seq: u64,
        /// Human-readable explanation.
        reason: String,
    },

    /// `sandbox_unavailable` — remote backend deadline exceeded.
    #[error("sandbox {sandbox_id} unavailable: {reason}")]
    SandboxUnavailable {
        /// The sandbox that could not be reached. A `String` rather than a
        /// `Uuid` since this also covers allocation failures before a
        /// sandbox id exists.
        sandbox_id: String,
        /// Why.
        reason: String,
    },

    /// `verifier_failure` — verifier exited non-zero.
    #[error("verifier {verifier_id} failed")]
    VerifierFailure {
        /// The verifier that failed.
        verifier_id: String,
    },

    /// `verifier_crash` — verifier process exited abnormally.
    #[error("verifier {verifier_id} crashed: {signature}")]
    VerifierCrash {
        /// The verifier that crashed.
        verifier_id: String,
        /// A normalized crash signature.
        signature: String,
    },

    /// `budget_exhausted` — a run exceeded one of its budgets.
    #[error("budget exhausted: {dimension}")]
    BudgetExhausted {
        /// Which budget dimension was exceeded (`tokens`, `time_ms`, `iterations`, `diff_bytes`).
        dimension: String,
    },

    /// `policy_refused` — the commit gate refused.
    #[error("commit refused by policy: {reason}")]
    PolicyRefused {
        /// Why the policy refused.
        reason: String,
    },

    /// `capability_denied` — operation attempted without a valid lease.
    #[error("capability denied: {syscall_class} outside lease scope")]
    CapabilityDenied {
        /// The syscall class that was denied.
        syscall_class: String,
    },

    /// `cancelled` — cooperative cancellation observed at a safe point.
    #[error("run cancelled: {reason}")]
    Cancelled {
        /// Why the run was cancelled.
        reason: String,
    },

    /// Ambient: a value could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Ambient: an underlying I/O operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DirectorError {
    /// The stable error code for this variant (§7 taxonomy -> DIR-X### mapping).
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ContractViolation(_) => ErrorCode { category: 'C', number: 1 },
            Self::ProjectionInconsistency { .. } => ErrorCode { category: 'P', number: 1 },
            Self::SandboxUnavailable { .. } => ErrorCode { category: 'S', number: 1 },
            Self::VerifierFailure { .. } => ErrorCode { category: 'V', number: 1 },
            Self::VerifierCrash { .. } => ErrorCode { category: 'V', number: 2 },
            Self::BudgetExhausted { .. } => ErrorCode { category: 'R', number: 1 },
            Self::PolicyRefused { .. } => ErrorCode { category: 'L', number: 1 },
            Self::CapabilityDenied { .. } => ErrorCode { category: 'L', number: 2 },
            Self::Cancelled { .. } => ErrorCode { category: 'R', number: 2 },
            Self::Serialization(_) => ErrorCode { category: 'Y', number: 1 },
            Self::Io(_) => ErrorCode { category: 'Y', number: 2 },
        }
    }

    /// Whether this error kind is retryable per the §7 propagation policy.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SandboxUnavailable { .. } | Self::Io(_))
    }

    /// Whether this error kind is fatal to the producer (must not retry at all).
    #[must_use]
    pub fn is_fatal_to_producer(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }
}
