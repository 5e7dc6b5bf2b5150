#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Mood capability profiles, the verifier allowlist, and the commit gate.
//!
//! A [`Mood`](director_core::Mood) is "a capability/policy profile": it
//! bounds which tools a run may use, which paths it may touch, and how
//! strictly the commit gate treats an `inconclusive` verifier result. This
//! crate owns all three concerns; `director-runtime` consults it but never
//! re-implements the rules.

mod allowlist;
mod gate;
mod profile;

pub use allowlist::{VerifierAllowlist, VerifierAllowlistEntry};
pub use gate::{evaluate_commit, VerifierOutcome};
pub use profile::{default_profiles, MoodProfile, VerifierStrictness};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The outcome of a policy check: either permitted, or refused with a reason
/// a caller can surface to the run's diagnostic notes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Decision {
    /// Whether the checked operation is permitted.
    pub allowed: bool,
    /// A human-readable reason, present only when `allowed` is `false`.
    pub reason: Option<String>,
}

impl Decision {
    /// An unconditional allow.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// A refusal carrying a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    /// `true` when this decision refuses the operation.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }
}
