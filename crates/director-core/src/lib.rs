#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Canonical contract types for the Director control plane: events, entities,
//! and the content-addressing/hashing primitives everything else is built on.
//!
//! This crate has no knowledge of storage, sandboxes, or policy — it only
//! defines the shapes every other `director-*` crate agrees on.

mod entities;
mod error;
mod event;
mod hash;

pub use entities::{
    AhdbState, Atom, AtomKind, AtomState, Attestation, AttestationResult, CapabilityLease,
    Mood, Receipt, ReceiptKind, RiskTier, Run, RunBudgets, RunStatus, Sandbox, SandboxKind,
    SandboxState, VerifierPlan, VerifierResult, WorkItem, WorkItemStatus,
};
pub use error::{DirectorError, ErrorCode};
pub use event::{normalize_event_type, Event, EventPayload, EventSource};
pub use hash::{canonical_json, content_uuid, sha256_hex};

/// The namespace constant every subject is rooted at: `{namespace}.{user_id}.{source}.{event_type}`.
pub const NAMESPACE: &str = "director";

/// The contract version stamped onto persisted records for forward-compat checks.
pub const CONTRACT_VERSION: &str = "director/v1";

/// Computes the canonical subject for an event, per I2:
/// `{namespace}.{user_id}.{source}.{event_type}`.
#[must_use]
pub fn subject_of(event: &Event) -> String {
    format!(
        "{NAMESPACE}.{}.{}.{}",
        event.user_id,
        event.source.as_str(),
        event.event_type
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn subject_format_matches_i2() {
        let event = Event {
            id: Uuid::nil(),
            timestamp_ms: 0,
            user_id: "u1".into(),
            source: EventSource::Agent,
            event_type: "file.write".into(),
            payload: EventPayload::FileWrite {
                path: "a.rs".into(),
                diff_hash: "abc".into(),
            },
            ext: None,
        };
        assert_eq!(subject_of(&event), "director.u1.agent.file.write");
    }
}
