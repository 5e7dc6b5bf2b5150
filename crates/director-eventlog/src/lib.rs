#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The append-only event log (spec §4.1): the single source of truth every
//! other component projects from.

mod file;
mod memory;
mod retry;

pub use file::FileEventLog;
pub use memory::MemoryEventLog;
pub use retry::{retry_with_backoff, RetryPolicy};

use async_trait::async_trait;
use director_core::{normalize_event_type, subject_of, DirectorError, Event};
use uuid::Uuid;

/// An ordered, inclusive range of sequence numbers.
#[derive(Debug, Clone, Copy)]
pub struct SeqRange {
    /// First sequence number, inclusive.
    pub from: u64,
    /// Last sequence number, inclusive.
    pub to: u64,
}

/// Persist typed events atomically, assign monotonic sequence numbers, and
/// expose ordered subscription and ranged retrieval (spec §4.1).
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an event, returning its assigned sequence number.
    ///
    /// Durable before returning. Idempotent by `event.id` (L1): a duplicate
    /// append returns the sequence number from the first append and does not
    /// create a second record.
    ///
    /// # Errors
    /// Returns [`DirectorError::ContractViolation`] if `event`'s subject or
    /// event type does not match the canonical format (I1/I2); this is
    /// fatal at the caller and must not be retried. Storage failures are
    /// retried internally per [`RetryPolicy`] and only surface after
    /// exhausting it.
    async fn append(&self, event: Event) -> Result<u64, DirectorError>;

    /// Returns events in `[range.from, range.to]`, ordered by sequence, inclusive.
    async fn range(&self, range: SeqRange) -> Result<Vec<(u64, Event)>, DirectorError>;

    /// Returns every event appended so far, in append order, restartable
    /// conceptually from `from_seq` (callers needing a live subscription
    /// should poll `range` from their last-seen sequence; this crate does
    /// not itself open a long-lived stream since it has no I/O reactor
    /// opinions beyond what `director-runtime` already owns).
    async fn tail_from(&self, from_seq: u64) -> Result<Vec<(u64, Event)>, DirectorError>;

    /// The current highest assigned sequence number, or `0` if empty.
    async fn last_seq(&self) -> u64;

    /// Looks up the sequence number already assigned to `event_id`, if any.
    async fn seq_for_id(&self, event_id: Uuid) -> Option<u64>;
}

/// Validates an event's structural invariants before it reaches storage
/// (I1, I2). Pure and storage-independent so every backend shares one
/// validation path.
///
/// # Errors
/// Returns [`DirectorError::ContractViolation`] if the event type is not
/// already in canonical form, or if the computed subject does not match
/// the exact `{namespace}.{user_id}.{source}.{event_type}` shape.
pub fn validate_structure(event: &Event) -> Result<(), DirectorError> {
    let canonical = normalize_event_type(&event.event_type);
    if canonical != event.event_type {
        return Err(DirectorError::ContractViolation(format!(
            "event_type {:?} is not canonical (expected {:?})",
            event.event_type, canonical
        )));
    }
    if event.event_type != event.payload.canonical_type() {
        return Err(DirectorError::ContractViolation(format!(
            "event_type {:?} does not match payload kind {:?}",
            event.event_type,
            event.payload.canonical_type()
        )));
    }
    let subject = subject_of(event);
    let parts: Vec<&str> = subject.splitn(4, '.').collect();
    if parts.len() != 4 || parts[0] != director_core::NAMESPACE {
        return Err(DirectorError::ContractViolation(format!(
            "subject {subject:?} does not match {{namespace}}.{{user_id}}.{{source}}.{{event_type}}"
        )));
    }
    Ok(())
}
