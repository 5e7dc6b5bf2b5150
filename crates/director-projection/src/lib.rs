#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The projection store (spec §4.2): deterministic materialized views
//! (AHDB state, work items, runs, receipts index) derived from the event log.
//!
//! Projection application is a pure function of `(tables, event)` — see
//! [`apply_event`] — so the same logic backs both the incremental projector
//! and [`rebuild`], which is what makes I8/P5/L4 checkable at all.

mod tables;

pub use tables::ProjectionTables;

use director_core::{DirectorError, Event, EventPayload, WorkItem};
use director_eventlog::{EventLog, SeqRange};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// A cursor over the event log: the sequence number of the last event folded
/// into a set of [`ProjectionTables`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(pub u64);

/// A read-only snapshot of the projection at a fixed cursor, safe to hand to
/// concurrent readers without holding the projector's write lock (spec §5:
/// "readers consume consistent snapshots keyed by the cursor").
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The cursor this snapshot was taken at.
    pub cursor: Cursor,
    /// The materialized tables at that cursor.
    pub tables: ProjectionTables,
}

/// Applies a single event to `tables` in place. Pure: given the same
/// `(tables, event)` pair it always produces the same resulting tables and
/// never touches the event log or the wall clock (I8).
///
/// # Errors
/// Returns [`DirectorError::ProjectionInconsistency`] if the event cannot be
/// folded without violating a projection invariant (e.g. an `ASSERT`
/// referencing a non-promoted atom, I4). Such an event does not halt the
/// caller by itself — see [`Projector::apply_next`] for poison-event handling.
pub fn apply_event(tables: &mut ProjectionTables, seq: u64, event: &Event) -> Result<(), DirectorError> {
    tables.apply(seq, event)
}

/// Deterministically rebuilds a fresh [`ProjectionTables`] by replaying the
/// entire log from genesis (spec §4.2 "Deterministic rebuild", I8, P5, L4).
///
/// Events that fail to fold are recorded in the returned poison map rather
/// than aborting the rebuild, mirroring the live projector's failure
/// semantics so genesis rebuild and incremental rebuild agree (P5).
///
/// # Errors
/// Returns an error only if the log itself cannot be read; per-event
/// folding failures are poison entries, not `Err` results.
pub async fn rebuild(
    log: &dyn EventLog,
) -> Result<(ProjectionTables, BTreeMap<u64, String>), DirectorError> {
    let last = log.last_seq().await;
    let events = log.range(SeqRange { from: 1, to: last }).await?;
    let mut tables = ProjectionTables::default();
    let mut poisoned = BTreeMap::new();
    for (seq, event) in events {
        if let Err(e) = apply_event(&mut tables, seq, &event) {
            poisoned.insert(seq, e.to_string());
        }
    }
    Ok((tables, poisoned))
}

/// The live, incrementally-maintained projector.
///
/// Single-writer by construction: `apply_next` takes an exclusive lock over
/// both the cursor and the tables and advances them together, so a reader
/// never observes a cursor that does not match its tables (spec §5
/// "Projection updates are transactional with cursor advancement").
pub struct Projector {
    log: Arc<dyn EventLog>,
    state: RwLock<State>,
}

struct State {
    cursor: Cursor,
    tables: ProjectionTables,
    poisoned: BTreeMap<u64, String>,
}

impl Projector {
    /// Creates a projector over `log`, starting from an empty projection.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self {
            log,
            state: RwLock::new(State {
                cursor: Cursor::default(),
                tables: ProjectionTables::default(),
                poisoned: BTreeMap::new(),
            }),
        }
    }

    /// Pulls and applies every event after the current cursor, returning the
    /// number of events applied. A per-event folding failure is recorded as
    /// a poison-event marker (spec §4.2) rather than propagated; it does not
    /// prevent later events from being applied.
    pub async fn apply_next(&self) -> Result<u64, DirectorError> {
        let last = self.log.last_seq().await;
        let mut state = self.state.write().await;
        if last <= state.cursor.0 {
            return Ok(0);
        }
        let events = self
            .log
            .range(SeqRange {
                from: state.cursor.0 + 1,
                to: last,
            })
            .await?;
        let mut applied = 0u64;
        for (seq, event) in events {
            match apply_event(&mut state.tables, seq, &event) {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(seq, error = %e, "poison event during incremental projection");
                    state.poisoned.insert(seq, e.to_string());
                }
            }
            state.cursor = Cursor(seq);
        }
        Ok(applied)
    }

    /// Returns a consistent snapshot of the projection at its current cursor.
    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot {
            cursor: state.cursor,
            tables: state.tables.clone(),
        }
    }

    /// Returns the poison-event markers recorded so far, keyed by sequence number.
    pub async fn poisoned(&self) -> BTreeMap<u64, String> {
        self.state.read().await.poisoned.clone()
    }

    /// Registers a work item directly, bypassing the event log. Test-only
    /// convenience for seeding fixtures; the Supervisor API's `POST
    /// /work_item` (§6.2) appends `work_item.create` instead, so that work
    /// items rebuild from genesis like every other table (I8). Overwrites an
    /// existing entry with the same id.
    pub async fn seed_work_item(&self, work_item: WorkItem) {
        self.state.write().await.tables.work_items.insert(work_item.work_item_id, work_item);
    }

    /// Verifies I8/P5: rebuilding from genesis agrees with the live
    /// projection at the current cursor, modulo the documented
    /// non-determinism set (auxiliary wall-clock fields, which this
    /// projection does not carry, so equality here is exact).
    ///
    /// # Errors
    /// Returns [`DirectorError::ProjectionInconsistency`] if they disagree.
    pub async fn verify_rebuild_determinism(&self) -> Result<(), DirectorError> {
        let state = self.state.read().await;
        let (rebuilt, _poisoned) = rebuild(self.log.as_ref()).await?;
        if rebuilt != state.tables {
            return Err(DirectorError::ProjectionInconsistency {
                at_seq: state.cursor.0,
                reason: "genesis rebuild disagrees with live projection".into(),
            });
        }
        Ok(())
    }
}

/// Returns the canonical event type this payload belongs to; re-exported for
/// callers that only need the discriminant without a full match.
#[must_use]
pub fn event_kind(payload: &EventPayload) -> &'static str {
    payload.canonical_type()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use director_core::{Event, EventSource};
    use director_eventlog::MemoryEventLog;
    use std::sync::Arc;
    use uuid::Uuid;

    fn write_event(path: &str) -> Event {
        Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "u1",
            EventSource::Agent,
            EventPayload::FileWrite {
                path: path.into(),
                diff_hash: "h".into(),
            },
        )
    }

    #[tokio::test]
    async fn incremental_and_genesis_rebuild_agree() {
        let log = Arc::new(MemoryEventLog::new());
        for i in 0..20 {
            log.append(write_event(&format!("f{i}.rs"))).await.unwrap();
        }
        let projector = Projector::new(log.clone());
        projector.apply_next().await.unwrap();

        projector.verify_rebuild_determinism().await.unwrap();
    }

    #[tokio::test]
    async fn apply_next_is_incremental() {
        let log = Arc::new(MemoryEventLog::new());
        log.append(write_event("a.rs")).await.unwrap();
        let projector = Projector::new(log.clone());
        assert_eq!(projector.apply_next().await.unwrap(), 1);
        assert_eq!(projector.apply_next().await.unwrap(), 0);

        log.append(write_event("b.rs")).await.unwrap();
        assert_eq!(projector.apply_next().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn work_item_create_event_survives_genesis_rebuild() {
        use director_core::{RiskTier, WorkItemStatus};

        let log = Arc::new(MemoryEventLog::new());
        let work_item_id = Uuid::new_v4();
        let event = Event::new(
            Uuid::new_v4(),
            Utc::now(),
            "system",
            EventSource::System,
            EventPayload::WorkItemCreate {
                work_item: WorkItem {
                    work_item_id,
                    description: "seed".into(),
                    acceptance_criteria: "accepted".into(),
                    required_verifiers: vec![],
                    risk_tier: RiskTier::Low,
                    dependencies: vec![],
                    status: WorkItemStatus::Open,
                },
            },
        );
        log.append(event).await.unwrap();

        let projector = Projector::new(log.clone());
        projector.apply_next().await.unwrap();
        assert!(projector.snapshot().await.tables.work_items.contains_key(&work_item_id));

        projector.verify_rebuild_determinism().await.unwrap();
    }
}
