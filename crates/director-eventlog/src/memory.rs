//! An in-memory [`EventLog`] backend for tests and embedding.

use crate::{validate_structure, EventLog, SeqRange};
use async_trait::async_trait;
use director_core::{DirectorError, Event};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory, single-process event log. Not durable across restarts.
#[derive(Default)]
pub struct MemoryEventLog {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    events: Vec<(u64, Event)>,
    index: HashMap<Uuid, u64>,
}

impl MemoryEventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, event: Event) -> Result<u64, DirectorError> {
        validate_structure(&event)?;
        let mut inner = self.inner.write().expect("event log lock poisoned");
        if let Some(&seq) = inner.index.get(&event.id) {
            return Ok(seq);
        }
        let seq = inner.events.len() as u64 + 1;
        inner.index.insert(event.id, seq);
        inner.events.push((seq, event));
        Ok(seq)
    }

    async fn range(&self, range: SeqRange) -> Result<Vec<(u64, Event)>, DirectorError> {
        let inner = self.inner.read().expect("event log lock poisoned");
        Ok(inner
            .events
            .iter()
            .filter(|(seq, _)| *seq >= range.from && *seq <= range.to)
            .cloned()
            .collect())
    }

    async fn tail_from(&self, from_seq: u64) -> Result<Vec<(u64, Event)>, DirectorError> {
        let inner = self.inner.read().expect("event log lock poisoned");
        Ok(inner
            .events
            .iter()
            .filter(|(seq, _)| *seq >= from_seq)
            .cloned()
            .collect())
    }

    async fn last_seq(&self) -> u64 {
        let inner = self.inner.read().expect("event log lock poisoned");
        inner.events.last().map_or(0, |(seq, _)| *seq)
    }

    async fn seq_for_id(&self, event_id: Uuid) -> Option<u64> {
        let inner = self.inner.read().expect("event log lock poisoned");
        inner.index.get(&event_id).copied()
    }
}
