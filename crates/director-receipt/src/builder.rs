//! Fluent builder for constructing [`Receipt`]s.

use director_core::{Receipt, ReceiptKind};
use uuid::Uuid;

/// Fluent builder for constructing [`Receipt`]s ergonomically, mirroring the
/// shape receipts are minted in by `director-projection` (id from the
/// producing event, kind, references, timestamp) without requiring callers
/// to have an [`director_core::Event`] on hand.
#[derive(Debug)]
pub struct ReceiptBuilder {
    receipt_id: Option<Uuid>,
    kind: ReceiptKind,
    references: Vec<String>,
    timestamp_ms: i64,
}

impl ReceiptBuilder {
    /// Creates a new builder for a receipt of the given kind.
    #[must_use]
    pub fn new(kind: ReceiptKind) -> Self {
        Self { receipt_id: None, kind, references: Vec::new(), timestamp_ms: 0 }
    }

    /// Sets an explicit receipt id instead of generating one at `build()`.
    #[must_use]
    pub fn receipt_id(mut self, id: Uuid) -> Self {
        self.receipt_id = Some(id);
        self
    }

    /// Appends a referenced identifier (lease id, artifact hash, run id, ...).
    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    /// Sets the recorded timestamp.
    #[must_use]
    pub fn timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Consumes the builder and produces a [`Receipt`].
    #[must_use]
    pub fn build(self) -> Receipt {
        Receipt {
            receipt_id: self.receipt_id.unwrap_or_else(Uuid::new_v4),
            kind: self.kind,
            references: self.references,
            timestamp_ms: self.timestamp_ms,
        }
    }
}
