//! Field-level diffing of two [`Receipt`]s.

use director_core::Receipt;

/// A single field difference between two receipts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    /// Field name (`kind`, `references`, `timestamp_ms`).
    pub field: String,
    /// Serialized old value.
    pub old: String,
    /// Serialized new value.
    pub new: String,
}

/// The result of comparing two receipts field by field.
#[derive(Debug, Clone)]
pub struct ReceiptDiff {
    /// Individual field differences. Empty if the receipts are equivalent.
    pub changes: Vec<FieldDiff>,
}

impl ReceiptDiff {
    /// Whether there are no differences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of differing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Compares two receipts field by field. `receipt_id` is intentionally
/// excluded: it identifies which receipt this is, not what changed about it.
#[must_use]
pub fn diff_receipts(a: &Receipt, b: &Receipt) -> ReceiptDiff {
    let mut changes = Vec::new();

    if a.kind != b.kind {
        changes.push(FieldDiff {
            field: "kind".into(),
            old: format!("{:?}", a.kind),
            new: format!("{:?}", b.kind),
        });
    }

    if a.references != b.references {
        changes.push(FieldDiff {
            field: "references".into(),
            old: format!("{:?}", a.references),
            new: format!("{:?}", b.references),
        });
    }

    if a.timestamp_ms != b.timestamp_ms {
        changes.push(FieldDiff {
            field: "timestamp_ms".into(),
            old: a.timestamp_ms.to_string(),
            new: b.timestamp_ms.to_string(),
        });
    }

    ReceiptDiff { changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use director_core::ReceiptKind;
    use uuid::Uuid;

    fn receipt() -> Receipt {
        Receipt { receipt_id: Uuid::nil(), kind: ReceiptKind::Read, references: vec![], timestamp_ms: 1 }
    }

    #[test]
    fn identical_receipts_diff_empty() {
        assert!(diff_receipts(&receipt(), &receipt()).is_empty());
    }

    #[test]
    fn kind_change_is_detected() {
        let mut b = receipt();
        b.kind = ReceiptKind::Commit;
        let diff = diff_receipts(&receipt(), &b);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.changes[0].field, "kind");
    }

    #[test]
    fn receipt_id_change_alone_is_not_diffed() {
        let mut b = receipt();
        b.receipt_id = Uuid::new_v4();
        assert!(diff_receipts(&receipt(), &b).is_empty());
    }
}
