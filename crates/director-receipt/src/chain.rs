//! Ordered, tamper-evident chain of [`Receipt`]s.
//!
//! [`director_core::Receipt`] carries no embedded hash field, so each entry
//! pairs a receipt with the hash computed when it entered the chain;
//! [`ReceiptChain::verify`] detects any receipt that was mutated after the
//! fact.

use std::collections::HashSet;
use std::fmt;

use director_core::Receipt;
use uuid::Uuid;

use crate::hash::compute_hash;

/// Errors from receipt chain operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A receipt's recorded hash does not match its recomputed hash.
    HashMismatch {
        /// Index of the receipt with the mismatched hash.
        index: usize,
    },
    /// A receipt's timestamp precedes its predecessor's.
    BrokenLink {
        /// Index of the receipt with the broken link.
        index: usize,
    },
    /// The chain is empty when a non-empty chain was expected.
    EmptyChain,
    /// A receipt with a duplicate id was encountered.
    DuplicateId {
        /// The duplicate receipt id.
        id: Uuid,
    },
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch { index } => write!(f, "hash mismatch at chain index {index}"),
            Self::BrokenLink { index } => write!(f, "broken link at chain index {index}"),
            Self::EmptyChain => write!(f, "chain is empty"),
            Self::DuplicateId { id } => write!(f, "duplicate receipt id: {id}"),
        }
    }
}

impl std::error::Error for ChainError {}

struct ChainEntry {
    receipt: Receipt,
    receipt_sha256: String,
}

/// An ordered chain of receipts with integrity verification, grounding the
/// append-only, content-addressed discipline the rest of the event contract
/// applies to (spec I6: every capability use and lifecycle transition emits
/// a receipt).
#[derive(Default)]
pub struct ReceiptChain {
    entries: Vec<ChainEntry>,
    seen_ids: HashSet<Uuid>,
}

impl ReceiptChain {
    /// Creates an empty receipt chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and appends a receipt to the chain.
    ///
    /// # Errors
    /// - [`ChainError::DuplicateId`] if the receipt id already appears.
    /// - [`ChainError::BrokenLink`] if `timestamp_ms` precedes the last entry's.
    pub fn push(&mut self, receipt: Receipt) -> Result<(), ChainError> {
        if self.seen_ids.contains(&receipt.receipt_id) {
            return Err(ChainError::DuplicateId { id: receipt.receipt_id });
        }
        if let Some(last) = self.entries.last()
            && receipt.timestamp_ms < last.receipt.timestamp_ms
        {
            return Err(ChainError::BrokenLink { index: self.entries.len() });
        }

        let receipt_sha256 = compute_hash(&receipt).unwrap_or_default();
        self.seen_ids.insert(receipt.receipt_id);
        self.entries.push(ChainEntry { receipt, receipt_sha256 });
        Ok(())
    }

    /// Re-verifies every receipt's recorded hash and chronological ordering.
    ///
    /// # Errors
    /// - [`ChainError::EmptyChain`] if the chain is empty.
    /// - [`ChainError::HashMismatch`] for the first receipt whose content no
    ///   longer matches the hash recorded at push time.
    /// - [`ChainError::BrokenLink`] for the first ordering violation.
    pub fn verify(&self) -> Result<(), ChainError> {
        if self.entries.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        for (i, entry) in self.entries.iter().enumerate() {
            let recomputed = compute_hash(&entry.receipt).unwrap_or_default();
            if recomputed != entry.receipt_sha256 {
                return Err(ChainError::HashMismatch { index: i });
            }
            if i > 0 && entry.receipt.timestamp_ms < self.entries[i - 1].receipt.timestamp_ms {
                return Err(ChainError::BrokenLink { index: i });
            }
        }
        Ok(())
    }

    /// Number of receipts in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain holds no receipts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently pushed receipt, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&Receipt> {
        self.entries.last().map(|e| &e.receipt)
    }

    /// Iterates the chain's receipts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Receipt> {
        self.entries.iter().map(|e| &e.receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use director_core::ReceiptKind;

    fn receipt(id: Uuid, timestamp_ms: i64) -> Receipt {
        Receipt { receipt_id: id, kind: ReceiptKind::Read, references: vec![], timestamp_ms }
    }

    #[test]
    fn push_then_verify_succeeds() {
        let mut chain = ReceiptChain::new();
        chain.push(receipt(Uuid::new_v4(), 1)).unwrap();
        chain.push(receipt(Uuid::new_v4(), 2)).unwrap();
        assert!(chain.verify().is_ok());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let id = Uuid::new_v4();
        let mut chain = ReceiptChain::new();
        chain.push(receipt(id, 1)).unwrap();
        let err = chain.push(receipt(id, 2)).unwrap_err();
        assert_eq!(err, ChainError::DuplicateId { id });
    }

    #[test]
    fn out_of_order_timestamp_is_rejected() {
        let mut chain = ReceiptChain::new();
        chain.push(receipt(Uuid::new_v4(), 5)).unwrap();
        let err = chain.push(receipt(Uuid::new_v4(), 1)).unwrap_err();
        assert_eq!(err, ChainError::BrokenLink { index: 1 });
    }

    #[test]
    fn empty_chain_fails_verify() {
        assert_eq!(ReceiptChain::new().verify().unwrap_err(), ChainError::EmptyChain);
    }

    #[test]
    fn latest_returns_last_pushed() {
        let mut chain = ReceiptChain::new();
        let id = Uuid::new_v4();
        chain.push(receipt(Uuid::new_v4(), 1)).unwrap();
        chain.push(receipt(id, 2)).unwrap();
        assert_eq!(chain.latest().unwrap().receipt_id, id);
    }
}
