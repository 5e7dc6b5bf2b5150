//! Canonicalization and hashing for [`Receipt`] integrity checks.

use director_core::{DirectorError, Receipt};
use sha2::{Digest, Sha256};

/// Produces the canonical JSON representation of a receipt.
///
/// Keys are sorted (`serde_json` uses a `BTreeMap` internally) and numbers
/// serialize consistently, so the output is deterministic for a given value.
///
/// # Errors
/// Returns [`DirectorError::Serialization`] if `receipt` cannot be serialized.
pub fn canonicalize(receipt: &Receipt) -> Result<String, DirectorError> {
    let value = serde_json::to_value(receipt).map_err(DirectorError::Serialization)?;
    serde_json::to_string(&value).map_err(DirectorError::Serialization)
}

/// Computes the hex-encoded SHA-256 hash of a receipt's canonical form.
///
/// # Errors
/// Returns [`DirectorError::Serialization`] if `receipt` cannot be serialized.
pub fn compute_hash(receipt: &Receipt) -> Result<String, DirectorError> {
    let json = canonicalize(receipt)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Verifies that `stored_hash` matches the recomputed hash of `receipt`.
#[must_use]
pub fn verify_hash(receipt: &Receipt, stored_hash: &str) -> bool {
    match compute_hash(receipt) {
        Ok(recomputed) => recomputed == stored_hash,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use director_core::ReceiptKind;
    use uuid::Uuid;

    fn receipt() -> Receipt {
        Receipt {
            receipt_id: Uuid::nil(),
            kind: ReceiptKind::Commit,
            references: vec!["run-1".to_string()],
            timestamp_ms: 10,
        }
    }

    #[test]
    fn canonical_form_is_stable() {
        assert_eq!(canonicalize(&receipt()).unwrap(), canonicalize(&receipt()).unwrap());
    }

    #[test]
    fn hash_matches_recomputation() {
        let hash = compute_hash(&receipt()).unwrap();
        assert!(verify_hash(&receipt(), &hash));
    }

    #[test]
    fn tampered_hash_fails_verification() {
        assert!(!verify_hash(&receipt(), "not-the-hash"));
    }
}
