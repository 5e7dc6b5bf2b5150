//! Content-addressing primitives shared by every component (§9: "cyclic
//! graphs -> arena + indices", content hashes as the index key).

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::DirectorError;

/// Produces a deterministic JSON string suitable for hashing.
///
/// Not a full JCS implementation, but stable for our types: `serde_json::Value`
/// objects serialize keys in `BTreeMap` order and numbers consistently.
///
/// # Errors
/// Returns [`DirectorError::Serialization`] if `value` cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, DirectorError> {
    let v = serde_json::to_value(value).map_err(DirectorError::Serialization)?;
    serde_json::to_string(&v).map_err(DirectorError::Serialization)
}

/// Hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Derives a stable `Uuid` from arbitrary seed bytes by taking the first 16
/// bytes of their SHA-256 digest. Used where an identifier must be
/// deterministic given its inputs (e.g. a verifier plan id derived from
/// `(mood, touched_paths, risk_tier, allowlist_version)`) rather than
/// random, unlike [`Uuid::new_v4`].
#[must_use]
pub fn content_uuid(seed: &[u8]) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sha256_is_stable() {
        let a = sha256_hex(b"hello");
        let b = sha256_hex(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let v = json!({"b": 1, "a": 2});
        let s = canonical_json(&v).unwrap();
        assert_eq!(s, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn content_uuid_is_deterministic() {
        assert_eq!(content_uuid(b"same seed"), content_uuid(b"same seed"));
        assert_ne!(content_uuid(b"seed a"), content_uuid(b"seed b"));
    }
}
