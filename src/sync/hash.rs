//! Content hashing for sync status.
//!
//! Snapshots are compared by hashing their parsed records rather than the
//! raw file bytes, so whitespace-only edits do not count as drift.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::sync::types::SyncResult;

/// Compute a SHA256 hash of a serializable value.
///
/// The value is first serialized to JSON, then hashed. `serde_json` keeps
/// object keys sorted, so equal snapshots always hash equal.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn content_hash<T: Serialize>(value: &T) -> SyncResult<String> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check if content has changed against a stored hash.
///
/// Returns `true` if there is no stored hash or the hashes differ.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_deterministic() {
        let records = json!([{"id": "a", "title": "Intro"}]);

        let hash1 = content_hash(&records).unwrap();
        let hash2 = content_hash(&records).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"id":"a","title":"x"}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"title":"x","id":"a"}"#).unwrap();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
