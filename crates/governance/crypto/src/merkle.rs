//! Merkle roots over record fields.
//!
//! Each top-level field becomes one leaf, `sha256("<key>:<canonical value>")`,
//! taken in key order, so the root does not depend on serialization order.
//! Levels are paired left to right; an odd node is paired with itself.

use crate::error::{CryptoError, CryptoResult};
use crate::hashing::{canonical_json, sha256_hex};
use serde::Serialize;
use serde_json::Value;

/// Root over pre-hashed leaves. The root of no leaves is the hash of nothing.
pub fn merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return sha256_hex(b"");
    }
    let mut level: Vec<String> = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                sha256_hex(format!("{}{}", left, right).as_bytes())
            })
            .collect();
    }
    level.remove(0)
}

/// Leaf hashes for the top-level fields of `value`, excluding `exclude`.
pub fn field_leaves(value: &Value, exclude: &[&str]) -> CryptoResult<Vec<String>> {
    let map = value.as_object().ok_or_else(|| {
        CryptoError::Serialization("merkle input must be a JSON object".to_string())
    })?;
    let mut keys: Vec<&String> = map
        .keys()
        .filter(|key| !exclude.contains(&key.as_str()))
        .collect();
    keys.sort();
    Ok(keys
        .into_iter()
        .map(|key| sha256_hex(format!("{}:{}", key, canonical_json(&map[key.as_str()])).as_bytes()))
        .collect())
}

/// Merkle root over the fields of a serializable record.
pub fn object_merkle_root<T: Serialize + ?Sized>(
    record: &T,
    exclude: &[&str],
) -> CryptoResult<String> {
    let value =
        serde_json::to_value(record).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(merkle_root(&field_leaves(&value, exclude)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_leaf_is_its_own_root() {
        let leaf = sha256_hex(b"x");
        assert_eq!(merkle_root(&[leaf.clone()]), leaf);
    }

    #[test]
    fn odd_leaf_is_paired_with_itself() {
        let leaves: Vec<String> = ["a", "b", "c"].iter().map(|s| sha256_hex(s.as_bytes())).collect();
        let ab = sha256_hex(format!("{}{}", leaves[0], leaves[1]).as_bytes());
        let cc = sha256_hex(format!("{}{}", leaves[2], leaves[2]).as_bytes());
        let expected = sha256_hex(format!("{}{}", ab, cc).as_bytes());
        assert_eq!(merkle_root(&leaves), expected);
    }

    #[test]
    fn excluded_fields_do_not_affect_root() {
        let a = json!({"score": 0.9, "proof": {"signature": "aa"}});
        let b = json!({"score": 0.9, "proof": {"signature": "bb"}});
        assert_eq!(
            object_merkle_root(&a, &["proof"]).unwrap(),
            object_merkle_root(&b, &["proof"]).unwrap()
        );
    }

    #[test]
    fn field_change_changes_root() {
        let a = json!({"score": 0.9, "id": "x"});
        let b = json!({"score": 0.8, "id": "x"});
        assert_ne!(
            object_merkle_root(&a, &[]).unwrap(),
            object_merkle_root(&b, &[]).unwrap()
        );
    }

    #[test]
    fn non_object_input_is_rejected() {
        assert!(object_merkle_root(&json!([1, 2]), &[]).is_err());
    }
}
