//! Canonical JSON and SHA-256 content hashing.
//!
//! Object keys are emitted in sorted order at every depth, so two values
//! that differ only in field order hash identically.

use crate::error::{CryptoError, CryptoResult};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render a JSON value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Serialize any value to its canonical JSON bytes.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> CryptoResult<Vec<u8>> {
    let value =
        serde_json::to_value(value).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(canonical_json(&value).into_bytes())
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 over the canonical JSON form of `value`.
pub fn hash_content<T: Serialize + ?Sized>(value: &T) -> CryptoResult<String> {
    Ok(sha256_hex(&canonical_bytes(value)?))
}
