//! Plan fingerprinting and stalemate detection
//!
//! A fingerprint is a SHA-256 over a canonical encoding of the plan: object
//! keys are visited in sorted order and every value is tagged with its type,
//! so two structurally identical plans collide regardless of key order.

use overmind_core::{OvermindError, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Occurrences of a fingerprint in history that make the next one a stalemate
pub const STALEMATE_REPEAT_THRESHOLD: usize = 2;

/// Stable structural hash of a plan
pub fn plan_fingerprint(plan: &Value) -> String {
    let mut hasher = Sha256::new();
    hash_value(&mut hasher, plan);
    hex::encode(hasher.finalize())
}

/// Number of times `fingerprint` already appears in `history`
pub fn repeat_count(history: &[String], fingerprint: &str) -> usize {
    history.iter().filter(|h| h.as_str() == fingerprint).count()
}

/// Fail with [`OvermindError::Stalemate`] if `fingerprint` was already seen
/// at least [`STALEMATE_REPEAT_THRESHOLD`] times.
///
/// Must run before the new fingerprint is appended to `history`.
pub fn check_fingerprint(history: &[String], fingerprint: &str) -> Result<()> {
    let seen = repeat_count(history, fingerprint);
    if seen >= STALEMATE_REPEAT_THRESHOLD {
        return Err(OvermindError::Stalemate(format!(
            "plan {} already proposed {} times",
            short(fingerprint),
            seen
        )));
    }
    Ok(())
}

/// [`check_fingerprint`] on the plan's own fingerprint
pub fn detect_stalemate(history: &[String], plan: &Value) -> Result<()> {
    check_fingerprint(history, &plan_fingerprint(plan))
}

fn short(fingerprint: &str) -> String {
    fingerprint.chars().take(12).collect()
}

fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(true) => hasher.update(b"t"),
        Value::Bool(false) => hasher.update(b"f"),
        Value::Number(n) => {
            hasher.update(b"#");
            hash_str(hasher, &n.to_string());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hash_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                hash_value(hasher, item);
            }
            hasher.update(b"]");
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for key in keys {
                hash_str(hasher, key);
                hash_value(hasher, &map[key.as_str()]);
            }
            hasher.update(b"}");
        }
    }
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update(s.len().to_le_bytes());
    hasher.update(s.as_bytes());
    hasher.update([0]);
}
