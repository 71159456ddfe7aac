//! Idempotent re-execution of changes.
//!
//! Every executed delta is recorded with a deterministic fingerprint: the
//! SHA-256 of its canonical JSON form (sorted keys, no whitespace). Before a
//! delta is executed it is compared with the deltas already executed for the
//! same object, so that a restarted computation does not repeat work.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::context::ExecutedDelta;
use crate::delta::ObjectDelta;
use crate::error::ProjectorResult;

/// What to do with a delta about to be executed.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyDecision {
    /// Nothing equivalent was executed; run it.
    Execute(ObjectDelta),
    /// An equivalent delta already succeeded.
    Skip,
    /// A previous ADD of the same object succeeded; run only the difference.
    ExecuteDifference(ObjectDelta),
}

/// Fingerprint of any serializable value.
///
/// The value is serialized to canonical JSON and hashed; the result is a
/// 64-character hex string.
pub fn fingerprint<T: Serialize>(value: &T) -> ProjectorResult<String> {
    let json = serde_json::to_value(value)?;
    let canonical = serde_json::to_string(&sort_json_keys(&json))?;
    Ok(hash_string(&canonical))
}

/// Decide how to execute `delta` given the deltas already executed for the
/// same context.
///
/// Only the most recent related delta is considered. A successful exact
/// match is skipped. A new ADD following a successful ADD of the same object
/// is reduced to the MODIFY between the two objects.
pub fn check(executed: &[ExecutedDelta], delta: ObjectDelta) -> ProjectorResult<IdempotencyDecision> {
    let Some(previous) = executed.iter().rev().find(|e| is_related(e, &delta)) else {
        return Ok(IdempotencyDecision::Execute(delta));
    };
    if !previous.is_success() {
        return Ok(IdempotencyDecision::Execute(delta));
    }
    if previous.fingerprint == delta.fingerprint()? {
        return Ok(IdempotencyDecision::Skip);
    }

    match (previous.delta.object_to_add(), delta.object_to_add()) {
        (Some(old), Some(new)) => {
            let mut difference = ObjectDelta::diff(old, new);
            difference.oid.clone_from(&previous.object_oid);
            difference.simplify();
            if difference.is_empty() {
                Ok(IdempotencyDecision::Skip)
            } else {
                Ok(IdempotencyDecision::ExecuteDifference(difference))
            }
        }
        _ => Ok(IdempotencyDecision::Execute(delta)),
    }
}

fn is_related(executed: &ExecutedDelta, delta: &ObjectDelta) -> bool {
    if executed.delta.object_type != delta.object_type {
        return false;
    }
    if let Some(oid) = &delta.oid {
        if executed.delta.oid.as_ref() == Some(oid) || executed.object_oid.as_ref() == Some(oid) {
            return true;
        }
    }
    match (executed.delta.object_to_add(), delta.object_to_add()) {
        (Some(old), Some(new)) => old.coordinates == new.coordinates,
        _ => false,
    }
}

/// Recursively sort JSON object keys for canonical representation.
fn sort_json_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: serde_json::Map<String, serde_json::Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_json_keys(v)))
                .collect();
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_json_keys).collect())
        }
        other => other.clone(),
    }
}

/// Generate SHA256 hash of a string, returning hex-encoded result.
fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
