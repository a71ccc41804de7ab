//! Status-aware merge strategy for message documents.

use crate::message::DeliveryStatus;
use ovds_store::Payload;
use ovds_sync::{overlay, MergeStrategy};
use serde_json::Value;
use std::collections::BTreeSet;

const STATUS_FIELD: &str = "deliveryStatus";
const READ_BY_FIELD: &str = "readBy";

/// Merge for concurrently updated message documents.
///
/// Ordinary fields follow field-union semantics (local wins), but the two
/// status-bearing fields are monotonic:
///
/// - `deliveryStatus` keeps whichever side is later in the lifecycle order,
///   so a concurrent READ can never be clobbered back to SENT;
/// - `readBy` is the set union of both sides.
pub struct MonotonicStatusMerge;

impl MergeStrategy for MonotonicStatusMerge {
    fn merge(&self, local: &Payload, remote: &Payload) -> Payload {
        let mut merged = overlay(remote, local);

        if let (Some(l), Some(r)) = (
            local.get(STATUS_FIELD).and_then(DeliveryStatus::from_value),
            remote.get(STATUS_FIELD).and_then(DeliveryStatus::from_value),
        ) {
            merged.insert(
                STATUS_FIELD.to_string(),
                Value::String(l.later(r).as_str().to_string()),
            );
        }

        let read_by = union_of_string_sets(local.get(READ_BY_FIELD), remote.get(READ_BY_FIELD));
        if !read_by.is_empty() {
            merged.insert(
                READ_BY_FIELD.to_string(),
                Value::Array(read_by.into_iter().map(Value::String).collect()),
            );
        }

        merged
    }
}

fn union_of_string_sets(a: Option<&Value>, b: Option<&Value>) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    for value in [a, b].into_iter().flatten() {
        if let Value::Array(items) = value {
            for item in items {
                if let Value::String(s) = item {
                    set.insert(s.clone());
                }
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(pairs: &[(&str, serde_json::Value)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_later_status_wins_regardless_of_side() {
        let local = payload(&[("deliveryStatus", json!("SENT"))]);
        let remote = payload(&[("deliveryStatus", json!("READ"))]);

        let merged = MonotonicStatusMerge.merge(&local, &remote);
        assert_eq!(merged["deliveryStatus"], json!("READ"));

        let merged = MonotonicStatusMerge.merge(&remote, &local);
        assert_eq!(merged["deliveryStatus"], json!("READ"));
    }

    #[test]
    fn test_read_by_is_unioned() {
        let local = payload(&[("readBy", json!(["u2"])), ("deliveryStatus", json!("READ"))]);
        let remote = payload(&[
            ("readBy", json!(["u1"])),
            ("deliveryStatus", json!("DELIVERED")),
            ("text", json!("hi")),
        ]);

        let merged = MonotonicStatusMerge.merge(&local, &remote);
        assert_eq!(merged["readBy"], json!(["u1", "u2"]));
        assert_eq!(merged["deliveryStatus"], json!("READ"));
        assert_eq!(merged["text"], json!("hi"));
    }

    #[test]
    fn test_plain_fields_keep_field_union_semantics() {
        let local = payload(&[("text", json!("edited"))]);
        let remote = payload(&[("text", json!("original")), ("sender", json!("alice"))]);

        let merged = MonotonicStatusMerge.merge(&local, &remote);
        assert_eq!(merged["text"], json!("edited"));
        assert_eq!(merged["sender"], json!("alice"));
    }

    #[test]
    fn test_merge_is_pure() {
        let local = payload(&[("deliveryStatus", json!("DELIVERED")), ("readBy", json!(["a"]))]);
        let remote = payload(&[("deliveryStatus", json!("FAILED")), ("readBy", json!(["b"]))]);

        let first = MonotonicStatusMerge.merge(&local, &remote);
        let second = MonotonicStatusMerge.merge(&local, &remote);
        assert_eq!(first, second);
        // Confirmed receipt beats a stale transport failure.
        assert_eq!(first["deliveryStatus"], json!("DELIVERED"));
    }
}
