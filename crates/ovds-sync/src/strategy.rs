//! Merge strategies and the conflict resolver.

use crate::error::SyncError;
use ovds_store::{DocPath, Payload};

/// A pluggable conflict-resolution strategy.
///
/// Strategies must be pure: the same `(local, remote)` inputs always produce
/// the same merged payload, and they must not suspend. Retries depend on
/// both properties.
pub trait MergeStrategy: Send + Sync {
    /// Merge a local update into the remotely stored payload.
    fn merge(&self, local: &Payload, remote: &Payload) -> Payload;
}

/// Field-union merge: start from the remote payload and overlay every field
/// present in the local update, local winning on collision.
///
/// This is last-writer-wins per field, not whole-document LWW. Callers
/// needing different semantics (numeric accumulation, monotonic status
/// advance) supply their own [`MergeStrategy`].
pub struct FieldUnionMerge;

impl MergeStrategy for FieldUnionMerge {
    fn merge(&self, local: &Payload, remote: &Payload) -> Payload {
        overlay(remote, local)
    }
}

/// Overlay `updates` onto `base`, field by field, updates winning.
pub fn overlay(base: &Payload, updates: &Payload) -> Payload {
    let mut merged = base.clone();
    for (key, value) in updates {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Everything known about one update attempt at resolution time.
///
/// Lives only for the duration of a single [`ConflictResolver::resolve`]
/// call.
#[derive(Clone, Debug)]
pub struct ConflictContext {
    pub path: DocPath,
    pub expected_version: u64,
    pub actual_version: u64,
    pub local_update: Payload,
    pub remote_payload: Option<Payload>,
}

/// Computes the payload to commit for an update attempt.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolve an update attempt against the stored state.
    ///
    /// Matching versions mean no real conflict: the local update passes
    /// through unchanged and the caller bumps the version. On mismatch the
    /// strategy decides. An absent remote payload means the document
    /// vanished mid-resolution, which is fatal.
    pub fn resolve(
        ctx: &ConflictContext,
        strategy: &dyn MergeStrategy,
    ) -> Result<Payload, SyncError> {
        let remote = ctx
            .remote_payload
            .as_ref()
            .ok_or_else(|| SyncError::DocumentVanished(ctx.path.to_string()))?;

        if ctx.expected_version == ctx.actual_version {
            return Ok(ctx.local_update.clone());
        }

        Ok(strategy.merge(&ctx.local_update, remote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovds_store::MESSAGES;
    use serde_json::json;

    fn payload(pairs: &[(&str, serde_json::Value)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn ctx(expected: u64, actual: u64, local: Payload, remote: Option<Payload>) -> ConflictContext {
        ConflictContext {
            path: DocPath::new(MESSAGES, "m1"),
            expected_version: expected,
            actual_version: actual,
            local_update: local,
            remote_payload: remote,
        }
    }

    #[test]
    fn test_field_union_local_wins_on_collision() {
        let local = payload(&[("text", json!("hi"))]);
        let remote = payload(&[("text", json!("old")), ("readBy", json!(["u1"]))]);

        let merged = FieldUnionMerge.merge(&local, &remote);
        assert_eq!(merged["text"], json!("hi"));
        assert_eq!(merged["readBy"], json!(["u1"]));
    }

    #[test]
    fn test_matching_versions_pass_local_through() {
        let local = payload(&[("text", json!("hi"))]);
        let remote = payload(&[("text", json!("old"))]);

        let resolved =
            ConflictResolver::resolve(&ctx(3, 3, local.clone(), Some(remote)), &FieldUnionMerge)
                .unwrap();
        assert_eq!(resolved, local);
    }

    #[test]
    fn test_mismatch_invokes_strategy() {
        let local = payload(&[("text", json!("hi"))]);
        let remote = payload(&[("text", json!("old")), ("readBy", json!(["u1"]))]);

        let resolved =
            ConflictResolver::resolve(&ctx(3, 4, local, Some(remote)), &FieldUnionMerge).unwrap();
        assert_eq!(resolved["text"], json!("hi"));
        assert_eq!(resolved["readBy"], json!(["u1"]));
    }

    #[test]
    fn test_vanished_remote_is_fatal() {
        let err = ConflictResolver::resolve(&ctx(3, 4, Payload::new(), None), &FieldUnionMerge)
            .unwrap_err();
        assert!(matches!(err, SyncError::DocumentVanished(_)));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let local = payload(&[("a", json!(1))]);
        let remote = payload(&[("a", json!(2)), ("b", json!(3))]);
        let context = ctx(1, 2, local, Some(remote));

        let first = ConflictResolver::resolve(&context, &FieldUnionMerge).unwrap();
        let second = ConflictResolver::resolve(&context, &FieldUnionMerge).unwrap();
        assert_eq!(first, second);
    }
}
