//! Integration tests for the optimistic versioning protocol.

use ovds_store::{DocPath, DocumentStore, MemoryStore, Payload, MESSAGES};
use ovds_sync::{
    ConsistencyEvent, ConsistencyMonitor, FieldUnionMerge, SyncError, VersioningService,
};
use serde_json::json;
use std::sync::Arc;

fn payload(pairs: &[(&str, serde_json::Value)]) -> Payload {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn service(store: Arc<MemoryStore>) -> VersioningService<MemoryStore> {
    VersioningService::new(store, Arc::new(ConsistencyMonitor::new()))
}

#[tokio::test]
async fn version_sequence_is_gap_free() {
    let svc = service(Arc::new(MemoryStore::new()));
    let path = DocPath::new(MESSAGES, "m1");

    let mut doc = svc.create(&path, payload(&[("n", json!(0))])).await.unwrap();
    assert_eq!(doc.version, 1);

    for i in 1..=6u64 {
        doc = svc
            .update(&path, payload(&[("n", json!(i))]), doc.version, &FieldUnionMerge)
            .await
            .unwrap();
        assert_eq!(doc.version, i + 1);
    }
}

#[tokio::test]
async fn concurrent_edit_merges_onto_winner() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let path = DocPath::new("conversations", "c1");

    svc.create(&path, payload(&[("title", json!("walk home"))]))
        .await
        .unwrap();
    let base = svc
        .update(&path, payload(&[("topic", json!("route"))]), 1, &FieldUnionMerge)
        .await
        .unwrap();
    assert_eq!(base.version, 2);

    // Both callers read version 2. A commits first.
    let a = svc
        .update(&path, payload(&[("title", json!("walk to school"))]), 2, &FieldUnionMerge)
        .await
        .unwrap();
    assert_eq!(a.version, 3);

    // B's expected version is stale; its fields overlay A's committed state.
    let b = svc
        .update(&path, payload(&[("topic", json!("detour"))]), 2, &FieldUnionMerge)
        .await
        .unwrap();
    assert_eq!(b.version, 4);
    assert_eq!(b.payload["title"], json!("walk to school"));
    assert_eq!(b.payload["topic"], json!("detour"));
}

#[tokio::test]
async fn conflict_merge_example_bumps_to_actual_plus_one() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let path = DocPath::new(MESSAGES, "m1");

    // Stored state is at version 4; the caller still believes 3.
    store
        .commit(
            &path,
            None,
            ovds_store::StoredDocument::new(
                4,
                payload(&[("text", json!("old")), ("readBy", json!(["u1"]))]),
            ),
        )
        .await
        .unwrap();

    let merged = svc
        .update(&path, payload(&[("text", json!("hi"))]), 3, &FieldUnionMerge)
        .await
        .unwrap();

    assert_eq!(merged.version, 5);
    assert_eq!(merged.payload["text"], json!("hi"));
    assert_eq!(merged.payload["readBy"], json!(["u1"]));
}

#[tokio::test(start_paused = true)]
async fn continuous_contention_exhausts_after_five_attempts() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let path = DocPath::new(MESSAGES, "m1");

    svc.create(&path, Payload::new()).await.unwrap();
    let creation_commits = store.commit_attempts();

    store.inject_conflicts(u32::MAX);
    let started = tokio::time::Instant::now();
    let err = svc
        .update(&path, payload(&[("text", json!("x"))]), 1, &FieldUnionMerge)
        .await
        .unwrap_err();

    match err {
        SyncError::ConcurrencyExhausted { attempts, .. } => assert_eq!(attempts, 5),
        other => panic!("unexpected error: {:?}", other),
    }
    // Exactly 5 commit attempts beyond the creation.
    assert_eq!(store.commit_attempts() - creation_commits, 5);
    // Backoff schedule: 300 + 600 + 1200 + 2400 + 4800 ms.
    assert_eq!(started.elapsed().as_millis(), 9300);
}

#[tokio::test(start_paused = true)]
async fn transient_conflict_recovers_within_budget() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let path = DocPath::new(MESSAGES, "m1");

    svc.create(&path, Payload::new()).await.unwrap();
    store.inject_conflicts(2);

    let doc = svc
        .update(&path, payload(&[("text", json!("x"))]), 1, &FieldUnionMerge)
        .await
        .unwrap();
    assert_eq!(doc.version, 2);
}

#[tokio::test]
async fn update_emits_version_and_conflict_events() {
    let store = Arc::new(MemoryStore::new());
    let monitor = Arc::new(ConsistencyMonitor::new());
    let svc = VersioningService::new(store.clone(), monitor.clone());
    let path = DocPath::new(MESSAGES, "m1");
    let mut feed = monitor.subscribe();

    svc.create(&path, Payload::new()).await.unwrap();
    svc.update(&path, payload(&[("a", json!(1))]), 1, &FieldUnionMerge)
        .await
        .unwrap();
    // Stale expected version triggers a conflict event before the commit.
    svc.update(&path, payload(&[("b", json!(2))]), 1, &FieldUnionMerge)
        .await
        .unwrap();

    assert!(matches!(
        feed.recv().await.unwrap(),
        ConsistencyEvent::DocumentTracked { version: 1, .. }
    ));
    assert!(matches!(
        feed.recv().await.unwrap(),
        ConsistencyEvent::VersionUpdated { version: 2, .. }
    ));
    assert!(matches!(
        feed.recv().await.unwrap(),
        ConsistencyEvent::ConflictDetected {
            expected: 1,
            actual: 2,
            ..
        }
    ));
    assert!(matches!(
        feed.recv().await.unwrap(),
        ConsistencyEvent::VersionUpdated { version: 3, .. }
    ));
}
