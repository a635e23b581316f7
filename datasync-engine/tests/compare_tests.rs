mod common;

use common::{addresses, pivot_config, recording_hooks, seed, tags, users_schema, Calls};
use datasync_engine::memory::MemoryStore;
use datasync_engine::{
    Endpoints, HookTable, ReconcileConfig, ReconcileMode, ReconcileOptions, ReconcileReport,
    Reconciler, RelationHooks,
};
use datasync_model::Record;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Two stores covering every kind of change, top level and one level down.
async fn fixture() -> (MemoryStore, MemoryStore) {
    let (source, target) = (MemoryStore::new(), MemoryStore::new());

    let s = seed(
        &source,
        "users",
        vec![
            json!({"pivot": 1, "name": "kept"}),
            json!({"pivot": 2, "name": "renamed"}),
            json!({"pivot": 3, "name": "new"}),
        ],
    )
    .await;
    let t = seed(
        &target,
        "users",
        vec![
            json!({"pivot": 1, "name": "kept"}),
            json!({"pivot": 2, "name": "old name"}),
            json!({"pivot": 4, "name": "gone"}),
        ],
    )
    .await;

    for (store, parent, relation, fields) in [
        (&source, &s[0], addresses(), json!({"pivot": 10, "city": "Bergen"})),
        (&source, &s[0], addresses(), json!({"pivot": 11, "city": "Rome"})),
        (&source, &s[2], addresses(), json!({"pivot": 12, "city": "Lima"})),
        (&source, &s[1], tags(), json!({"pivot": 90})),
        (&source, &s[1], tags(), json!({"pivot": 91})),
        (&target, &t[0], addresses(), json!({"pivot": 10, "city": "Oslo"})),
        (&target, &t[0], addresses(), json!({"pivot": 13, "city": "Kyiv"})),
        (&target, &t[1], tags(), json!({"pivot": 92})),
    ] {
        let record = store.insert(&relation.target_model, fields).await.unwrap();
        store.link(parent, &relation, &record).await.unwrap();
    }
    // Exists in the target but not linked to anyone yet.
    target.insert("tags", json!({"pivot": 90})).await.unwrap();

    (source, target)
}

async fn run(config: ReconcileConfig, calls: &Calls) -> (ReconcileReport, MemoryStore) {
    let (source, target) = fixture().await;
    let schema = users_schema();
    let report = Reconciler::new(config.with_hooks(recording_hooks(calls)))
        .sync_models(Endpoints::new(&source, &schema, &target, &schema))
        .await
        .unwrap();
    (report, target)
}

#[tokio::test]
async fn compare_only_never_writes() {
    let calls = Calls::default();
    let config = pivot_config(true).compare_only();

    let (report, target) = run(config, &calls).await;

    assert_eq!(report.mode, ReconcileMode::CompareOnly);
    assert!(report.has_changes());
    assert!(target.operations().await.is_empty());
    assert_eq!(target.len("users").await, 3);
    assert_eq!(target.records("users").await[1].get_str("name"), Some("old name"));
}

#[tokio::test]
async fn compare_only_matches_apply_notifications() {
    let applied_calls = Calls::default();
    let compared_calls = Calls::default();

    let (applied, _) = run(pivot_config(true), &applied_calls).await;
    let (compared, _) = run(pivot_config(true).compare_only(), &compared_calls).await;

    assert_eq!(compared.events, applied.events);
    assert_eq!(compared.outcomes, applied.outcomes);
    assert_eq!(compared.counts, applied.counts);
    assert_eq!(compared_calls.take(), applied_calls.take());
}

#[tokio::test]
async fn apply_covers_every_kind_of_change() {
    let calls = Calls::default();
    let (report, _) = run(pivot_config(true), &calls).await;

    assert_eq!(
        calls.take(),
        vec![
            "new 3",
            r#"update 2 name "old name" -> "renamed" new=false"#,
            "delete 4",
            // Created parents descend first.
            "new_related address 12 of 3",
            // Then matched parents, in source order.
            "new_related address 11 of 1",
            r#"update_related address 10 city "Oslo" -> "Bergen" parent_new=false"#,
            "delete_related address 13 of 1",
            "new_related tag 90 of 2",
            "delete_related tag 92 of 2",
        ]
    );
    // Tag 91 has no target record to link.
    assert_eq!(report.counts.skipped, 1);
}

#[tokio::test]
async fn compare_only_child_carries_its_parent() {
    let (source, target) = fixture().await;
    let schema = users_schema();

    let seen: Arc<Mutex<Vec<Record>>> = Arc::default();
    let sink = seen.clone();
    let hooks = HookTable::new().relation(
        "address",
        RelationHooks::new().on_new(move |change| sink.lock().unwrap().push(change.record.clone())),
    );

    Reconciler::new(pivot_config(true).compare_only().with_hooks(hooks))
        .sync_models(Endpoints::new(&source, &schema, &target, &schema))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let under_new_parent = seen
        .iter()
        .find(|r| r.get_field("pivot") == Some(&json!(12)))
        .unwrap();
    assert!(!under_new_parent.is_persisted());
    assert_eq!(under_new_parent.get_field("id"), None);
    let parent = under_new_parent.get_field("user").and_then(Value::as_object).unwrap();
    assert_eq!(parent.get("pivot"), Some(&json!(3)));
}

#[tokio::test]
async fn compare_only_child_keeps_its_own_parent_field() {
    let (source, target) = (MemoryStore::new(), MemoryStore::new());
    let s = seed(&source, "users", vec![json!({"pivot": 1})]).await;
    seed(&target, "users", vec![json!({"pivot": 1})]).await;
    let address = source
        .insert("addresses", json!({"pivot": 10, "user": "own"}))
        .await
        .unwrap();
    source.link(&s[0], &addresses(), &address).await.unwrap();
    let schema = users_schema();

    let seen: Arc<Mutex<Vec<Record>>> = Arc::default();
    let sink = seen.clone();
    let hooks = HookTable::new().relation(
        "address",
        RelationHooks::new().on_new(move |change| sink.lock().unwrap().push(change.record.clone())),
    );

    Reconciler::new(pivot_config(true).compare_only().with_hooks(hooks))
        .sync_models(Endpoints::new(&source, &schema, &target, &schema))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].get_str("user"), Some("own"));
}

#[tokio::test]
async fn compare_only_new_record_has_no_identity() {
    let (source, target) = (MemoryStore::new(), MemoryStore::new());
    seed(&source, "users", vec![json!({"id": 77, "pivot": 1, "name": "a"})]).await;
    let schema = users_schema();

    let seen: Arc<Mutex<Vec<Record>>> = Arc::default();
    let sink = seen.clone();
    let hooks = HookTable::new().on_new_record(move |r| sink.lock().unwrap().push(r.clone()));

    Reconciler::new(pivot_config(false).compare_only().with_hooks(hooks))
        .sync_models(Endpoints::new(&source, &schema, &target, &schema))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].get_field("id"), None);
    assert_eq!(seen[0].get_str("name"), Some("a"));
    assert!(!seen[0].is_persisted());
}

#[tokio::test]
async fn compare_models_forces_compare_only() {
    let (source, target) = fixture().await;
    let schema = users_schema();
    let reconciler = Reconciler::new(pivot_config(true));

    let report = reconciler
        .compare_models(Endpoints::new(&source, &schema, &target, &schema))
        .await
        .unwrap();

    assert_eq!(report.mode, ReconcileMode::CompareOnly);
    assert!(report.has_changes());
    assert!(target.operations().await.is_empty());
    // The reconciler's own configuration is untouched.
    assert!(!reconciler.config().is_compare_only());
}

#[tokio::test]
async fn compare_only_from_json_options() {
    let options = ReconcileOptions::from_json(
        r#"{"compareOnly": true, "includeRelations": true, "pivotKeyName": "pivot"}"#,
    )
    .unwrap();
    let config = ReconcileConfig::from_options(options);
    let calls = Calls::default();

    let (report, target) = run(config, &calls).await;

    assert!(report.has_changes());
    assert!(target.operations().await.is_empty());
    assert!(calls.count("new_related") > 0);
}
