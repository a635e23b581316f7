#![allow(dead_code)]

use datasync_engine::memory::MemoryStore;
use datasync_engine::{HookTable, ReconcileConfig, ReconcileOptions, RelationHooks};
use datasync_model::{ModelSchema, Record, RelationDescriptor};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config keyed on `pivot`, with the store identity in `id`.
pub fn pivot_config(include_relations: bool) -> ReconcileConfig {
    ReconcileConfig::from_options(ReconcileOptions {
        pivot_key: Some("pivot".into()),
        id_key: Some("id".into()),
        include_relations: Some(include_relations),
        ..Default::default()
    })
}

pub fn users_schema() -> ModelSchema {
    ModelSchema::new("users")
        .with_relation(RelationDescriptor::owned("addresses", "addresses"))
        .with_relation(RelationDescriptor::linked("tags", "tags"))
}

pub fn addresses() -> RelationDescriptor {
    RelationDescriptor::owned("addresses", "addresses")
}

pub fn tags() -> RelationDescriptor {
    RelationDescriptor::linked("tags", "tags")
}

pub async fn seed(store: &MemoryStore, model: &str, rows: Vec<Value>) -> Vec<Record> {
    let mut records = Vec::new();
    for row in rows {
        records.push(store.insert(model, row).await.unwrap());
    }
    records
}

/// Records hook calls as short strings, in dispatch order.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

fn key_of(record: &Record) -> String {
    record
        .get_field("pivot")
        .map(Value::to_string)
        .unwrap_or_else(|| "?".into())
}

/// A hook table that records every notification into `calls`.
pub fn recording_hooks(calls: &Calls) -> HookTable {
    let (new, update, delete) = (calls.clone(), calls.clone(), calls.clone());
    let (new_rel, update_rel, delete_rel) = (calls.clone(), calls.clone(), calls.clone());
    HookTable::new()
        .on_new_record(move |r| new.push(format!("new {}", key_of(r))))
        .on_update_record(move |ch| {
            update.push(format!(
                "update {} {} {} -> {} new={}",
                key_of(ch.record),
                ch.field,
                ch.old_value,
                ch.new_value,
                ch.is_new_record
            ))
        })
        .on_delete_record(move |r| delete.push(format!("delete {}", key_of(r))))
        .on_new_related_data(move |ch| {
            new_rel.push(format!(
                "new_related {} {} of {}",
                ch.relation,
                key_of(ch.record),
                key_of(ch.parent)
            ))
        })
        .on_update_related_data(move |ch| {
            update_rel.push(format!(
                "update_related {} {} {} {} -> {} parent_new={}",
                ch.relation,
                key_of(ch.record),
                ch.field,
                ch.old_value,
                ch.new_value,
                ch.parent_is_new
            ))
        })
        .on_delete_related_data(move |ch| {
            delete_rel.push(format!(
                "delete_related {} {} of {}",
                ch.relation,
                key_of(ch.record),
                key_of(ch.parent)
            ))
        })
}

/// Hooks for one relation that record under a `special` prefix.
pub fn specialized_hooks(calls: &Calls) -> RelationHooks {
    let (new, updated, delete) = (calls.clone(), calls.clone(), calls.clone());
    RelationHooks::new()
        .on_new(move |ch| new.push(format!("special_new {} {}", ch.relation, key_of(ch.record))))
        .on_updated(move |ch| updated.push(format!("special_updated {} {}", ch.relation, ch.field)))
        .on_delete(move |ch| {
            delete.push(format!("special_delete {} {}", ch.relation, key_of(ch.record)))
        })
}
