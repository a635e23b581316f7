//! Record store abstraction.
//!
//! Defines the traits the reconciler reads and writes through, so the engine
//! works with any backend. The source side only needs [`RecordSource`]; the
//! target side implements [`RecordStore`], which adds the mutations.

use crate::error::{ReconcileError, ReconcileResult, StoreOperation, StoreResult};
use async_trait::async_trait;
use datasync_model::{Record, RelationDescriptor};
use datasync_types::FieldMap;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde_json::Value;

/// Read access to a collection of records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Streams every record of a model in store order.
    ///
    /// The stream is lazy and each call starts from the beginning.
    fn enumerate(&self, model: &str) -> BoxStream<'_, StoreResult<Record>>;

    /// Returns the members of `relation` currently associated with `parent`,
    /// in store order.
    async fn relation_records(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
    ) -> StoreResult<Vec<Record>>;
}

/// A store the reconciler can write to.
#[async_trait]
pub trait RecordStore: RecordSource {
    /// Creates a top-level record and returns it as stored.
    async fn create(&self, model: &str, fields: FieldMap) -> StoreResult<Record>;

    /// Persists the current fields of an existing record.
    async fn save(&self, record: &Record) -> StoreResult<()>;

    /// Removes a record.
    async fn destroy(&self, record: &Record) -> StoreResult<()>;

    /// Finds a record of `model` whose `key_name` field equals `value`.
    async fn find_by_key(
        &self,
        model: &str,
        key_name: &str,
        value: &Value,
    ) -> StoreResult<Option<Record>>;

    /// Creates a record owned by `parent` through `relation`.
    async fn create_child(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        fields: FieldMap,
    ) -> StoreResult<Record>;

    /// Associates an existing record with `parent`.
    async fn attach(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        member: &Record,
    ) -> StoreResult<()>;

    /// Dissociates a record from `parent` without removing it.
    async fn detach(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        member: &Record,
    ) -> StoreResult<()>;
}

/// Fetches the source and target members of a relation for one pair.
///
/// Each side is read through its own schema's descriptor of the relation.
/// A target parent that was never persisted (a compare-only projection)
/// cannot have members yet, so the target side is empty without asking the
/// store.
pub async fn relation_collections(
    source: &dyn RecordSource,
    target: &dyn RecordStore,
    source_record: &Record,
    target_record: &Record,
    source_relation: &RelationDescriptor,
    target_relation: &RelationDescriptor,
) -> ReconcileResult<(Vec<Record>, Vec<Record>)> {
    let source_members = source
        .relation_records(source_record, source_relation)
        .await
        .map_err(|e| ReconcileError::store(StoreOperation::Read, &source_record.model, e))?;

    let target_members = if target_record.is_persisted() {
        target
            .relation_records(target_record, target_relation)
            .await
            .map_err(|e| ReconcileError::store(StoreOperation::Read, &target_record.model, e))?
    } else {
        Vec::new()
    };

    Ok((source_members, target_members))
}

/// Reads every record of a model into memory.
pub async fn collect_all(source: &dyn RecordSource, model: &str) -> ReconcileResult<Vec<Record>> {
    source
        .enumerate(model)
        .try_collect()
        .await
        .map_err(|e| ReconcileError::store(StoreOperation::Read, model, e))
}

/// Calls `f` once per record of a model, in store order.
/// Returns the number of records visited.
pub async fn for_each_record<F>(source: &dyn RecordSource, model: &str, mut f: F) -> StoreResult<usize>
where
    F: FnMut(Record) + Send,
{
    let mut visited = 0;
    let mut records = source.enumerate(model);
    while let Some(record) = records.try_next().await? {
        f(record);
        visited += 1;
    }
    Ok(visited)
}
