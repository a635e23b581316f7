//! In-memory record store.
//!
//! Keeps models as ordered row lists and relations as a link table keyed by
//! parent. Every write is appended to an operation log, and writes can be
//! made to fail on demand, which makes the store suitable for exercising the
//! reconciler without a database.

use crate::error::{StoreError, StoreOperation, StoreResult};
use crate::store::{RecordSource, RecordStore};
use async_trait::async_trait;
use datasync_model::{Record, RelationDescriptor};
use datasync_types::{CorrelationKey, FieldMap};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// A write the store performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOp {
    pub operation: StoreOperation,
    pub model: String,
    /// Identity of the record written.
    pub identity: CorrelationKey,
}

/// Identifies one parent's member list for one relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LinkKey {
    parent_model: String,
    relation: String,
    parent: CorrelationKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Member {
    model: String,
    identity: CorrelationKey,
}

#[derive(Debug, Default)]
struct MemoryState {
    models: HashMap<String, Vec<FieldMap>>,
    links: HashMap<LinkKey, Vec<Member>>,
    last_id: i64,
    operations: Vec<StoreOp>,
    failures: Vec<(StoreOperation, String)>,
}

/// A [`RecordStore`] held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    identity_key: String,
    state: RwLock<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store whose identity field is `id`.
    pub fn new() -> Self {
        Self::with_identity_key("id")
    }

    /// Creates an empty store with a custom identity field.
    pub fn with_identity_key(identity_key: impl Into<String>) -> Self {
        Self {
            identity_key: identity_key.into(),
            state: RwLock::new(MemoryState::default()),
        }
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    // ── Seeding and inspection ───────────────────────────────────

    /// Inserts a record without logging an operation.
    /// Assigns an identity if the fields do not carry one.
    pub async fn insert(&self, model: &str, fields: Value) -> StoreResult<Record> {
        let fields: FieldMap = serde_json::from_value(fields)
            .map_err(|e| StoreError::Rejected(format!("record must be an object: {e}")))?;
        let mut state = self.state.write().await;
        let (fields, _) = self.insert_fields(&mut state, model, fields)?;
        Ok(Record::new(model, fields))
    }

    /// Associates `member` with `parent` without logging an operation.
    pub async fn link(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        member: &Record,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        self.link_members(&mut state, parent, relation, member)
    }

    /// Snapshot of all records of a model, in insertion order.
    pub async fn records(&self, model: &str) -> Vec<Record> {
        let state = self.state.read().await;
        state
            .models
            .get(model)
            .map(|rows| rows.iter().map(|f| Record::new(model, f.clone())).collect())
            .unwrap_or_default()
    }

    /// Number of records of a model.
    pub async fn len(&self, model: &str) -> usize {
        let state = self.state.read().await;
        state.models.get(model).map_or(0, Vec::len)
    }

    /// Writes performed since the store was created or last cleared.
    pub async fn operations(&self) -> Vec<StoreOp> {
        self.state.read().await.operations.clone()
    }

    pub async fn clear_operations(&self) {
        self.state.write().await.operations.clear();
    }

    /// Makes every later `operation` on `model` fail with
    /// [`StoreError::Rejected`].
    pub async fn fail_on(&self, operation: StoreOperation, model: &str) {
        self.state
            .write()
            .await
            .failures
            .push((operation, model.to_string()));
    }

    // ── Internals ────────────────────────────────────────────────

    fn identity_of(&self, fields: &FieldMap) -> StoreResult<CorrelationKey> {
        CorrelationKey::from_fields(fields, &self.identity_key)
            .map_err(|e| StoreError::Rejected(e.to_string()))
    }

    fn check(state: &MemoryState, operation: StoreOperation, model: &str) -> StoreResult<()> {
        if state
            .failures
            .iter()
            .any(|(op, m)| *op == operation && m == model)
        {
            return Err(StoreError::Rejected(format!("{operation} on `{model}` is not allowed")));
        }
        Ok(())
    }

    fn log(state: &mut MemoryState, operation: StoreOperation, model: &str, identity: CorrelationKey) {
        debug!("memory store: {} {} {}", operation, model, identity);
        state.operations.push(StoreOp {
            operation,
            model: model.to_string(),
            identity,
        });
    }

    fn insert_fields(
        &self,
        state: &mut MemoryState,
        model: &str,
        mut fields: FieldMap,
    ) -> StoreResult<(FieldMap, CorrelationKey)> {
        if !fields.contains_key(&self.identity_key) {
            state.last_id += 1;
            fields.insert(self.identity_key.clone(), Value::from(state.last_id));
        }
        let identity = self.identity_of(&fields)?;
        if let CorrelationKey::Int(n) = identity {
            state.last_id = state.last_id.max(n);
        }

        let rows = state.models.entry(model.to_string()).or_default();
        if rows
            .iter()
            .any(|row| self.identity_of(row).ok().as_ref() == Some(&identity))
        {
            return Err(StoreError::Rejected(format!(
                "duplicate {} `{identity}` in `{model}`",
                self.identity_key
            )));
        }
        rows.push(fields.clone());
        Ok((fields, identity))
    }

    fn position(&self, state: &MemoryState, model: &str, identity: &CorrelationKey) -> Option<usize> {
        state.models.get(model).and_then(|rows| {
            rows.iter()
                .position(|row| self.identity_of(row).ok().as_ref() == Some(identity))
        })
    }

    fn link_key(&self, parent: &Record, relation: &RelationDescriptor) -> StoreResult<LinkKey> {
        Ok(LinkKey {
            parent_model: parent.model.clone(),
            relation: relation.name.clone(),
            parent: self.identity_of(parent.current_fields())?,
        })
    }

    fn link_members(
        &self,
        state: &mut MemoryState,
        parent: &Record,
        relation: &RelationDescriptor,
        member: &Record,
    ) -> StoreResult<()> {
        let key = self.link_key(parent, relation)?;
        let member = Member {
            model: member.model.clone(),
            identity: self.identity_of(member.current_fields())?,
        };
        let members = state.links.entry(key).or_default();
        if !members.contains(&member) {
            members.push(member);
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSource for MemoryStore {
    fn enumerate(&self, model: &str) -> BoxStream<'_, StoreResult<Record>> {
        let model = model.to_string();
        stream::once(async move { self.records(&model).await })
            .flat_map(|records| stream::iter(records.into_iter().map(Ok)))
            .boxed()
    }

    async fn relation_records(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
    ) -> StoreResult<Vec<Record>> {
        let key = self.link_key(parent, relation)?;
        let state = self.state.read().await;
        Self::check(&state, StoreOperation::Read, &relation.target_model)?;

        let Some(members) = state.links.get(&key) else {
            return Ok(Vec::new());
        };
        let records = members
            .iter()
            .filter_map(|m| {
                let index = self.position(&state, &m.model, &m.identity)?;
                let fields = state.models.get(&m.model)?.get(index)?.clone();
                Some(Record::new(m.model.clone(), fields))
            })
            .collect();
        Ok(records)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, model: &str, fields: FieldMap) -> StoreResult<Record> {
        let mut state = self.state.write().await;
        Self::check(&state, StoreOperation::Create, model)?;
        let (fields, identity) = self.insert_fields(&mut state, model, fields)?;
        Self::log(&mut state, StoreOperation::Create, model, identity);
        Ok(Record::new(model, fields))
    }

    async fn save(&self, record: &Record) -> StoreResult<()> {
        let mut state = self.state.write().await;
        Self::check(&state, StoreOperation::Save, &record.model)?;
        let identity = self.identity_of(record.current_fields())?;
        let index = self
            .position(&state, &record.model, &identity)
            .ok_or_else(|| StoreError::NotFound(format!("{} `{identity}`", record.model)))?;

        if let Some(row) = state.models.get_mut(&record.model).and_then(|rows| rows.get_mut(index)) {
            *row = record.current_fields().clone();
        }
        Self::log(&mut state, StoreOperation::Save, &record.model, identity);
        Ok(())
    }

    async fn destroy(&self, record: &Record) -> StoreResult<()> {
        let mut state = self.state.write().await;
        Self::check(&state, StoreOperation::Destroy, &record.model)?;
        let identity = self.identity_of(record.current_fields())?;
        let index = self
            .position(&state, &record.model, &identity)
            .ok_or_else(|| StoreError::NotFound(format!("{} `{identity}`", record.model)))?;

        if let Some(rows) = state.models.get_mut(&record.model) {
            rows.remove(index);
        }
        let gone = Member {
            model: record.model.clone(),
            identity: identity.clone(),
        };
        state
            .links
            .retain(|key, _| !(key.parent_model == record.model && key.parent == identity));
        for members in state.links.values_mut() {
            members.retain(|m| *m != gone);
        }
        Self::log(&mut state, StoreOperation::Destroy, &record.model, identity);
        Ok(())
    }

    async fn find_by_key(
        &self,
        model: &str,
        key_name: &str,
        value: &Value,
    ) -> StoreResult<Option<Record>> {
        let state = self.state.read().await;
        Self::check(&state, StoreOperation::Read, model)?;
        let found = state
            .models
            .get(model)
            .and_then(|rows| rows.iter().find(|row| row.get(key_name) == Some(value)))
            .map(|fields| Record::new(model, fields.clone()));
        Ok(found)
    }

    async fn create_child(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        fields: FieldMap,
    ) -> StoreResult<Record> {
        let mut state = self.state.write().await;
        let model = relation.target_model.as_str();
        Self::check(&state, StoreOperation::Create, model)?;
        // Resolve the parent first so a bad parent leaves no orphan behind.
        let key = self.link_key(parent, relation)?;

        let (fields, identity) = self.insert_fields(&mut state, model, fields)?;
        state.links.entry(key).or_default().push(Member {
            model: model.to_string(),
            identity: identity.clone(),
        });
        Self::log(&mut state, StoreOperation::Create, model, identity);
        Ok(Record::new(model, fields))
    }

    async fn attach(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        member: &Record,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        Self::check(&state, StoreOperation::Attach, &relation.target_model)?;
        self.link_members(&mut state, parent, relation, member)?;
        let identity = self.identity_of(member.current_fields())?;
        Self::log(&mut state, StoreOperation::Attach, &relation.target_model, identity);
        Ok(())
    }

    async fn detach(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        member: &Record,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        Self::check(&state, StoreOperation::Detach, &relation.target_model)?;
        let key = self.link_key(parent, relation)?;
        let identity = self.identity_of(member.current_fields())?;
        if let Some(members) = state.links.get_mut(&key) {
            members.retain(|m| !(m.model == member.model && m.identity == identity));
        }
        Self::log(&mut state, StoreOperation::Detach, &relation.target_model, identity);
        Ok(())
    }
}
