//! Record reconciliation engine for DataSync.
//!
//! Makes a target collection of records mirror a source collection. Records
//! are paired by a configurable correlation key (the pivot), then:
//! - source records without a counterpart are created in the target
//! - paired records have their differing fields copied over
//! - target records the source no longer has are destroyed
//!
//! With `include_relations`, the same is done one level down for each
//! relation the two schemas share. Owned relations create, update and
//! destroy their members; linked relations only attach and detach records
//! that already exist in the target.
//!
//! # Architecture
//!
//! - **Matcher**: partitions two collections by correlation key
//! - **Differ**: copies changed fields onto a target record
//! - **Strategy**: reconciles the members of one relation
//! - **Reconciler**: orchestrates a call and dispatches hooks
//! - **Store**: the async traits a backend implements
//!
//! Every change is reported through the optional hooks of a [`HookTable`]
//! and recorded in the returned [`ReconcileReport`]. In compare-only mode the
//! same notifications fire but the target store is never written.
//!
//! # Example
//!
//! ```
//! use datasync_engine::memory::MemoryStore;
//! use datasync_engine::{Endpoints, ReconcileConfig, Reconciler};
//! use datasync_model::ModelSchema;
//! use serde_json::json;
//!
//! tokio_test::block_on(async {
//!     let source = MemoryStore::new();
//!     let target = MemoryStore::new();
//!     source.insert("users", json!({"id": 1, "name": "Ada"})).await.unwrap();
//!
//!     let schema = ModelSchema::new("users");
//!     let reconciler = Reconciler::new(ReconcileConfig::default());
//!     let report = reconciler
//!         .sync_models(Endpoints::new(&source, &schema, &target, &schema))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(report.counts.created, 1);
//!     assert_eq!(target.len("users").await, 1);
//! });
//! ```

mod config;
mod differ;
mod error;
mod hooks;
mod matcher;
pub mod memory;
mod reconciler;
mod report;
mod store;
mod strategy;

pub use config::{
    ReconcileConfig, ReconcileMode, ReconcileOptions, DEFAULT_ID_KEY, DEFAULT_PIVOT_KEY,
};
pub use differ::diff_fields;
pub use error::{
    ReconcileError, ReconcileResult, SchemaSide, StoreError, StoreOperation, StoreResult,
};
pub use hooks::{
    FieldChange, FieldHook, HookTable, RecordHook, RelatedChange, RelatedFieldChange,
    RelatedFieldHook, RelatedHook, RelationHooks, ResolvedRelationHooks,
};
pub use matcher::{match_records, MatchSet};
pub use reconciler::{Endpoints, Reconciler};
pub use report::{OutcomeCounts, ReconcileReport};
pub use store::{collect_all, for_each_record, relation_collections, RecordSource, RecordStore};
pub use strategy::{RelationPlan, RelationStrategy};
