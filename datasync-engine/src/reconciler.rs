//! The reconciler: drives one reconciliation call over a source and a target.
//!
//! A call matches the top-level collections, creates, updates and destroys
//! target records, then (with `include_relations`) descends one level into
//! each relation of the records it kept. Every store call is awaited in
//! sequence; the first failure aborts the call and leaves earlier writes in
//! place.

use crate::config::ReconcileConfig;
use crate::differ::diff_fields;
use crate::error::{ReconcileError, ReconcileResult, SchemaSide, StoreOperation};
use crate::hooks::FieldChange;
use crate::matcher::match_records;
use crate::report::ReconcileReport;
use crate::store::{collect_all, relation_collections, RecordSource, RecordStore};
use crate::strategy::{MemberContext, Parent, RelationPlan};
use datasync_model::{ModelSchema, Record};
use datasync_types::{ChangeEvent, CorrelationKey, Outcome, OutcomeEntry};
use serde_json::Value;
use tracing::{debug, info, info_span, Instrument};

/// The two sides of a reconciliation call.
#[derive(Clone, Copy)]
pub struct Endpoints<'a> {
    pub source: &'a dyn RecordSource,
    pub source_schema: &'a ModelSchema,
    pub target: &'a dyn RecordStore,
    pub target_schema: &'a ModelSchema,
}

impl<'a> Endpoints<'a> {
    pub fn new(
        source: &'a dyn RecordSource,
        source_schema: &'a ModelSchema,
        target: &'a dyn RecordStore,
        target_schema: &'a ModelSchema,
    ) -> Self {
        Self {
            source,
            source_schema,
            target,
            target_schema,
        }
    }
}

/// A source/target pair kept for relation descent.
struct KeptPair {
    source: Record,
    target: Record,
    key: CorrelationKey,
    is_new: bool,
}

/// Reconciles collections of records according to a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconciles `source_records` into `target_records`.
    ///
    /// The records are the top-level collections of the two schemas' models.
    pub async fn reconcile(
        &self,
        endpoints: Endpoints<'_>,
        source_records: Vec<Record>,
        target_records: Vec<Record>,
    ) -> ReconcileResult<ReconcileReport> {
        let report = ReconcileReport::new(self.config.mode);
        let span = info_span!(
            "reconcile",
            run_id = %report.run_id,
            model = %endpoints.target_schema.name,
            mode = ?self.config.mode
        );
        self.run(endpoints, source_records, target_records, report)
            .instrument(span)
            .await
    }

    /// Reads both top-level collections from their stores and reconciles them.
    pub async fn sync_models(&self, endpoints: Endpoints<'_>) -> ReconcileResult<ReconcileReport> {
        let source_records = collect_all(endpoints.source, &endpoints.source_schema.name).await?;
        let target_records = collect_all(endpoints.target, &endpoints.target_schema.name).await?;
        self.reconcile(endpoints, source_records, target_records).await
    }

    /// Like [`Reconciler::sync_models`], but never writes to the target.
    pub async fn compare_models(
        &self,
        endpoints: Endpoints<'_>,
    ) -> ReconcileResult<ReconcileReport> {
        let compare = Reconciler::new(self.config.compare_only());
        compare.sync_models(endpoints).await
    }

    async fn run(
        &self,
        endpoints: Endpoints<'_>,
        source_records: Vec<Record>,
        target_records: Vec<Record>,
        mut report: ReconcileReport,
    ) -> ReconcileResult<ReconcileReport> {
        let plans = self.resolve_relations(endpoints.source_schema, endpoints.target_schema)?;
        let set = match_records(source_records, target_records, &self.config.pivot_key)?;
        debug!(
            "Matched {} pairs, {} new, {} gone, {} duplicates",
            set.matched.len(),
            set.unmatched_source.len(),
            set.unmatched_target.len(),
            set.duplicates.len()
        );

        let mut kept = Vec::with_capacity(set.unmatched_source.len() + set.matched.len());

        for source in set.unmatched_source {
            let pair = self.create_record(endpoints, source, &mut report).await?;
            kept.push(pair);
        }

        for (source, target) in set.matched {
            let pair = self.update_record(endpoints, source, target, &mut report).await?;
            kept.push(pair);
        }

        for target in &set.unmatched_target {
            self.destroy_record(endpoints, target, &mut report).await?;
        }

        if self.config.include_relations {
            for pair in &kept {
                self.descend(endpoints, &plans, pair, &mut report).await?;
            }
        }

        let counts = report.counts;
        info!(
            "Reconciled {}: {} created, {} updated, {} deleted, {} unchanged, {} linked, {} unlinked, {} skipped",
            endpoints.target_schema.name,
            counts.created,
            counts.updated,
            counts.deleted,
            counts.unchanged,
            counts.linked,
            counts.unlinked,
            counts.skipped
        );
        Ok(report)
    }

    /// Resolves the relations to descend into, checking both schemas before
    /// anything is written.
    fn resolve_relations(
        &self,
        source_schema: &ModelSchema,
        target_schema: &ModelSchema,
    ) -> ReconcileResult<Vec<RelationPlan>> {
        if !self.config.include_relations {
            return Ok(Vec::new());
        }

        let Some(names) = &self.config.relations else {
            return Ok(target_schema
                .matching_relations(source_schema)
                .into_iter()
                .filter_map(|relation| {
                    let source_relation = source_schema.relation(&relation.name)?;
                    let hooks = self.config.hooks.resolve_relation(&relation.singular_name);
                    Some(RelationPlan::new(source_relation, relation, hooks))
                })
                .collect());
        };

        names
            .iter()
            .map(|name| {
                let source_relation =
                    source_schema
                        .relation(name)
                        .ok_or_else(|| ReconcileError::SchemaMismatch {
                            relation: name.clone(),
                            side: SchemaSide::Source,
                            model: source_schema.name.clone(),
                        })?;
                let relation =
                    target_schema
                        .relation(name)
                        .ok_or_else(|| ReconcileError::SchemaMismatch {
                            relation: name.clone(),
                            side: SchemaSide::Target,
                            model: target_schema.name.clone(),
                        })?;
                let hooks = self.config.hooks.resolve_relation(&relation.singular_name);
                Ok(RelationPlan::new(source_relation, relation, hooks))
            })
            .collect()
    }

    async fn create_record(
        &self,
        endpoints: Endpoints<'_>,
        source: Record,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<KeptPair> {
        let config = &self.config;
        let model = endpoints.target_schema.name.as_str();
        let key = source.correlation_key(&config.pivot_key)?;
        let payload = source.extract_fields(&config.id_key, &config.pivot_key);

        let mut target = if config.is_compare_only() {
            Record::unsaved(model, payload)
        } else {
            endpoints
                .target
                .create(model, payload)
                .await
                .map_err(|e| ReconcileError::store(StoreOperation::Create, model, e))?
        };
        debug!("Created {} {}", model, key);

        config.hooks.fire_new_record(&target);
        report.push_event(ChangeEvent::RecordCreated {
            model: model.to_string(),
            key: key.to_value(),
        });

        // The store may have normalised values on the way in.
        self.apply_field_changes(endpoints, &source, &mut target, &key, true, report)
            .await?;
        report.push_outcome(OutcomeEntry::top_level(key.clone(), Outcome::Created));

        Ok(KeptPair {
            source,
            target,
            key,
            is_new: true,
        })
    }

    async fn update_record(
        &self,
        endpoints: Endpoints<'_>,
        source: Record,
        mut target: Record,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<KeptPair> {
        let key = target.correlation_key(&self.config.pivot_key)?;
        let changed = self
            .apply_field_changes(endpoints, &source, &mut target, &key, false, report)
            .await?;

        let outcome = if changed.is_empty() {
            Outcome::Unchanged
        } else {
            Outcome::Updated { fields: changed }
        };
        report.push_outcome(OutcomeEntry::top_level(key.clone(), outcome));

        Ok(KeptPair {
            source,
            target,
            key,
            is_new: false,
        })
    }

    /// Diffs `source` onto `target`, saves it when anything changed and
    /// fires one update notification per changed field.
    async fn apply_field_changes(
        &self,
        endpoints: Endpoints<'_>,
        source: &Record,
        target: &mut Record,
        key: &CorrelationKey,
        is_new_record: bool,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<Vec<String>> {
        let config = &self.config;
        let changed = diff_fields(
            source.current_fields(),
            target,
            &[config.id_key.as_str(), config.pivot_key.as_str()],
        );
        if changed.is_empty() {
            return Ok(changed);
        }

        if target.is_persisted() && !config.is_compare_only() {
            let model = target.model.clone();
            endpoints
                .target
                .save(target)
                .await
                .map_err(|e| ReconcileError::store(StoreOperation::Save, &model, e))?;
        }
        debug!("Updated {} {}: {:?}", target.model, key, changed);

        for field in &changed {
            let old_value = target.previous_field_value(field).unwrap_or(&Value::Null);
            let new_value = target.get_field(field).unwrap_or(&Value::Null);
            config.hooks.fire_update_record(&FieldChange {
                record: &*target,
                field,
                old_value,
                new_value,
                is_new_record,
            });
            report.push_event(ChangeEvent::RecordUpdated {
                model: target.model.clone(),
                key: key.to_value(),
                field: field.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
                is_new_record,
            });
        }
        target.commit();
        Ok(changed)
    }

    async fn destroy_record(
        &self,
        endpoints: Endpoints<'_>,
        target: &Record,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        let key = target.correlation_key(&self.config.pivot_key)?;
        if !self.config.is_compare_only() {
            endpoints
                .target
                .destroy(target)
                .await
                .map_err(|e| ReconcileError::store(StoreOperation::Destroy, &target.model, e))?;
        }
        debug!("Destroyed {} {}", target.model, key);

        self.config.hooks.fire_delete_record(target);
        report.push_event(ChangeEvent::RecordDeleted {
            model: target.model.clone(),
            key: key.to_value(),
        });
        report.push_outcome(OutcomeEntry::top_level(key, Outcome::Deleted));
        Ok(())
    }

    async fn descend(
        &self,
        endpoints: Endpoints<'_>,
        plans: &[RelationPlan],
        pair: &KeptPair,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        for plan in plans {
            let (source_members, target_members) = relation_collections(
                endpoints.source,
                endpoints.target,
                &pair.source,
                &pair.target,
                &plan.source_relation,
                &plan.relation,
            )
            .await?;

            let ctx = MemberContext {
                config: &self.config,
                target: endpoints.target,
                plan,
                parent: Parent {
                    record: &pair.target,
                    key: &pair.key,
                    is_new: pair.is_new,
                    back_reference: &endpoints.target_schema.singular_name,
                },
            };
            plan.strategy
                .reconcile_members(&ctx, source_members, target_members, report)
                .await?;
        }
        Ok(())
    }
}
