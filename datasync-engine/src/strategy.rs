//! Relation strategies - reconcile the members of one relation of one parent.
//!
//! Owned relations manage their children's full lifecycle. Linked relations
//! only attach and detach records that exist on their own; a linked record
//! is never created and its fields are never compared here.

use crate::config::ReconcileConfig;
use crate::differ::diff_fields;
use crate::error::{ReconcileError, ReconcileResult, StoreError, StoreOperation};
use crate::hooks::{RelatedFieldChange, ResolvedRelationHooks};
use crate::matcher::match_records;
use crate::report::ReconcileReport;
use crate::store::RecordStore;
use datasync_model::{Record, RelationDescriptor, RelationKind};
use datasync_types::{ChangeEvent, CorrelationKey, Outcome, OutcomeEntry};
use serde_json::Value;
use tracing::{debug, warn};

/// How members of a relation are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationStrategy {
    Owned,
    Linked,
}

impl RelationStrategy {
    /// Selects the strategy for a relation descriptor.
    pub fn for_relation(relation: &RelationDescriptor) -> Self {
        match relation.kind {
            RelationKind::Owned => Self::Owned,
            RelationKind::Linked => Self::Linked,
        }
    }
}

/// A relation resolved for one reconciliation call.
#[derive(Debug, Clone)]
pub struct RelationPlan {
    /// The relation as the source schema declares it.
    pub source_relation: RelationDescriptor,
    /// The relation as the target schema declares it.
    pub relation: RelationDescriptor,
    pub strategy: RelationStrategy,
    pub hooks: ResolvedRelationHooks,
}

impl RelationPlan {
    pub fn new(
        source_relation: &RelationDescriptor,
        relation: &RelationDescriptor,
        hooks: ResolvedRelationHooks,
    ) -> Self {
        Self {
            source_relation: source_relation.clone(),
            relation: relation.clone(),
            strategy: RelationStrategy::for_relation(relation),
            hooks,
        }
    }

    fn singular(&self) -> &str {
        &self.relation.singular_name
    }
}

/// The target-side parent whose members are being reconciled.
pub(crate) struct Parent<'a> {
    pub record: &'a Record,
    pub key: &'a CorrelationKey,
    /// True when the parent was created earlier in the same run.
    pub is_new: bool,
    /// Field under which a compare-only child carries its parent.
    pub back_reference: &'a str,
}

/// Everything a strategy needs besides the members themselves.
pub(crate) struct MemberContext<'a> {
    pub config: &'a ReconcileConfig,
    pub target: &'a dyn RecordStore,
    pub plan: &'a RelationPlan,
    pub parent: Parent<'a>,
}

impl MemberContext<'_> {
    fn store_error(&self, operation: StoreOperation, source: StoreError) -> ReconcileError {
        ReconcileError::store(operation, &self.plan.relation.target_model, source)
    }

    fn outcome(&self, key: CorrelationKey, outcome: Outcome) -> OutcomeEntry {
        OutcomeEntry::related(self.plan.singular(), self.parent.key.clone(), key, outcome)
    }

    fn parent_key_value(&self) -> Value {
        self.parent.key.to_value()
    }
}

impl RelationStrategy {
    /// Reconciles one parent's members: new ones first, then matched pairs,
    /// then members the source no longer has.
    pub(crate) async fn reconcile_members(
        self,
        ctx: &MemberContext<'_>,
        source_members: Vec<Record>,
        target_members: Vec<Record>,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        let set = match_records(source_members, target_members, &ctx.config.pivot_key)?;
        debug!(
            "Relation {} of {}: {} new, {} matched, {} gone",
            ctx.plan.relation.name,
            ctx.parent.key,
            set.unmatched_source.len(),
            set.matched.len(),
            set.unmatched_target.len()
        );

        for source in &set.unmatched_source {
            match self {
                Self::Owned => create_owned(ctx, source, report).await?,
                Self::Linked => link_existing(ctx, source, report).await?,
            }
        }

        for (source, target) in set.matched {
            match self {
                Self::Owned => update_owned(ctx, &source, target, report).await?,
                Self::Linked => {
                    let key = target.correlation_key(&ctx.config.pivot_key)?;
                    report.push_outcome(ctx.outcome(key, Outcome::Unchanged));
                }
            }
        }

        for target in &set.unmatched_target {
            match self {
                Self::Owned => destroy_owned(ctx, target, report).await?,
                Self::Linked => unlink(ctx, target, report).await?,
            }
        }

        Ok(())
    }
}

async fn create_owned(
    ctx: &MemberContext<'_>,
    source: &Record,
    report: &mut ReconcileReport,
) -> ReconcileResult<()> {
    let config = ctx.config;
    let key = source.correlation_key(&config.pivot_key)?;
    let mut payload = source.extract_fields(&config.id_key, &config.pivot_key);

    let child = if config.is_compare_only() {
        // No foreign key will be written, so the projection carries its parent.
        let back_reference = ctx.parent.back_reference;
        if payload.contains_key(back_reference) {
            warn!(
                "{} {} already has a `{}` field; not replacing it with its parent",
                ctx.plan.singular(),
                key,
                back_reference
            );
        } else {
            payload.insert(
                back_reference.to_string(),
                Value::Object(ctx.parent.record.current_fields().clone()),
            );
        }
        Record::unsaved(ctx.plan.relation.target_model.clone(), payload)
    } else {
        ctx.target
            .create_child(ctx.parent.record, &ctx.plan.relation, payload)
            .await
            .map_err(|e| ctx.store_error(StoreOperation::Create, e))?
    };
    debug!("Created {} {} under {}", ctx.plan.singular(), key, ctx.parent.key);

    ctx.plan.hooks.fire_new(&child, ctx.parent.record);
    report.push_event(ChangeEvent::RelatedCreated {
        relation: ctx.plan.singular().to_string(),
        parent_key: ctx.parent_key_value(),
        key: key.to_value(),
    });
    report.push_outcome(ctx.outcome(key, Outcome::Created));
    Ok(())
}

async fn update_owned(
    ctx: &MemberContext<'_>,
    source: &Record,
    mut child: Record,
    report: &mut ReconcileReport,
) -> ReconcileResult<()> {
    let config = ctx.config;
    let key = child.correlation_key(&config.pivot_key)?;
    let changed = diff_fields(
        source.current_fields(),
        &mut child,
        &[config.id_key.as_str(), config.pivot_key.as_str()],
    );

    if changed.is_empty() {
        report.push_outcome(ctx.outcome(key, Outcome::Unchanged));
        return Ok(());
    }

    if !config.is_compare_only() {
        ctx.target
            .save(&child)
            .await
            .map_err(|e| ctx.store_error(StoreOperation::Save, e))?;
    }
    debug!("Updated {} {}: {:?}", ctx.plan.singular(), key, changed);

    for field in &changed {
        let old_value = child.previous_field_value(field).unwrap_or(&Value::Null);
        let new_value = child.get_field(field).unwrap_or(&Value::Null);
        ctx.plan.hooks.fire_updated(&RelatedFieldChange {
            record: &child,
            field,
            old_value,
            new_value,
            parent: ctx.parent.record,
            parent_is_new: ctx.parent.is_new,
            relation: ctx.plan.singular(),
        });
        report.push_event(ChangeEvent::RelatedUpdated {
            relation: ctx.plan.singular().to_string(),
            parent_key: ctx.parent_key_value(),
            key: key.to_value(),
            field: field.clone(),
            old_value: old_value.clone(),
            new_value: new_value.clone(),
            parent_is_new: ctx.parent.is_new,
        });
    }
    child.commit();

    report.push_outcome(ctx.outcome(key, Outcome::Updated { fields: changed }));
    Ok(())
}

async fn destroy_owned(
    ctx: &MemberContext<'_>,
    child: &Record,
    report: &mut ReconcileReport,
) -> ReconcileResult<()> {
    let key = child.correlation_key(&ctx.config.pivot_key)?;
    if !ctx.config.is_compare_only() {
        ctx.target
            .destroy(child)
            .await
            .map_err(|e| ctx.store_error(StoreOperation::Destroy, e))?;
    }
    debug!("Destroyed {} {} under {}", ctx.plan.singular(), key, ctx.parent.key);

    ctx.plan.hooks.fire_delete(child, ctx.parent.record);
    report.push_event(ChangeEvent::RelatedDeleted {
        relation: ctx.plan.singular().to_string(),
        parent_key: ctx.parent_key_value(),
        key: key.to_value(),
    });
    report.push_outcome(ctx.outcome(key, Outcome::Deleted));
    Ok(())
}

async fn link_existing(
    ctx: &MemberContext<'_>,
    source: &Record,
    report: &mut ReconcileReport,
) -> ReconcileResult<()> {
    let config = ctx.config;
    let key = source.correlation_key(&config.pivot_key)?;

    let found = match ctx
        .target
        .find_by_key(&ctx.plan.relation.target_model, &config.pivot_key, &key.to_value())
        .await
    {
        Ok(found) => found,
        Err(StoreError::NotFound(_)) => None,
        Err(e) => return Err(ctx.store_error(StoreOperation::Read, e)),
    };

    let Some(existing) = found else {
        warn!(
            "No {} {} in `{}`; nothing to link",
            ctx.plan.singular(),
            key,
            ctx.plan.relation.target_model
        );
        report.push_outcome(ctx.outcome(key, Outcome::Skipped));
        return Ok(());
    };

    if !config.is_compare_only() {
        ctx.target
            .attach(ctx.parent.record, &ctx.plan.relation, &existing)
            .await
            .map_err(|e| ctx.store_error(StoreOperation::Attach, e))?;
    }
    debug!("Linked {} {} to {}", ctx.plan.singular(), key, ctx.parent.key);

    ctx.plan.hooks.fire_new(&existing, ctx.parent.record);
    report.push_event(ChangeEvent::Linked {
        relation: ctx.plan.singular().to_string(),
        parent_key: ctx.parent_key_value(),
        key: key.to_value(),
    });
    report.push_outcome(ctx.outcome(key, Outcome::Linked));
    Ok(())
}

async fn unlink(
    ctx: &MemberContext<'_>,
    member: &Record,
    report: &mut ReconcileReport,
) -> ReconcileResult<()> {
    let key = member.correlation_key(&ctx.config.pivot_key)?;
    if !ctx.config.is_compare_only() {
        ctx.target
            .detach(ctx.parent.record, &ctx.plan.relation, member)
            .await
            .map_err(|e| ctx.store_error(StoreOperation::Detach, e))?;
    }
    debug!("Unlinked {} {} from {}", ctx.plan.singular(), key, ctx.parent.key);

    ctx.plan.hooks.fire_delete(member, ctx.parent.record);
    report.push_event(ChangeEvent::Unlinked {
        relation: ctx.plan.singular().to_string(),
        parent_key: ctx.parent_key_value(),
        key: key.to_value(),
    });
    report.push_outcome(ctx.outcome(key, Outcome::Unlinked));
    Ok(())
}
