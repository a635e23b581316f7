//! Change notification hooks.
//!
//! Every slot is optional and a no-op when unset. Relation hooks come in two
//! layers: a generic slot per event (`on_new_related_data`, ...) and
//! specialized bundles registered under a singular relation name. Each
//! relation resolves its bundle once, when the reconciler is built: for each
//! slot the specialized hook wins and the generic one is the fallback, so
//! exactly one of them fires for any event.

use datasync_model::Record;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A changed field on a top-level record.
#[derive(Debug)]
pub struct FieldChange<'a> {
    pub record: &'a Record,
    pub field: &'a str,
    pub old_value: &'a Value,
    pub new_value: &'a Value,
    /// True when the record was created earlier in the same run.
    pub is_new_record: bool,
}

/// A relation member that was created, linked, destroyed or unlinked.
#[derive(Debug)]
pub struct RelatedChange<'a> {
    pub record: &'a Record,
    pub parent: &'a Record,
    /// Singular relation name.
    pub relation: &'a str,
}

/// A changed field on an owned relation member.
#[derive(Debug)]
pub struct RelatedFieldChange<'a> {
    pub record: &'a Record,
    pub field: &'a str,
    pub old_value: &'a Value,
    pub new_value: &'a Value,
    pub parent: &'a Record,
    /// True when the parent was created earlier in the same run.
    pub parent_is_new: bool,
    pub relation: &'a str,
}

pub type RecordHook = Arc<dyn Fn(&Record) + Send + Sync>;
pub type FieldHook = Arc<dyn Fn(&FieldChange<'_>) + Send + Sync>;
pub type RelatedHook = Arc<dyn Fn(&RelatedChange<'_>) + Send + Sync>;
pub type RelatedFieldHook = Arc<dyn Fn(&RelatedFieldChange<'_>) + Send + Sync>;

/// Hooks for one specific relation.
#[derive(Clone, Default)]
pub struct RelationHooks {
    on_new: Option<RelatedHook>,
    on_updated: Option<RelatedFieldHook>,
    on_delete: Option<RelatedHook>,
}

impl RelationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires when a member is created (owned) or linked (linked).
    pub fn on_new(mut self, f: impl Fn(&RelatedChange<'_>) + Send + Sync + 'static) -> Self {
        self.on_new = Some(Arc::new(f));
        self
    }

    /// Fires once per changed field of an owned member.
    pub fn on_updated(
        mut self,
        f: impl Fn(&RelatedFieldChange<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_updated = Some(Arc::new(f));
        self
    }

    /// Fires when a member is destroyed (owned) or unlinked (linked).
    pub fn on_delete(mut self, f: impl Fn(&RelatedChange<'_>) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for RelationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationHooks")
            .field("on_new", &self.on_new.is_some())
            .field("on_updated", &self.on_updated.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .finish()
    }
}

/// The full set of hooks a caller can register.
#[derive(Clone, Default)]
pub struct HookTable {
    on_new_record: Option<RecordHook>,
    on_update_record: Option<FieldHook>,
    on_delete_record: Option<RecordHook>,
    on_new_related_data: Option<RelatedHook>,
    on_update_related_data: Option<RelatedFieldHook>,
    on_delete_related_data: Option<RelatedHook>,
    relations: HashMap<String, RelationHooks>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_new_record(mut self, f: impl Fn(&Record) + Send + Sync + 'static) -> Self {
        self.on_new_record = Some(Arc::new(f));
        self
    }

    pub fn on_update_record(mut self, f: impl Fn(&FieldChange<'_>) + Send + Sync + 'static) -> Self {
        self.on_update_record = Some(Arc::new(f));
        self
    }

    pub fn on_delete_record(mut self, f: impl Fn(&Record) + Send + Sync + 'static) -> Self {
        self.on_delete_record = Some(Arc::new(f));
        self
    }

    pub fn on_new_related_data(
        mut self,
        f: impl Fn(&RelatedChange<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_new_related_data = Some(Arc::new(f));
        self
    }

    pub fn on_update_related_data(
        mut self,
        f: impl Fn(&RelatedFieldChange<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_update_related_data = Some(Arc::new(f));
        self
    }

    pub fn on_delete_related_data(
        mut self,
        f: impl Fn(&RelatedChange<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_delete_related_data = Some(Arc::new(f));
        self
    }

    /// Registers hooks for the relation with the given singular name.
    /// Replaces any bundle registered earlier under the same name.
    pub fn relation(mut self, singular_name: impl Into<String>, hooks: RelationHooks) -> Self {
        self.relations.insert(singular_name.into(), hooks);
        self
    }

    /// Resolves the hooks a relation dispatches to.
    pub fn resolve_relation(&self, singular_name: &str) -> ResolvedRelationHooks {
        let specialized = self.relations.get(singular_name);

        ResolvedRelationHooks {
            relation: singular_name.to_string(),
            on_new: pick(
                specialized.and_then(|h| h.on_new.as_ref()),
                self.on_new_related_data.as_ref(),
            ),
            on_updated: pick(
                specialized.and_then(|h| h.on_updated.as_ref()),
                self.on_update_related_data.as_ref(),
            ),
            on_delete: pick(
                specialized.and_then(|h| h.on_delete.as_ref()),
                self.on_delete_related_data.as_ref(),
            ),
        }
    }

    pub(crate) fn fire_new_record(&self, record: &Record) {
        if let Some(hook) = &self.on_new_record {
            hook(record);
        }
    }

    pub(crate) fn fire_update_record(&self, change: &FieldChange<'_>) {
        if let Some(hook) = &self.on_update_record {
            hook(change);
        }
    }

    pub(crate) fn fire_delete_record(&self, record: &Record) {
        if let Some(hook) = &self.on_delete_record {
            hook(record);
        }
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTable")
            .field("on_new_record", &self.on_new_record.is_some())
            .field("on_update_record", &self.on_update_record.is_some())
            .field("on_delete_record", &self.on_delete_record.is_some())
            .field("on_new_related_data", &self.on_new_related_data.is_some())
            .field("on_update_related_data", &self.on_update_related_data.is_some())
            .field("on_delete_related_data", &self.on_delete_related_data.is_some())
            .field("relations", &self.relations)
            .finish()
    }
}

fn pick<T: Clone>(specialized: Option<&T>, generic: Option<&T>) -> Option<T> {
    specialized.or(generic).cloned()
}

/// The hooks one relation dispatches to, after specialized/generic fallback.
#[derive(Clone)]
pub struct ResolvedRelationHooks {
    relation: String,
    on_new: Option<RelatedHook>,
    on_updated: Option<RelatedFieldHook>,
    on_delete: Option<RelatedHook>,
}

impl ResolvedRelationHooks {
    /// Singular name of the relation these hooks belong to.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn has_on_new(&self) -> bool {
        self.on_new.is_some()
    }

    pub fn has_on_updated(&self) -> bool {
        self.on_updated.is_some()
    }

    pub fn has_on_delete(&self) -> bool {
        self.on_delete.is_some()
    }

    pub(crate) fn fire_new(&self, record: &Record, parent: &Record) {
        if let Some(hook) = &self.on_new {
            hook(&RelatedChange {
                record,
                parent,
                relation: &self.relation,
            });
        }
    }

    pub(crate) fn fire_updated(&self, change: &RelatedFieldChange<'_>) {
        if let Some(hook) = &self.on_updated {
            hook(change);
        }
    }

    pub(crate) fn fire_delete(&self, record: &Record, parent: &Record) {
        if let Some(hook) = &self.on_delete {
            hook(&RelatedChange {
                record,
                parent,
                relation: &self.relation,
            });
        }
    }
}

impl fmt::Debug for ResolvedRelationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedRelationHooks")
            .field("relation", &self.relation)
            .field("on_new", &self.on_new.is_some())
            .field("on_updated", &self.on_updated.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record() -> Record {
        Record::new("tags", serde_json::Map::new())
    }

    #[test]
    fn specialized_hook_wins_over_generic() {
        let generic = Arc::new(AtomicUsize::new(0));
        let specialized = Arc::new(AtomicUsize::new(0));
        let (g, s) = (generic.clone(), specialized.clone());

        let table = HookTable::new()
            .on_new_related_data(move |_| {
                g.fetch_add(1, Ordering::SeqCst);
            })
            .relation(
                "tag",
                RelationHooks::new().on_new(move |_| {
                    s.fetch_add(1, Ordering::SeqCst);
                }),
            );

        let resolved = table.resolve_relation("tag");
        resolved.fire_new(&record(), &record());

        assert_eq!(specialized.load(Ordering::SeqCst), 1);
        assert_eq!(generic.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn generic_hook_is_the_fallback_per_slot() {
        let generic = Arc::new(AtomicUsize::new(0));
        let g = generic.clone();

        // Specialized bundle only covers on_new; on_delete falls back.
        let table = HookTable::new()
            .on_delete_related_data(move |_| {
                g.fetch_add(1, Ordering::SeqCst);
            })
            .relation("tag", RelationHooks::new().on_new(|_| {}));

        let resolved = table.resolve_relation("tag");
        assert!(resolved.has_on_new());
        assert!(resolved.has_on_delete());
        assert!(!resolved.has_on_updated());

        resolved.fire_delete(&record(), &record());
        assert_eq!(generic.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_relation_uses_generic_hooks_only() {
        let table = HookTable::new().on_new_related_data(|_| {});
        let resolved = table.resolve_relation("address");
        assert_eq!(resolved.relation(), "address");
        assert!(resolved.has_on_new());
        assert!(!resolved.has_on_delete());
    }

    #[test]
    fn unset_hooks_are_noops() {
        let table = HookTable::new();
        table.fire_new_record(&record());
        table.fire_delete_record(&record());
        table.resolve_relation("tag").fire_new(&record(), &record());
    }

    #[test]
    fn debug_lists_registered_slots() {
        let table = HookTable::new().on_new_record(|_| {});
        let debug = format!("{table:?}");
        assert!(debug.contains("on_new_record: true"));
        assert!(debug.contains("on_delete_record: false"));
    }
}
