//! Set matching: pairs source records with target records by correlation key.

use datasync_model::Record;
use datasync_types::CorrelationKey;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// The partition of two collections produced by [`match_records`].
#[derive(Debug, Default)]
pub struct MatchSet {
    /// Source/target pairs sharing a key, in source order.
    pub matched: Vec<(Record, Record)>,
    /// Source records with no target counterpart, in source order.
    pub unmatched_source: Vec<Record>,
    /// Target records no source record claimed, in target order.
    pub unmatched_target: Vec<Record>,
    /// Records whose key repeats an earlier record of the same collection.
    /// They are neither matched nor deleted.
    pub duplicates: Vec<Record>,
}

impl MatchSet {
    /// Returns true if the target already mirrors the source at this level.
    pub fn is_aligned(&self) -> bool {
        self.unmatched_source.is_empty() && self.unmatched_target.is_empty()
    }
}

/// Partitions `source` and `target` by the value of `pivot_key`.
///
/// One pass over each collection. When a key repeats within a collection the
/// first occurrence wins and later ones are set aside in
/// [`MatchSet::duplicates`].
pub fn match_records(
    source: Vec<Record>,
    target: Vec<Record>,
    pivot_key: &str,
) -> datasync_types::Result<MatchSet> {
    let mut set = MatchSet::default();

    let mut target_slots: Vec<Option<Record>> = Vec::with_capacity(target.len());
    let mut lookup: HashMap<CorrelationKey, usize> = HashMap::with_capacity(target.len());
    for record in target {
        let key = record.correlation_key(pivot_key)?;
        if lookup.contains_key(&key) {
            warn!("Duplicate {} `{}` in target `{}`; left untouched", pivot_key, key, record.model);
            set.duplicates.push(record);
            continue;
        }
        lookup.insert(key, target_slots.len());
        target_slots.push(Some(record));
    }

    let mut seen: HashSet<CorrelationKey> = HashSet::new();
    for record in source {
        let key = record.correlation_key(pivot_key)?;
        if !seen.insert(key.clone()) {
            warn!("Duplicate {} `{}` in source `{}`; skipped", pivot_key, key, record.model);
            set.duplicates.push(record);
            continue;
        }
        match lookup.get(&key).and_then(|&i| target_slots[i].take()) {
            Some(target) => set.matched.push((record, target)),
            None => set.unmatched_source.push(record),
        }
    }

    set.unmatched_target = target_slots.into_iter().flatten().collect();
    Ok(set)
}
