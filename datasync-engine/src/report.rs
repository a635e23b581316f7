//! Reconciliation report.
//!
//! Collects the notifications and per-record outcomes of one run. The event
//! log is recorded whether or not hooks are registered, so an applying run
//! and a compare-only run over the same inputs can be compared directly.

use crate::config::ReconcileMode;
use datasync_types::{ChangeEvent, Outcome, OutcomeEntry, RunId};
use serde::{Deserialize, Serialize};

/// Counts of outcomes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub linked: usize,
    pub unlinked: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated { .. } => self.updated += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Linked => self.linked += 1,
            Outcome::Unlinked => self.unlinked += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    /// Number of outcomes that changed the target.
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted + self.linked + self.unlinked
    }
}

/// The result of one reconciliation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub run_id: RunId,
    pub mode: ReconcileMode,
    /// Notifications in dispatch order.
    pub events: Vec<ChangeEvent>,
    /// One entry per compared record.
    pub outcomes: Vec<OutcomeEntry>,
    pub counts: OutcomeCounts,
}

impl ReconcileReport {
    /// Creates an empty report for a new run.
    pub fn new(mode: ReconcileMode) -> Self {
        Self {
            run_id: RunId::new(),
            mode,
            events: Vec::new(),
            outcomes: Vec::new(),
            counts: OutcomeCounts::default(),
        }
    }

    pub(crate) fn push_event(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }

    pub(crate) fn push_outcome(&mut self, entry: OutcomeEntry) {
        self.counts.record(&entry.outcome);
        self.outcomes.push(entry);
    }

    /// Returns true if the run changed (or, compare-only, would change) the
    /// target.
    pub fn has_changes(&self) -> bool {
        self.counts.changes() > 0
    }

    /// Outcomes for top-level records only.
    pub fn top_level(&self) -> impl Iterator<Item = &OutcomeEntry> {
        self.outcomes.iter().filter(|e| e.relation.is_none())
    }

    /// Outcomes for members of one relation, by singular name.
    pub fn for_relation<'a>(&'a self, relation: &'a str) -> impl Iterator<Item = &'a OutcomeEntry> {
        self.outcomes
            .iter()
            .filter(move |e| e.relation.as_deref() == Some(relation))
    }
}
