//! Per-record reconciliation outcomes.

use crate::CorrelationKey;
use serde::{Deserialize, Serialize};

/// What happened to one compared record during a run.
///
/// Each record reaches exactly one outcome per run. Members of a linked
/// relation only ever reach `Linked`, `Unlinked`, `Unchanged` or `Skipped`:
/// their fields belong to the linked model, not to the relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated { fields: Vec<String> },
    Deleted,
    Unchanged,
    Linked,
    Unlinked,
    /// A linked source member with no existing target record.
    Skipped,
}

impl Outcome {
    /// Returns true if the outcome changed the target.
    #[must_use]
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged | Self::Skipped)
    }
}

/// An outcome tagged with the record it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEntry {
    /// Singular relation name, or `None` for top-level records.
    pub relation: Option<String>,
    /// Correlation key of the parent, for relation members.
    pub parent_key: Option<CorrelationKey>,
    pub key: CorrelationKey,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl OutcomeEntry {
    /// Creates an entry for a top-level record.
    #[must_use]
    pub fn top_level(key: CorrelationKey, outcome: Outcome) -> Self {
        Self {
            relation: None,
            parent_key: None,
            key,
            outcome,
        }
    }

    /// Creates an entry for a relation member.
    #[must_use]
    pub fn related(
        relation: impl Into<String>,
        parent_key: CorrelationKey,
        key: CorrelationKey,
        outcome: Outcome,
    ) -> Self {
        Self {
            relation: Some(relation.into()),
            parent_key: Some(parent_key),
            key,
            outcome,
        }
    }
}
