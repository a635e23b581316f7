//! Change events emitted during reconciliation.
//!
//! One event is recorded for every notification the engine dispatches, in
//! dispatch order, whether or not a hook is registered for it. Comparing two
//! event logs is how callers check that a compare-only run predicts exactly
//! what an applying run would do.
//!
//! Keys are the correlation key values of the records involved, not their
//! storage identities, so logs from different stores stay comparable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum ChangeEvent {
    /// A top-level record was created in the target.
    RecordCreated {
        /// The target model name.
        model: String,
        key: Value,
    },

    /// A field of a top-level record changed.
    RecordUpdated {
        model: String,
        key: Value,
        field: String,
        old_value: Value,
        new_value: Value,
        /// True when the record was created earlier in the same run.
        is_new_record: bool,
    },

    /// A top-level record was removed from the target.
    RecordDeleted { model: String, key: Value },

    // ── Owned relations ─────────────────────────────────────────

    /// A child record was created under its parent.
    RelatedCreated {
        /// Singular relation name.
        relation: String,
        parent_key: Value,
        key: Value,
    },

    /// A field of an owned child changed.
    RelatedUpdated {
        relation: String,
        parent_key: Value,
        key: Value,
        field: String,
        old_value: Value,
        new_value: Value,
        /// True when the parent was created earlier in the same run.
        parent_is_new: bool,
    },

    /// A child record was destroyed.
    RelatedDeleted {
        relation: String,
        parent_key: Value,
        key: Value,
    },

    // ── Linked relations ────────────────────────────────────────

    /// An existing record was attached to the parent.
    Linked {
        relation: String,
        parent_key: Value,
        key: Value,
    },

    /// A record was detached from the parent. The record itself survives.
    Unlinked {
        relation: String,
        parent_key: Value,
        key: Value,
    },
}

impl ChangeEvent {
    /// Returns the relation name for relation-level events.
    #[must_use]
    pub fn relation(&self) -> Option<&str> {
        match self {
            Self::RelatedCreated { relation, .. }
            | Self::RelatedUpdated { relation, .. }
            | Self::RelatedDeleted { relation, .. }
            | Self::Linked { relation, .. }
            | Self::Unlinked { relation, .. } => Some(relation),
            Self::RecordCreated { .. } | Self::RecordUpdated { .. } | Self::RecordDeleted { .. } => {
                None
            }
        }
    }

    /// Returns the correlation key of the record the event is about.
    #[must_use]
    pub fn key(&self) -> &Value {
        match self {
            Self::RecordCreated { key, .. }
            | Self::RecordUpdated { key, .. }
            | Self::RecordDeleted { key, .. }
            | Self::RelatedCreated { key, .. }
            | Self::RelatedUpdated { key, .. }
            | Self::RelatedDeleted { key, .. }
            | Self::Linked { key, .. }
            | Self::Unlinked { key, .. } => key,
        }
    }

    /// Returns true for field-level update events.
    #[must_use]
    pub fn is_update(&self) -> bool {
        matches!(self, Self::RecordUpdated { .. } | Self::RelatedUpdated { .. })
    }
}
