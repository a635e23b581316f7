//! Reconciliation configuration.
//!
//! Callers describe what they want with [`ReconcileOptions`], where every
//! field is optional, and merge it over the documented defaults with
//! [`ReconcileConfig::from_options`]. The resulting config is immutable for
//! the lifetime of the [`crate::Reconciler`] that owns it.

use crate::hooks::HookTable;
use serde::{Deserialize, Serialize};

/// Default name of the correlation (pivot) field.
pub const DEFAULT_PIVOT_KEY: &str = "id";

/// Default name of the target's identity field.
pub const DEFAULT_ID_KEY: &str = "id";

/// Whether a run writes to the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Create, update, delete, attach and detach in the target store.
    #[default]
    Apply,
    /// Fire the same notifications without touching the target store.
    CompareOnly,
}

impl ReconcileMode {
    pub fn is_compare_only(self) -> bool {
        self == Self::CompareOnly
    }
}

/// Configuration for one reconciler.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub mode: ReconcileMode,
    /// Field that pairs source records with target records.
    pub pivot_key: String,
    /// Field holding the target store's own identity. Never copied from a
    /// source record into a create payload.
    pub id_key: String,
    /// Whether to descend into relations of matched and created records.
    pub include_relations: bool,
    /// Relations to descend into. `None` means every relation declared on
    /// both schemas.
    pub relations: Option<Vec<String>>,
    pub hooks: HookTable,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            mode: ReconcileMode::Apply,
            pivot_key: DEFAULT_PIVOT_KEY.to_string(),
            id_key: DEFAULT_ID_KEY.to_string(),
            include_relations: false,
            relations: None,
            hooks: HookTable::default(),
        }
    }
}

impl ReconcileConfig {
    /// Merges caller options over the defaults.
    pub fn from_options(options: ReconcileOptions) -> Self {
        let defaults = Self::default();
        let mode = match options.compare_only {
            Some(true) => ReconcileMode::CompareOnly,
            Some(false) => ReconcileMode::Apply,
            None => defaults.mode,
        };

        Self {
            mode,
            pivot_key: options.pivot_key.unwrap_or(defaults.pivot_key),
            id_key: options.id_key.unwrap_or(defaults.id_key),
            include_relations: options.include_relations.unwrap_or(defaults.include_relations),
            relations: options.relations.or(defaults.relations),
            hooks: defaults.hooks,
        }
    }

    /// Attaches the hook table.
    pub fn with_hooks(mut self, hooks: HookTable) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns a copy of this config that never writes to the target.
    pub fn compare_only(&self) -> Self {
        Self {
            mode: ReconcileMode::CompareOnly,
            ..self.clone()
        }
    }

    pub fn is_compare_only(&self) -> bool {
        self.mode.is_compare_only()
    }
}

/// Caller-supplied options. Unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReconcileOptions {
    #[serde(default)]
    pub include_relations: Option<bool>,
    #[serde(default)]
    pub compare_only: Option<bool>,
    #[serde(default, alias = "pivotKeyName")]
    pub pivot_key: Option<String>,
    #[serde(default, alias = "identityKeyName")]
    pub id_key: Option<String>,
    #[serde(default)]
    pub relations: Option<Vec<String>>,
}

impl ReconcileOptions {
    /// Parses options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
