use datasync_types::{CorrelationKey, FieldMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single row handed out by a record store.
///
/// The `fields` map holds arbitrary JSON in the order the store produced it.
/// While an update is in flight, `previous` remembers each touched field's
/// value from before the first change, so change notifications can report
/// both sides. [`Record::commit`] ends the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub model: String,
    fields: FieldMap,
    #[serde(default, skip_serializing_if = "FieldMap::is_empty")]
    previous: FieldMap,
    #[serde(default = "persisted_by_default")]
    persisted: bool,
}

fn persisted_by_default() -> bool {
    true
}

impl Record {
    /// Wraps fields read from a store.
    pub fn new(model: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            model: model.into(),
            fields,
            previous: FieldMap::new(),
            persisted: true,
        }
    }

    /// Builds a record that exists only in memory and was never written.
    pub fn unsaved(model: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            persisted: false,
            ..Self::new(model, fields)
        }
    }

    /// Parses a record from a JSON object.
    pub fn from_value(model: impl Into<String>, value: Value) -> datasync_types::Result<Self> {
        let fields: FieldMap = serde_json::from_value(value)?;
        Ok(Self::new(model, fields))
    }

    /// Whether the record has been written to its store.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Current value of a field.
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Extract a string value from a field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }

    /// Extract a numeric value from a field.
    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|v| v.as_f64())
    }

    /// Extract a boolean value from a field.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(|v| v.as_bool())
    }

    /// Snapshot of all current field values.
    pub fn current_fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Value a field had before the in-flight update touched it.
    ///
    /// Fields the update has not touched report their current value. A field
    /// that did not exist before the update reports `Value::Null`.
    pub fn previous_field_value(&self, name: &str) -> Option<&Value> {
        self.previous.get(name).or_else(|| self.fields.get(name))
    }

    /// Sets a field, remembering the value it replaces.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if !self.previous.contains_key(&name) {
            let old = self.fields.get(&name).cloned().unwrap_or(Value::Null);
            self.previous.insert(name.clone(), old);
        }
        self.fields.insert(name, value);
    }

    /// Names of fields whose value differs from before the in-flight update,
    /// in the order they were first touched.
    pub fn changed_fields(&self) -> Vec<&str> {
        self.previous
            .iter()
            .filter(|(name, old)| self.fields.get(name.as_str()).unwrap_or(&Value::Null) != *old)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Returns true if the in-flight update changed anything.
    pub fn has_changes(&self) -> bool {
        !self.changed_fields().is_empty()
    }

    /// Ends the in-flight update. Previous values are forgotten.
    pub fn commit(&mut self) {
        self.previous.clear();
    }

    /// Reads the correlation key stored in `pivot_key`.
    pub fn correlation_key(&self, pivot_key: &str) -> datasync_types::Result<CorrelationKey> {
        CorrelationKey::from_fields(&self.fields, pivot_key)
    }

    /// Projects the record into a create payload.
    ///
    /// The identity field is left out so a source-side storage id never lands
    /// in the target, unless it is also the pivot field: a created record
    /// must keep its correlation key or it could never be matched again.
    pub fn extract_fields(&self, id_key: &str, pivot_key: &str) -> FieldMap {
        self.fields
            .iter()
            .filter(|(name, _)| name.as_str() != id_key || id_key == pivot_key)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}
