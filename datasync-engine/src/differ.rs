//! Field-level diffing of a source payload against a target record.

use datasync_model::Record;
use datasync_types::FieldMap;
use serde_json::Value;

/// Copies every differing field of `source` onto `target` and returns the
/// names of the fields that changed, in payload order.
///
/// Values compare by JSON equality. A field the target lacks compares as
/// `null`. Fields named in `excluded` are never compared or copied.
pub fn diff_fields(source: &FieldMap, target: &mut Record, excluded: &[&str]) -> Vec<String> {
    let mut changed = Vec::new();
    for (name, value) in source {
        if excluded.contains(&name.as_str()) {
            continue;
        }
        let current = target.get_field(name).unwrap_or(&Value::Null);
        if current != value {
            target.set_field(name.clone(), value.clone());
            changed.push(name.clone());
        }
    }
    changed
}
