//! Schema-guided mapping of extracted JSON into raw field maps.
//!
//! Mapping never rejects: any field-level shape mismatch degrades to an
//! empty or zero-confidence value, because partial structured data is
//! more useful downstream than a hard failure for one malformed field.
//! Confidences leave this module unclamped; normalization finalizes them.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use snapattr_core::{FieldKind, FieldSchema, FieldValue, ListItem};

/// Default confidence for a bare (unstructured) list item. Distinct from
/// the 0.0 "no signal" default: some value was present, just unlabeled.
pub const BARE_ITEM_CONFIDENCE: f64 = 0.5;

/// Raw mapper output: fields and scalar confidences in schema order.
/// List-field confidences are derived later from their items.
#[derive(Debug, Default)]
pub struct MappedFields {
    pub fields: IndexMap<String, FieldValue>,
    pub confidences: IndexMap<String, f64>,
    pub notes: String,
}

/// Walk the schema in declaration order and map matching JSON fields.
///
/// Schema fields absent from `data` are omitted entirely: a missing
/// field is evidence of nothing, not evidence of absence.
pub fn map_fields(data: &Map<String, Value>, schema: &FieldSchema) -> MappedFields {
    let mut mapped = MappedFields::default();

    for (name, kind) in schema.iter() {
        match kind {
            FieldKind::Scalar => {
                if let Some(raw) = data.get(name) {
                    let (value, confidence) = scalar_parts(raw);
                    mapped.fields.insert(name.to_string(), FieldValue::Scalar(value));
                    mapped.confidences.insert(name.to_string(), confidence);
                }
            }
            FieldKind::List => {
                if let Some(raw) = data.get(name) {
                    mapped
                        .fields
                        .insert(name.to_string(), FieldValue::Items(list_items(raw)));
                }
            }
            FieldKind::Freeform => {
                // Freeform text always comes from the root `notes` key.
                if let Some(raw) = data.get("notes") {
                    mapped.notes = coerce_string(raw);
                }
            }
        }
    }

    mapped
}

/// Unwrap a scalar field: a `{value, confidence}` envelope yields both
/// parts; any other shape is taken whole with no confidence signal.
fn scalar_parts(raw: &Value) -> (Value, f64) {
    match raw {
        Value::Object(obj) if obj.contains_key("value") => {
            let value = obj.get("value").cloned().unwrap_or(Value::Null);
            let confidence = obj
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            (value, confidence)
        }
        other => (other.clone(), 0.0),
    }
}

/// Map a list field's JSON value. Non-list shapes degrade to an empty
/// list.
fn list_items(raw: &Value) -> Vec<ListItem> {
    let Value::Array(elements) = raw else {
        return Vec::new();
    };
    elements.iter().map(list_item).collect()
}

fn list_item(element: &Value) -> ListItem {
    match element {
        Value::Object(obj) => {
            // The `name` sub-key follows the same value/default rule as
            // scalar extraction.
            let (name_value, _) = scalar_parts(obj.get("name").unwrap_or(&Value::Null));
            let confidence = obj
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            ListItem {
                name: coerce_string(&name_value),
                confidence,
            }
        }
        bare => ListItem {
            name: coerce_string(bare),
            confidence: BARE_ITEM_CONFIDENCE,
        },
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
