//! Layer merge logic
//!
//! Merge semantics:
//! - Groups: merged per declared option (recursive)
//! - Tables: deep-merged by key
//! - Lists: REPLACE (last wins)
//! - Scalars: override (last wins)
//!
//! Layers sharing a peer tier must not disagree; that is checked by
//! [`find_conflict`] before they are overlaid.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::config::layer::LayerOrigin;
use crate::config::schema::{join_path, OptionSchema, Shape};

/// Deep merge two JSON values.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays and scalars: overlay wins
        (_, overlay) => overlay,
    }
}

/// Overlay validated layer values onto `base`, recording which origin supplied
/// each leaf in `provenance`.
pub(crate) fn overlay_options(
    schema: &OptionSchema,
    base: &mut Map<String, Value>,
    overlay: Map<String, Value>,
    prefix: &str,
    origin: &LayerOrigin,
    provenance: &mut BTreeMap<String, LayerOrigin>,
) {
    for (key, value) in overlay {
        let path = join_path(prefix, &key);
        let shape = schema.get(&key).map(|spec| spec.shape());

        match (shape, value) {
            (Some(Shape::Group(members)), Value::Object(inner)) => {
                let slot = base
                    .entry(key)
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(group) = slot {
                    overlay_options(members, group, inner, &path, origin, provenance);
                }
            }
            (Some(shape), value) if shape.merges_tables() && value.is_object() => {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
                forget_below(provenance, &path);
                provenance.insert(path, origin.clone());
            }
            (_, value) => {
                base.insert(key, value);
                forget_below(provenance, &path);
                provenance.insert(path, origin.clone());
            }
        }
    }
}

/// Record `origin` for every leaf of a defaults table.
pub(crate) fn record_origin(
    schema: &OptionSchema,
    values: &Map<String, Value>,
    prefix: &str,
    origin: &LayerOrigin,
    provenance: &mut BTreeMap<String, LayerOrigin>,
) {
    for (key, value) in values {
        let path = join_path(prefix, key);
        match (schema.get(key).map(|spec| spec.shape()), value) {
            (Some(Shape::Group(members)), Value::Object(inner)) => {
                record_origin(members, inner, &path, origin, provenance)
            }
            _ => {
                provenance.insert(path, origin.clone());
            }
        }
    }
}

fn forget_below(provenance: &mut BTreeMap<String, LayerOrigin>, path: &str) {
    let nested = format!("{}.", path);
    provenance.retain(|key, _| !key.starts_with(&nested));
}

/// Find the first key two partial configurations both define with different values.
pub(crate) fn find_conflict(
    schema: &OptionSchema,
    first: &Map<String, Value>,
    second: &Map<String, Value>,
    prefix: &str,
) -> Option<String> {
    for (key, a) in first {
        let Some(b) = second.get(key) else {
            continue;
        };
        let path = join_path(prefix, key);
        let conflict = match (schema.get(key).map(|spec| spec.shape()), a, b) {
            (Some(Shape::Group(members)), Value::Object(a), Value::Object(b)) => {
                find_conflict(members, a, b, &path)
            }
            (Some(shape), Value::Object(a), Value::Object(b)) if shape.merges_tables() => {
                find_table_conflict(a, b, &path)
            }
            // unknown keys only reach here from the environment loader
            (None, Value::Object(a), Value::Object(b)) => find_table_conflict(a, b, &path),
            _ if a != b => Some(path),
            _ => None,
        };
        if conflict.is_some() {
            return conflict;
        }
    }
    None
}

fn find_table_conflict(first: &Map<String, Value>, second: &Map<String, Value>, prefix: &str) -> Option<String> {
    for (key, a) in first {
        let Some(b) = second.get(key) else {
            continue;
        };
        let path = join_path(prefix, key);
        let conflict = match (a, b) {
            (Value::Object(a), Value::Object(b)) => find_table_conflict(a, b, &path),
            _ if a != b => Some(path),
            _ => None,
        };
        if conflict.is_some() {
            return conflict;
        }
    }
    None
}
