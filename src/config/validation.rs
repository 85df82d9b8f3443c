//! Configuration validation.
//!
//! # Responsibilities
//! - Check every value a layer supplies against its option's shape and rule
//! - Detect keys the schema does not know, at any nesting level
//! - Apply the unknown-key policy (reject, or drop with a warning)
//!
//! # Design Decisions
//! - Validation is per layer, so errors name the layer that supplied the value
//! - Pure function of (schema, layer, policy); only side effect is logging
//! - Stops at the first error; the resolver never produces partial output

use serde_json::{Map, Value};

use crate::config::error::ResolveError;
use crate::config::layer::{Layer, LayerOrigin};
use crate::config::resolver::UnknownKeyPolicy;
use crate::config::schema::{join_path, OptionSchema, OptionSpec, Shape};

/// Validate a layer, returning its values with unknown keys removed (permissive
/// mode) or the first error found.
pub(crate) fn validate_layer(
    schema: &OptionSchema,
    layer: &Layer,
    policy: UnknownKeyPolicy,
) -> Result<Map<String, Value>, ResolveError> {
    validate_members(schema, layer.values(), "", layer.origin(), policy)
}

fn validate_members(
    schema: &OptionSchema,
    values: &Map<String, Value>,
    prefix: &str,
    origin: &LayerOrigin,
    policy: UnknownKeyPolicy,
) -> Result<Map<String, Value>, ResolveError> {
    let mut checked = Map::new();

    for (key, value) in values {
        let path = join_path(prefix, key);
        let Some(spec) = schema.get(key) else {
            match policy {
                UnknownKeyPolicy::Reject => {
                    return Err(ResolveError::UnknownOption {
                        key: path,
                        origin: origin.clone(),
                    });
                }
                UnknownKeyPolicy::Drop => {
                    tracing::warn!(option = %path, origin = %origin, "Ignoring unknown option");
                    continue;
                }
            }
        };

        let value = match (spec.shape(), value) {
            (Shape::Group(members), Value::Object(inner)) => {
                Value::Object(validate_members(members, inner, &path, origin, policy)?)
            }
            _ => {
                check_option(spec, value, &path, origin)?;
                value.clone()
            }
        };
        checked.insert(key.clone(), value);
    }

    Ok(checked)
}

/// Check a single value against an option's shape and rule.
pub(crate) fn check_option(
    spec: &OptionSpec,
    value: &Value,
    path: &str,
    origin: &LayerOrigin,
) -> Result<(), ResolveError> {
    if !matches_shape(spec.shape(), value) {
        return Err(ResolveError::InvalidValue {
            key: path.to_string(),
            origin: origin.clone(),
            expected: spec.shape().describe(),
            received: describe_value(value),
            legal: spec.shape().legal_values(),
        });
    }

    if let Some(rule) = spec.validation_rule() {
        rule(value).map_err(|expected| ResolveError::InvalidValue {
            key: path.to_string(),
            origin: origin.clone(),
            expected,
            received: describe_value(value),
            legal: Vec::new(),
        })?;
    }

    Ok(())
}

pub(crate) fn matches_shape(shape: &Shape, value: &Value) -> bool {
    match shape {
        Shape::Bool => value.is_boolean(),
        Shape::Integer { min, max } => value.as_i64().is_some_and(|n| {
            min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
        }),
        Shape::String => value.is_string(),
        Shape::Enum(legal) => value
            .as_str()
            .is_some_and(|s| legal.iter().any(|l| l == s)),
        Shape::List(item) => value
            .as_array()
            .is_some_and(|items| items.iter().all(|v| matches_shape(item, v))),
        Shape::Table | Shape::Group(_) => value.is_object(),
        Shape::AnyOf(shapes) => shapes.iter().any(|s| matches_shape(s, value)),
    }
}

/// Short description of a received value for error messages.
pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Object(_) => "a table".to_string(),
        Value::Array(items) => format!("a list of {} item(s)", items.len()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> OptionSchema {
        OptionSchema::builder()
            .option(
                "outputMode",
                OptionSpec::one_of(["default", "standalone", "export"]).default("default"),
            )
            .option(
                "distDir",
                OptionSpec::string()
                    .default("dist")
                    .rule(|v| match v.as_str() {
                        Some("") => Err("a non-empty string".to_string()),
                        _ => Ok(()),
                    }),
            )
            .group(
                "experimental",
                "",
                OptionSchema::builder()
                    .option("turbo", OptionSpec::any_of(vec![Shape::Bool, Shape::Table]))
                    .option("cpus", OptionSpec::integer_in(1, 4)),
            )
            .build()
            .unwrap()
    }

    fn layer(value: Value) -> Layer {
        Layer::from_value(LayerOrigin::inline("test"), value).unwrap()
    }

    #[test]
    fn test_valid_layer_passes_through() {
        let values = json!({"outputMode": "export", "experimental": {"turbo": {}, "cpus": 2}});
        let checked = validate_layer(&schema(), &layer(values.clone()), UnknownKeyPolicy::Reject).unwrap();
        assert_eq!(Value::Object(checked), values);
    }

    #[test]
    fn test_enum_violation_lists_legal_values() {
        let err = validate_layer(&schema(), &layer(json!({"outputMode": "weird"})), UnknownKeyPolicy::Reject)
            .unwrap_err();
        match err {
            ResolveError::InvalidValue { key, legal, received, .. } => {
                assert_eq!(key, "outputMode");
                assert_eq!(legal, vec!["default", "standalone", "export"]);
                assert_eq!(received, "\"weird\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nested_unknown_key_reports_full_path() {
        let err = validate_layer(
            &schema(),
            &layer(json!({"experimental": {"turob": true}})),
            UnknownKeyPolicy::Reject,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownOption {
                key: "experimental.turob".into(),
                origin: LayerOrigin::inline("test"),
            }
        );
    }

    #[test]
    fn test_permissive_drops_unknown_keys() {
        let checked = validate_layer(
            &schema(),
            &layer(json!({"foo": 1, "experimental": {"bar": true, "cpus": 1}})),
            UnknownKeyPolicy::Drop,
        )
        .unwrap();
        assert!(!checked.contains_key("foo"));
        assert_eq!(checked["experimental"], json!({"cpus": 1}));
    }

    #[test]
    fn test_integer_range_and_rule() {
        let err = validate_layer(&schema(), &layer(json!({"experimental": {"cpus": 9}})), UnknownKeyPolicy::Reject)
            .unwrap_err();
        assert_eq!(err.key(), "experimental.cpus");

        let err = validate_layer(&schema(), &layer(json!({"distDir": ""})), UnknownKeyPolicy::Reject).unwrap_err();
        assert!(err.to_string().contains("a non-empty string"));
    }

    #[test]
    fn test_group_given_scalar_is_invalid() {
        let err = validate_layer(&schema(), &layer(json!({"experimental": true})), UnknownKeyPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidValue { ref expected, .. } if expected == "a table of options"));
    }

    #[test]
    fn test_describe_value() {
        assert_eq!(describe_value(&json!(null)), "null");
        assert_eq!(describe_value(&json!([1, 2])), "a list of 2 item(s)");
        assert_eq!(describe_value(&json!(3)), "3");
    }
}
