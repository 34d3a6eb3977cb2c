//! Element conformance
//!
//! Checks a deserialized element against its declared type:
//! - Undeclared members are tolerated and kept
//! - Optional members may be absent or null
//! - Required members must be present and non-null
//! - Integral floats coerce to int; other numbers never coerce
//!
//! Conformance never reorders or drops members.

use serde_json::{Map, Value};

use super::errors::ShapeMismatch;
use super::types::{ElementSchema, FieldDef, FieldType};
use crate::path::names_match;

/// Conforms one element to the schema, returning the coerced element
pub fn conform(schema: &ElementSchema, mut value: Value) -> Result<Value, ShapeMismatch> {
    conform_value(&mut value, &schema.element, "$root")?;
    Ok(value)
}

fn conform_value(value: &mut Value, expected: &FieldType, path: &str) -> Result<(), ShapeMismatch> {
    match expected {
        FieldType::Any => Ok(()),
        FieldType::String if value.is_string() => Ok(()),
        FieldType::Bool if value.is_boolean() => Ok(()),
        FieldType::Float if value.is_number() => Ok(()),
        FieldType::Int => match coerce_int(value) {
            Some(coerced) => {
                *value = coerced;
                Ok(())
            }
            None => Err(mismatch(path, "int", value)),
        },
        FieldType::Object { fields } => match value {
            Value::Object(map) => conform_object(map, fields, path),
            other => Err(mismatch(path, "object", other)),
        },
        FieldType::Array { element_type } => match value {
            Value::Array(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    conform_value(item, element_type, &format!("{}[{}]", path, i))?;
                }
                Ok(())
            }
            other => Err(mismatch(path, "array", other)),
        },
        other => Err(mismatch(path, other.type_name(), value)),
    }
}

fn conform_object(
    map: &mut Map<String, Value>,
    fields: &std::collections::BTreeMap<String, FieldDef>,
    prefix: &str,
) -> Result<(), ShapeMismatch> {
    for (name, def) in fields {
        let member_path = make_path(prefix, name);
        let key = if map.contains_key(name) {
            Some(name.clone())
        } else {
            map.keys().find(|k| names_match(k, name)).cloned()
        };

        match key.and_then(|k| map.get_mut(&k)) {
            Some(Value::Null) | None if def.required => {
                return Err(ShapeMismatch::missing_field(member_path));
            }
            Some(Value::Null) | None => {}
            Some(member) => conform_value(member, &def.field_type, &member_path)?,
        }
    }
    Ok(())
}

fn coerce_int(value: &Value) -> Option<Value> {
    let n = value.as_number()?;
    if n.is_i64() || n.is_u64() {
        return Some(value.clone());
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

/// Returns the JSON type name for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn make_path(prefix: &str, field: &str) -> String {
    if prefix == "$root" {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

fn mismatch(path: &str, expected: &str, actual: &Value) -> ShapeMismatch {
    ShapeMismatch::type_mismatch(path, expected, json_type_name(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn schema() -> ElementSchema {
        let mut fields = BTreeMap::new();
        fields.insert("name".into(), FieldDef::required_string());
        fields.insert("age".into(), FieldDef::optional_int());
        fields.insert("tags".into(), FieldDef::optional_array(FieldType::String));
        ElementSchema::object("person", fields)
    }

    #[test]
    fn test_conforming_element_passes() {
        let v = json!({"name": "a", "age": 3, "tags": ["x"]});
        assert_eq!(conform(&schema(), v.clone()).unwrap(), v);
    }

    #[test]
    fn test_extra_members_tolerated() {
        let v = json!({"name": "a", "nickname": "b"});
        assert_eq!(conform(&schema(), v.clone()).unwrap(), v);
    }

    #[test]
    fn test_optional_missing_or_null() {
        assert!(conform(&schema(), json!({"name": "a"})).is_ok());
        assert!(conform(&schema(), json!({"name": "a", "age": null})).is_ok());
    }

    #[test]
    fn test_required_missing() {
        let err = conform(&schema(), json!({"age": 3})).unwrap_err();
        assert_eq!(err.field, "name");
        assert_eq!(err.actual, "missing");
        assert!(conform(&schema(), json!({"name": null})).is_err());
    }

    #[test]
    fn test_integral_float_coerces_to_int() {
        let out = conform(&schema(), json!({"name": "a", "age": 30.0})).unwrap();
        assert_eq!(out["age"], json!(30));
        assert!(out["age"].is_i64());
    }

    #[test]
    fn test_fractional_float_rejected_for_int() {
        let err = conform(&schema(), json!({"name": "a", "age": 30.5})).unwrap_err();
        assert_eq!(err.field, "age");
        assert_eq!(err.expected, "int");
        assert_eq!(err.actual, "float");
    }

    #[test]
    fn test_array_element_mismatch_path() {
        let err = conform(&schema(), json!({"name": "a", "tags": ["x", 1]})).unwrap_err();
        assert_eq!(err.field, "tags[1]");
    }

    #[test]
    fn test_case_insensitive_member() {
        assert!(conform(&schema(), json!({"NAME": "a"})).is_ok());
    }

    #[test]
    fn test_wrong_root_type() {
        let err = conform(&schema(), json!([1])).unwrap_err();
        assert_eq!(err.field, "$root");
        assert_eq!(err.expected, "object");
    }

    #[test]
    fn test_dynamic_accepts_everything() {
        assert!(conform(&ElementSchema::dynamic(), json!("x")).is_ok());
    }
}
