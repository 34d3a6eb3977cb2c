//! Multi-key element sorting
//!
//! Stable: elements with equal keys keep their input order.

use std::cmp::Ordering;

use serde_json::Value;

use crate::path::compare_numbers;
use crate::planner::SortKey;

pub struct ElementSorter;

impl ElementSorter {
    /// Sorts by `keys`, primary first
    pub fn sort(elements: &mut [Value], keys: &[SortKey]) {
        if keys.is_empty() {
            return;
        }
        elements.sort_by(|a, b| Self::compare(a, b, keys));
    }

    fn compare(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
        for key in keys {
            let ordering = compare_values(key.accessor.get(a), key.accessor.get(b));
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Total order used for sort keys.
///
/// Ordering rules:
/// - missing < present
/// - null < bool < number < string < array < object
/// - numbers by value, strings by bytes, arrays element-wise
/// - objects compare equal
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_present(a, b),
    }
}

fn compare_present(a: &Value, b: &Value) -> Ordering {
    let type_order = |v: &Value| -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    };

    let (a_type, b_type) = (type_order(a), type_order(b));
    if a_type != b_type {
        return a_type.cmp(&b_type);
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ordering = compare_present(l, r);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::MemberAccessor;
    use crate::path::FieldPath;
    use crate::schema::ElementSchema;
    use serde_json::json;
    use std::sync::Arc;

    fn key(path: &str, ascending: bool) -> SortKey {
        let path = FieldPath::from(path);
        SortKey {
            accessor: Arc::new(MemberAccessor::compile(&ElementSchema::dynamic(), &path).unwrap()),
            path,
            ascending,
        }
    }

    fn ids(elements: &[Value]) -> Vec<i64> {
        elements.iter().map(|e| e["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let mut docs = vec![json!({"id": 1, "age": 30}), json!({"id": 2, "age": 20}), json!({"id": 3, "age": 25})];
        ElementSorter::sort(&mut docs, &[key("age", true)]);
        assert_eq!(ids(&docs), vec![2, 3, 1]);

        ElementSorter::sort(&mut docs, &[key("age", false)]);
        assert_eq!(ids(&docs), vec![1, 3, 2]);
    }

    #[test]
    fn test_sort_stable() {
        let mut docs = vec![json!({"id": 1, "age": 25}), json!({"id": 2, "age": 25}), json!({"id": 3, "age": 25})];
        ElementSorter::sort(&mut docs, &[key("age", false)]);
        assert_eq!(ids(&docs), vec![1, 2, 3]);
    }

    #[test]
    fn test_mixed_integer_and_float_values_near_precision_limit() {
        let mut docs = vec![
            json!({"id": 1, "v": 9007199254740993i64}),
            json!({"id": 2, "v": 9007199254740992.0}),
            json!({"id": 3, "v": 9007199254740992i64}),
            json!({"id": 4, "v": 9007199254740991.0}),
            json!({"id": 5, "v": -3}),
            json!({"id": 6, "v": -2.5}),
        ];
        ElementSorter::sort(&mut docs, &[key("v", true)]);
        assert_eq!(ids(&docs), vec![5, 6, 4, 2, 3, 1]);
    }

    #[test]
    fn test_secondary_key_breaks_ties() {
        let mut docs = vec![
            json!({"id": 1, "city": "b", "age": 1}),
            json!({"id": 2, "city": "a", "age": 1}),
            json!({"id": 3, "city": "b", "age": 2}),
            json!({"id": 4, "city": "a", "age": 3}),
        ];
        ElementSorter::sort(&mut docs, &[key("city", true), key("age", false)]);
        assert_eq!(ids(&docs), vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_type_order_and_missing() {
        let mut docs = vec![
            json!({"id": 1, "v": "s"}),
            json!({"id": 2, "v": 3}),
            json!({"id": 3}),
            json!({"id": 4, "v": null}),
            json!({"id": 5, "v": true}),
            json!({"id": 6, "v": [1]}),
        ];
        ElementSorter::sort(&mut docs, &[key("v", true)]);
        assert_eq!(ids(&docs), vec![3, 4, 5, 2, 1, 6]);
    }

    #[test]
    fn test_mixed_integer_and_float() {
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(2.5))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(-1)), Some(&json!(u64::MAX))), Ordering::Less);
    }
}
