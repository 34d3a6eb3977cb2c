//! In-memory relational operators and terminal reductions
//!
//! These run over the materialized output of a plan.

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use super::errors::{ExecutorError, ExecutorResult};
use super::sorter::{compare_values, ElementSorter};
use crate::compiler::MemberAccessor;
use crate::planner::{Aggregate, PostProcess, RelationalOp, Terminal};

/// Applies every post-processing operator in order
pub fn apply_ops(post: &PostProcess, mut elements: Vec<Value>) -> Vec<Value> {
    for op in post.ops() {
        elements = apply(op, elements);
    }
    elements
}

fn apply(op: &RelationalOp, elements: Vec<Value>) -> Vec<Value> {
    match op {
        RelationalOp::Filter(predicate) => elements.into_iter().filter(|e| predicate.test(e)).collect(),
        RelationalOp::Sort(keys) => {
            let mut elements = elements;
            ElementSorter::sort(&mut elements, keys);
            elements
        }
        RelationalOp::Skip(n) => elements.into_iter().skip(*n).collect(),
        RelationalOp::Take(n) => elements.into_iter().take(*n).collect(),
        RelationalOp::Project(selector) => elements.iter().map(|e| selector.apply(e)).collect(),
        RelationalOp::GroupBy(key) => group_by(key, elements),
        RelationalOp::Join { spec, outer, inner } => join(outer, inner, &spec.inner, elements),
    }
}

/// Groups in first-seen key order; a missing key groups with `null`
pub fn group_by(key: &MemberAccessor, elements: Vec<Value>) -> Vec<Value> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();

    for element in elements {
        let k = key.get(&element).cloned().unwrap_or(Value::Null);
        let slot = *index.entry(key_text(&k)).or_insert_with(|| {
            groups.push((k, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(element);
    }

    groups
        .into_iter()
        .map(|(k, items)| {
            let mut group = Map::new();
            group.insert("key".to_string(), k);
            group.insert("items".to_string(), Value::Array(items));
            Value::Object(group)
        })
        .collect()
}

/// Hash inner join, outer order then inner order. Null and missing keys
/// never match.
pub fn join(
    outer_key: &MemberAccessor,
    inner_key: &MemberAccessor,
    inner: &[Value],
    outer: Vec<Value>,
) -> Vec<Value> {
    let mut lookup: HashMap<String, Vec<&Value>> = HashMap::new();
    for candidate in inner {
        if let Some(k) = inner_key.get(candidate).filter(|k| !k.is_null()) {
            lookup.entry(key_text(k)).or_default().push(candidate);
        }
    }

    let mut out = Vec::new();
    for element in outer {
        let Some(matches) = outer_key
            .get(&element)
            .filter(|k| !k.is_null())
            .and_then(|k| lookup.get(&key_text(k)))
        else {
            continue;
        };
        for matched in matches {
            let mut pair = Map::new();
            pair.insert("outer".to_string(), element.clone());
            pair.insert("inner".to_string(), (*matched).clone());
            out.push(Value::Object(pair));
        }
    }
    out
}

/// Canonical text for key equality: numbers compare by value
fn key_text(value: &Value) -> String {
    match value {
        Value::Number(n) => number_key(n),
        other => other.to_string(),
    }
}

fn number_key(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// Reduces a sequence to one value
pub fn reduce(terminal: &Terminal, elements: Vec<Value>) -> ExecutorResult<Value> {
    let name = terminal.aggregate.name();
    match &terminal.aggregate {
        Aggregate::Count => Ok(Value::from(elements.len() as u64)),
        Aggregate::Any => Ok(Value::Bool(!elements.is_empty())),
        Aggregate::First => elements
            .into_iter()
            .next()
            .ok_or_else(|| ExecutorError::empty_sequence(name)),
        Aggregate::FirstOrDefault => Ok(elements.into_iter().next().unwrap_or(Value::Null)),
        Aggregate::Last => elements
            .into_iter()
            .next_back()
            .ok_or_else(|| ExecutorError::empty_sequence(name)),
        Aggregate::Single => single(elements, name)?.ok_or_else(|| ExecutorError::empty_sequence(name)),
        Aggregate::SingleOrDefault => Ok(single(elements, name)?.unwrap_or(Value::Null)),
        Aggregate::ElementAt(index) => {
            let len = elements.len();
            elements
                .into_iter()
                .nth(*index)
                .ok_or_else(|| ExecutorError::index_out_of_range(*index, len))
        }
        Aggregate::Min(_) | Aggregate::Max(_) => {
            let want_max = matches!(terminal.aggregate, Aggregate::Max(_));
            let mut best: Option<&Value> = None;
            for value in member_values(terminal, &elements) {
                let replace = match best {
                    None => true,
                    Some(current) => {
                        let ordering = compare_values(Some(value), Some(current));
                        if want_max {
                            ordering.is_gt()
                        } else {
                            ordering.is_lt()
                        }
                    }
                };
                if replace {
                    best = Some(value);
                }
            }
            best.cloned().ok_or_else(|| ExecutorError::empty_sequence(name))
        }
        Aggregate::Sum(_) => sum(member_numbers(terminal, &elements), name),
        Aggregate::Average(_) => {
            let numbers: Vec<&Number> = member_numbers(terminal, &elements).collect();
            if numbers.is_empty() {
                return Err(ExecutorError::empty_sequence(name));
            }
            let total: f64 = numbers.iter().filter_map(|n| n.as_f64()).sum();
            Number::from_f64(total / numbers.len() as f64)
                .map(Value::Number)
                .ok_or_else(|| ExecutorError::numeric_overflow(name))
        }
    }
}

fn single(elements: Vec<Value>, name: &str) -> ExecutorResult<Option<Value>> {
    let mut iter = elements.into_iter();
    let first = iter.next();
    if iter.next().is_some() {
        return Err(ExecutorError::multiple_elements(name));
    }
    Ok(first)
}

/// Present, non-null member values
fn member_values<'v>(terminal: &'v Terminal, elements: &'v [Value]) -> impl Iterator<Item = &'v Value> + 'v {
    elements.iter().filter_map(move |e| match &terminal.accessor {
        Some(accessor) => accessor.get(e).filter(|v| !v.is_null()),
        None => Some(e),
    })
}

/// Numeric member values; other values are ignored
fn member_numbers<'v>(terminal: &'v Terminal, elements: &'v [Value]) -> impl Iterator<Item = &'v Number> + 'v {
    member_values(terminal, elements).filter_map(Value::as_number)
}

/// Integer sum while every value is an integer, `f64` otherwise
fn sum<'v>(numbers: impl Iterator<Item = &'v Number>, name: &str) -> ExecutorResult<Value> {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0f64;
    for n in numbers {
        float_total += n.as_f64().unwrap_or(0.0);
        int_total = match (int_total, n.as_i64()) {
            (Some(total), Some(i)) => Some(
                total
                    .checked_add(i)
                    .ok_or_else(|| ExecutorError::numeric_overflow(name))?,
            ),
            _ => None,
        };
    }
    match int_total {
        Some(total) => Ok(Value::from(total)),
        None => Number::from_f64(float_total)
            .map(Value::Number)
            .ok_or_else(|| ExecutorError::numeric_overflow(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FieldPath;
    use crate::schema::ElementSchema;
    use serde_json::json;
    use std::sync::Arc;

    fn accessor(path: &str) -> MemberAccessor {
        MemberAccessor::compile(&ElementSchema::dynamic(), &FieldPath::from(path)).unwrap()
    }

    fn terminal(aggregate: Aggregate) -> Terminal {
        let accessor = aggregate.member().map(|p| {
            Arc::new(MemberAccessor::compile(&ElementSchema::dynamic(), p).unwrap())
        });
        Terminal { aggregate, accessor }
    }

    fn people() -> Vec<Value> {
        vec![
            json!({"name": "a", "city": "Oslo", "age": 30}),
            json!({"name": "b", "city": "Rome", "age": 25}),
            json!({"name": "c", "city": "Oslo", "age": 41}),
            json!({"name": "d", "age": 19}),
        ]
    }

    #[test]
    fn test_group_by_first_seen_order() {
        let groups = group_by(&accessor("city"), people());
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0]["key"], json!("Oslo"));
        assert_eq!(groups[0]["items"].as_array().unwrap().len(), 2);
        assert_eq!(groups[1]["key"], json!("Rome"));
        assert_eq!(groups[2]["key"], Value::Null);
    }

    #[test]
    fn test_group_numeric_keys_by_value() {
        let groups = group_by(&accessor("k"), vec![json!({"k": 1}), json!({"k": 1.0}), json!({"k": 2})]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_join_outer_then_inner_order() {
        let cities = vec![
            json!({"city": "Oslo", "country": "NO"}),
            json!({"city": "Rome", "country": "IT"}),
            json!({"city": "Oslo", "country": "NO-alt"}),
        ];
        let out = join(&accessor("city"), &accessor("city"), &cities, people());
        let pairs: Vec<(String, String)> = out
            .iter()
            .map(|p| {
                (
                    p["outer"]["name"].as_str().unwrap().to_string(),
                    p["inner"]["country"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "NO".to_string()),
                ("a".to_string(), "NO-alt".to_string()),
                ("b".to_string(), "IT".to_string()),
                ("c".to_string(), "NO".to_string()),
                ("c".to_string(), "NO-alt".to_string()),
            ]
        );
    }

    #[test]
    fn test_count_any_first_last() {
        assert_eq!(reduce(&terminal(Aggregate::Count), people()).unwrap(), json!(4));
        assert_eq!(reduce(&terminal(Aggregate::Any), Vec::new()).unwrap(), json!(false));
        assert_eq!(reduce(&terminal(Aggregate::First), people()).unwrap()["name"], json!("a"));
        assert_eq!(reduce(&terminal(Aggregate::Last), people()).unwrap()["name"], json!("d"));
        assert_eq!(reduce(&terminal(Aggregate::FirstOrDefault), Vec::new()).unwrap(), Value::Null);

        let err = reduce(&terminal(Aggregate::First), Vec::new()).unwrap_err();
        assert_eq!(err.code().code(), "FLOW_EMPTY_SEQUENCE");
    }

    #[test]
    fn test_single_variants() {
        assert_eq!(reduce(&terminal(Aggregate::Single), vec![json!(7)]).unwrap(), json!(7));
        let err = reduce(&terminal(Aggregate::Single), people()).unwrap_err();
        assert_eq!(err.code().code(), "FLOW_MULTIPLE_ELEMENTS");
        assert_eq!(reduce(&terminal(Aggregate::SingleOrDefault), Vec::new()).unwrap(), Value::Null);
        assert!(reduce(&terminal(Aggregate::SingleOrDefault), people()).is_err());
    }

    #[test]
    fn test_element_at() {
        assert_eq!(reduce(&terminal(Aggregate::ElementAt(1)), people()).unwrap()["name"], json!("b"));
        let err = reduce(&terminal(Aggregate::ElementAt(9)), people()).unwrap_err();
        assert_eq!(err.code().code(), "FLOW_INDEX_OUT_OF_RANGE");
    }

    #[test]
    fn test_numeric_reductions() {
        let age = FieldPath::from("age");
        assert_eq!(reduce(&terminal(Aggregate::Min(age.clone())), people()).unwrap(), json!(19));
        assert_eq!(reduce(&terminal(Aggregate::Max(age.clone())), people()).unwrap(), json!(41));
        assert_eq!(reduce(&terminal(Aggregate::Sum(age.clone())), people()).unwrap(), json!(115));
        assert_eq!(reduce(&terminal(Aggregate::Average(age)), people()).unwrap(), json!(28.75));

        let mixed = vec![json!({"v": 1}), json!({"v": 0.5}), json!({"v": null})];
        assert_eq!(reduce(&terminal(Aggregate::Sum(FieldPath::from("v"))), mixed).unwrap(), json!(1.5));
        assert_eq!(reduce(&terminal(Aggregate::Sum(FieldPath::from("v"))), Vec::new()).unwrap(), json!(0));
    }

    #[test]
    fn test_sum_overflow_and_empty_average() {
        let big = vec![json!({"v": i64::MAX}), json!({"v": 1})];
        let err = reduce(&terminal(Aggregate::Sum(FieldPath::from("v"))), big).unwrap_err();
        assert_eq!(err.code().code(), "FLOW_NUMERIC_OVERFLOW");

        let err = reduce(&terminal(Aggregate::Average(FieldPath::from("v"))), Vec::new()).unwrap_err();
        assert_eq!(err.code().code(), "FLOW_EMPTY_SEQUENCE");

        let err = reduce(&terminal(Aggregate::Max(FieldPath::from("v"))), Vec::new()).unwrap_err();
        assert_eq!(err.code().code(), "FLOW_EMPTY_SEQUENCE");
    }
}
