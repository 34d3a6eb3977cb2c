//! Path query scenarios across every executor
//!
//! Each scenario runs through the whole-buffer and streaming executors and
//! is checked against the in-memory evaluator.

use std::io::Cursor;

use serde_json::{json, Value};

use jsonflow::path::evaluate;
use jsonflow::{ElementSchema, OperatorChain, PathQuery, QueryEngine};

fn buffered(doc: &Value, path: &str) -> Vec<Value> {
    let bytes = serde_json::to_vec(doc).unwrap();
    QueryEngine::default()
        .run_buffer(&bytes, Some(PathQuery::parse(path).unwrap()), &OperatorChain::new(), &ElementSchema::dynamic())
        .unwrap()
        .into_values()
}

fn streamed(doc: &Value, path: &str) -> Vec<Value> {
    let bytes = serde_json::to_vec(doc).unwrap();
    QueryEngine::default()
        .run_stream(
            Cursor::new(bytes),
            Some(PathQuery::parse(path).unwrap()),
            &OperatorChain::new(),
            &ElementSchema::dynamic(),
        )
        .unwrap()
        .into_values()
}

fn oracle(doc: &Value, path: &str) -> Vec<Value> {
    evaluate(&PathQuery::parse(path).unwrap(), doc).into_iter().cloned().collect()
}

/// Runs all three and asserts they agree
fn select(doc: &Value, path: &str) -> Vec<Value> {
    let expected = oracle(doc, path);
    assert_eq!(buffered(doc, path), expected, "buffer executor diverged for {}", path);
    assert_eq!(streamed(doc, path), expected, "stream executor diverged for {}", path);
    expected
}

fn ten() -> Value {
    Value::Array((0..10).map(Value::from).collect())
}

fn flags() -> Value {
    Value::Array(
        (0..12)
            .map(|i| json!({"id": i, "active": i % 3 != 0}))
            .collect(),
    )
}

// =============================================================================
// CONCRETE SCENARIOS
// =============================================================================

#[test]
fn test_wildcard_under_member_yields_each_element() {
    let doc = json!({"data": [{"age": 25}, {"age": 31}]});
    let out = select(&doc, "$.data[*]");
    assert_eq!(out, vec![json!({"age": 25}), json!({"age": 31})]);
}

#[test]
fn test_filter_on_root_array() {
    let doc = json!([{"age": 25}, {"age": 31}]);
    assert_eq!(select(&doc, "$[?@.age > 25]"), vec![json!({"age": 31})]);
}

#[test]
fn test_slice_range() {
    assert_eq!(select(&ten(), "$[2:5]"), vec![json!(2), json!(3), json!(4)]);
}

#[test]
fn test_slice_with_step() {
    assert_eq!(select(&ten(), "$[0:10:2]"), vec![json!(0), json!(2), json!(4), json!(6), json!(8)]);
}

#[test]
fn test_filter_then_slice_refines_filtered_subset() {
    let out = select(&flags(), "$[?@.active==true][0:5]");
    let ids: Vec<i64> = out.iter().map(|v| v["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 4, 5, 7]);
}

#[test]
fn test_negative_slice_start() {
    assert_eq!(select(&ten(), "$[-3:]"), vec![json!(7), json!(8), json!(9)]);
}

// =============================================================================
// GRAMMAR COVERAGE
// =============================================================================

#[test]
fn test_negative_step_reverses() {
    assert_eq!(select(&ten(), "$[::-3]"), vec![json!(9), json!(6), json!(3), json!(0)]);
}

#[test]
fn test_extreme_slice_steps_stop_at_array_end() {
    let doc = json!([0, 1, 2]);
    assert_eq!(select(&doc, "$[1::9223372036854775807]"), vec![json!(1)]);
    assert_eq!(select(&doc, "$[-2::9223372036854775807]"), vec![json!(1)]);
    assert_eq!(select(&doc, "$[::-9223372036854775808]"), vec![json!(2)]);
}

#[test]
fn test_index_and_negative_index() {
    assert_eq!(select(&ten(), "$[1]"), vec![json!(1)]);
    assert_eq!(select(&ten(), "$[-1]"), vec![json!(9)]);
    assert!(select(&ten(), "$[10]").is_empty());
}

#[test]
fn test_logical_and_not_with_functions() {
    let doc = json!([
        {"name": "alice", "tags": ["a", "b", "c"]},
        {"name": "bob", "tags": []},
        {"name": "carol", "tags": ["x"]},
        {"name": "ann"}
    ]);
    let out = select(&doc, "$[?length(@.tags) > 0 && !match(@.name, 'c.*')]");
    assert_eq!(out, vec![doc[0].clone()]);

    let out = select(&doc, "$[?search(@.name, 'o') || !@.tags]");
    let names: Vec<&str> = out.iter().map(|v| v["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["bob", "carol", "ann"]);
}

#[test]
fn test_member_names_match_case_insensitively() {
    let doc = json!({"Data": [1, 2], "other": [3]});
    assert_eq!(select(&doc, "$.data[*]"), vec![json!(1), json!(2)]);
}

#[test]
fn test_nested_steps_after_filter() {
    let doc = json!({
        "groups": [
            {"kind": "a", "members": [{"n": 1}, {"n": 2}]},
            {"kind": "b", "members": [{"n": 3}]},
            {"kind": "a", "members": [{"n": 4}]}
        ]
    });
    let out = select(&doc, "$.groups[?@.kind == 'a'].members[*].n");
    assert_eq!(out, vec![json!(1), json!(2), json!(4)]);
}

#[test]
fn test_mixed_type_comparisons_are_unordered() {
    let doc = json!([{"v": 1}, {"v": "1"}, {"v": null}, {"v": true}, {}]);
    assert_eq!(select(&doc, "$[?@.v >= 1]"), vec![json!({"v": 1})]);
    assert_eq!(select(&doc, "$[?@.v == null]"), vec![json!({"v": null})]);
    assert_eq!(select(&doc, "$[?@.v != 1]").len(), 4);
}

#[test]
fn test_equivalence_over_many_paths() {
    let doc = json!({
        "data": (0..40).map(|i| json!({
            "id": i,
            "score": (i * 7) % 13,
            "label": format!("item-{}", i),
            "nested": {"tags": (0..(i % 4)).collect::<Vec<_>>()}
        })).collect::<Vec<_>>()
    });
    for path in [
        "$.data[*]",
        "$.data[5:25:3]",
        "$.data[-4:]",
        "$.data[?@.score >= 7]",
        "$.data[?@.score >= 7][2:]",
        "$.data[?length(@.nested.tags) == 3].label",
        "$.data[?match(@.label, 'item-1.')].id",
        "$.data[*].nested.tags[*]",
        "$.*[0].label",
    ] {
        select(&doc, path);
    }
}

// =============================================================================
// SYNTAX ERRORS
// =============================================================================

#[test]
fn test_invalid_paths_rejected_at_parse() {
    for text in ["data", "$[", "$[?@.a >]", "$[1:2:0:3]", "$[?length(@.a, @.b) > 1]", "$[?match(@.a, '(')]"] {
        assert!(PathQuery::parse(text).is_err(), "{} should not parse", text);
    }
    let err = PathQuery::parse("$[?match(@.a, '(')]").unwrap_err();
    assert_eq!(err.code().code(), "FLOW_PATH_PATTERN");
}
