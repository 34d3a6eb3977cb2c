//! In-memory path evaluation over a materialized document

use serde_json::Value;

use super::ast::PathQuery;
use super::steps::{ChildKey, Step};

/// Evaluates a query against a document, returning matched nodes in order
pub fn evaluate<'v>(query: &PathQuery, root: &'v Value) -> Vec<&'v Value> {
    evaluate_steps(query.steps(), root)
}

/// Applies steps to a node, as the reader does for the remainder of a path
/// once a child has been materialized.
pub(crate) fn evaluate_steps<'v>(steps: &[Step], root: &'v Value) -> Vec<&'v Value> {
    let mut nodes = vec![root];
    for step in steps {
        let mut next = Vec::new();
        for node in nodes {
            let selected = step.select_list(children(node));
            next.extend(selected.into_iter().map(|(_, v)| v));
        }
        if next.is_empty() {
            return next;
        }
        nodes = next;
    }
    nodes
}

fn children(value: &Value) -> Vec<(ChildKey<'_>, &Value)> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (ChildKey::Index(i), v))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (ChildKey::Member(k.as_str()), v))
            .collect(),
        _ => Vec::new(),
    }
}
