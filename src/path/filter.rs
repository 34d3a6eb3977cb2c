//! Filter expression evaluation against a candidate value `@`

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::ast::{CompareOp, FilterExpr, FunctionCall, FunctionName, LogicalOp, Operand};

/// Result of resolving an operand. `Nothing` is the empty node list.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    Node(&'a Value),
    Owned(Value),
    Nothing,
}

impl<'a> Resolved<'a> {
    pub fn from_lookup(value: Option<&'a Value>) -> Self {
        value.map_or(Resolved::Nothing, Resolved::Node)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolved::Node(v) => Some(v),
            Resolved::Owned(v) => Some(v),
            Resolved::Nothing => None,
        }
    }
}

/// Evaluates a filter expression against the current candidate
pub fn evaluate_filter(expr: &FilterExpr, current: &Value) -> bool {
    match expr {
        FilterExpr::Comparison { left, op, right } => {
            let l = resolve_operand(left, current);
            let r = resolve_operand(right, current);
            compare(&l, *op, &r)
        }
        FilterExpr::Logical {
            op: LogicalOp::And,
            left,
            right,
        } => evaluate_filter(left, current) && evaluate_filter(right, current),
        FilterExpr::Logical {
            op: LogicalOp::Or,
            left,
            right,
        } => evaluate_filter(left, current) || evaluate_filter(right, current),
        FilterExpr::Not(inner) => !evaluate_filter(inner, current),
        FilterExpr::Exists(path) => path.lookup(current).is_some(),
        FilterExpr::Function(call) => test_function(call, current),
    }
}

fn resolve_operand<'a>(operand: &'a Operand, current: &'a Value) -> Resolved<'a> {
    match operand {
        Operand::Path(path) => Resolved::from_lookup(path.lookup(current)),
        Operand::Literal(v) => Resolved::Node(v),
        Operand::Function(call) => match call.name {
            FunctionName::Length => call
                .args
                .first()
                .map(|arg| length(&resolve_operand(arg, current)))
                .unwrap_or(Resolved::Nothing),
            // Test functions are rejected as comparison operands while parsing
            FunctionName::Match | FunctionName::Search => Resolved::Nothing,
        },
    }
}

fn test_function(call: &FunctionCall, current: &Value) -> bool {
    let (Some(subject), Some(pattern)) = (call.args.first(), call.pattern.as_ref()) else {
        return false;
    };
    match resolve_operand(subject, current).value() {
        Some(Value::String(s)) => pattern.is_match(s),
        _ => false,
    }
}

/// `length()`: characters of a string, elements of an array, members of an
/// object. Any other value has no length.
pub fn length<'a>(value: &Resolved<'_>) -> Resolved<'a> {
    let n = match value.value() {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(a)) => a.len(),
        Some(Value::Object(o)) => o.len(),
        _ => return Resolved::Nothing,
    };
    Resolved::Owned(Value::from(n as u64))
}

/// Compares two resolved operands
pub fn compare(left: &Resolved<'_>, op: CompareOp, right: &Resolved<'_>) -> bool {
    match op {
        CompareOp::Eq => operands_equal(left, right),
        CompareOp::Ne => !operands_equal(left, right),
        CompareOp::Lt => operands_less(left, right),
        CompareOp::Gt => operands_less(right, left),
        CompareOp::Le => operands_less(left, right) || operands_equal(left, right),
        CompareOp::Ge => operands_less(right, left) || operands_equal(left, right),
    }
}

fn operands_equal(left: &Resolved<'_>, right: &Resolved<'_>) -> bool {
    match (left.value(), right.value()) {
        (None, None) => true,
        (Some(l), Some(r)) => values_equal(l, r),
        _ => false,
    }
}

fn operands_less(left: &Resolved<'_>, right: &Resolved<'_>) -> bool {
    match (left.value(), right.value()) {
        (Some(l), Some(r)) => ordering(l, r) == Some(Ordering::Less),
        _ => false,
    }
}

/// Typed equality: numbers by value, everything else structurally
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Ordering defined only between two numbers or two strings
pub fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        _ => None,
    }
}

/// Exact numeric comparison. Integers never pass through `f64`, so the
/// order stays total across mixed integer and float values.
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (integer(a), integer(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        (Some(x), None) => compare_integer_float(x, b.as_f64()?),
        (None, Some(y)) => compare_integer_float(y, a.as_f64()?).map(Ordering::reverse),
        (None, None) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from))
}

fn compare_integer_float(i: i128, f: f64) -> Option<Ordering> {
    const BOUND: f64 = i128::MAX as f64;
    if f.is_nan() {
        return None;
    }
    if f >= BOUND {
        return Some(Ordering::Less);
    }
    if f < -BOUND {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i128)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(f - whole)),
        other => Some(other),
    }
}
