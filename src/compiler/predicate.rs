//! Filter expressions compiled into closure trees
//!
//! Compilation resolves every member path against the declared element type
//! and checks that each comparison can hold for some element. The result is
//! a tree of boxed closures; evaluating it does no parsing or name
//! resolution.

use std::fmt;

use serde_json::Value;

use super::accessor::MemberAccessor;
use crate::path::{
    compare, length, CompareOp, FilterExpr, FunctionCall, FunctionName, LogicalOp, Operand,
    Pattern, Resolved,
};
use crate::planner::{TranslationError, TranslationResult};
use crate::schema::{json_type_name, ElementSchema, FieldType};

type Test = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Reusable boolean test over elements of one declared type
pub struct CompiledPredicate {
    text: String,
    test: Test,
}

impl CompiledPredicate {
    pub fn compile(schema: &ElementSchema, expr: &FilterExpr) -> TranslationResult<Self> {
        Ok(Self {
            text: expr.to_string(),
            test: compile_expr(schema, expr)?,
        })
    }

    /// Canonical text of the source expression
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn test(&self, element: &Value) -> bool {
        (self.test)(element)
    }
}

impl fmt::Debug for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPredicate")
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

/// Operand with its member path already resolved
enum CompiledOperand {
    Member(MemberAccessor),
    Literal(Value),
    Length(Box<CompiledOperand>),
}

impl CompiledOperand {
    fn resolve<'a>(&'a self, element: &'a Value) -> Resolved<'a> {
        match self {
            CompiledOperand::Member(accessor) => Resolved::from_lookup(accessor.get(element)),
            CompiledOperand::Literal(v) => Resolved::Node(v),
            CompiledOperand::Length(inner) => length(&inner.resolve(element)),
        }
    }

    /// Declared type of the operand; `None` for literals
    fn declared(&self) -> Option<FieldType> {
        match self {
            CompiledOperand::Member(accessor) => Some(accessor.field_type().clone()),
            CompiledOperand::Literal(_) => None,
            CompiledOperand::Length(_) => Some(FieldType::Int),
        }
    }
}

fn compile_expr(schema: &ElementSchema, expr: &FilterExpr) -> TranslationResult<Test> {
    match expr {
        FilterExpr::Comparison { left, op, right } => {
            let op = *op;
            let l = compile_operand(schema, left)?;
            let r = compile_operand(schema, right)?;
            check_comparison(&l, op, &r)?;
            Ok(Box::new(move |v| compare(&l.resolve(v), op, &r.resolve(v))))
        }
        FilterExpr::Logical { op, left, right } => {
            let l = compile_expr(schema, left)?;
            let r = compile_expr(schema, right)?;
            Ok(match op {
                LogicalOp::And => Box::new(move |v| l(v) && r(v)),
                LogicalOp::Or => Box::new(move |v| l(v) || r(v)),
            })
        }
        FilterExpr::Not(inner) => {
            let inner = compile_expr(schema, inner)?;
            Ok(Box::new(move |v| !inner(v)))
        }
        FilterExpr::Exists(path) => {
            let accessor = MemberAccessor::compile(schema, path)?;
            Ok(Box::new(move |v| accessor.get(v).is_some()))
        }
        FilterExpr::Function(call) => compile_test_function(schema, call),
    }
}

fn compile_operand(schema: &ElementSchema, operand: &Operand) -> TranslationResult<CompiledOperand> {
    match operand {
        Operand::Path(path) => Ok(CompiledOperand::Member(MemberAccessor::compile(schema, path)?)),
        Operand::Literal(v) => Ok(CompiledOperand::Literal(v.clone())),
        Operand::Function(call) if call.name == FunctionName::Length => {
            let arg = call
                .args
                .first()
                .ok_or_else(|| TranslationError::unsupported("length() without an argument"))?;
            let inner = compile_operand(schema, arg)?;
            if let CompiledOperand::Member(accessor) = &inner {
                if !has_length(accessor.field_type()) {
                    return Err(TranslationError::type_mismatch(
                        accessor.path().to_string(),
                        accessor.field_type().type_name(),
                        "length()",
                    ));
                }
            }
            Ok(CompiledOperand::Length(Box::new(inner)))
        }
        Operand::Function(call) => Err(TranslationError::unsupported(format!(
            "{}() as a comparison operand",
            call.name.as_str()
        ))),
    }
}

fn compile_test_function(schema: &ElementSchema, call: &FunctionCall) -> TranslationResult<Test> {
    if !call.name.is_test() {
        return Err(TranslationError::unsupported(format!(
            "{}() as a test",
            call.name.as_str()
        )));
    }
    let pattern: Pattern = call
        .pattern
        .clone()
        .ok_or_else(|| TranslationError::unsupported(format!("{}() without a pattern", call.name.as_str())))?;
    let subject = call
        .args
        .first()
        .ok_or_else(|| TranslationError::unsupported(format!("{}() without a subject", call.name.as_str())))?;
    let subject = compile_operand(schema, subject)?;
    if let CompiledOperand::Member(accessor) = &subject {
        if !matches!(accessor.field_type(), FieldType::String | FieldType::Any) {
            return Err(TranslationError::type_mismatch(
                accessor.path().to_string(),
                accessor.field_type().type_name(),
                format!("{}()", call.name.as_str()),
            ));
        }
    }
    Ok(Box::new(move |v| match subject.resolve(v).value() {
        Some(Value::String(s)) => pattern.is_match(s),
        _ => false,
    }))
}

fn has_length(field_type: &FieldType) -> bool {
    matches!(
        field_type,
        FieldType::String | FieldType::Array { .. } | FieldType::Object { .. } | FieldType::Any
    )
}

/// Rejects comparisons that no element of the declared type can satisfy
fn check_comparison(
    left: &CompiledOperand,
    op: CompareOp,
    right: &CompiledOperand,
) -> TranslationResult<()> {
    match (left, right) {
        (CompiledOperand::Literal(_), CompiledOperand::Literal(_)) => Ok(()),
        (lit @ CompiledOperand::Literal(_), other) | (other, lit @ CompiledOperand::Literal(_)) => {
            let (Some(declared), CompiledOperand::Literal(value)) = (other.declared(), lit) else {
                return Ok(());
            };
            check_literal(other, &declared, op, value)
        }
        _ => {
            let (Some(l), Some(r)) = (left.declared(), right.declared()) else {
                return Ok(());
            };
            if l == FieldType::Any || r == FieldType::Any {
                return Ok(());
            }
            let comparable = (l.is_numeric() && r.is_numeric()) || l.type_name() == r.type_name();
            if !comparable {
                return Err(TranslationError::type_mismatch(
                    operand_name(left),
                    l.type_name(),
                    format!("{} member", r.type_name()),
                ));
            }
            check_ordering(left, &l, op)
        }
    }
}

fn check_literal(
    operand: &CompiledOperand,
    declared: &FieldType,
    op: CompareOp,
    literal: &Value,
) -> TranslationResult<()> {
    if *declared == FieldType::Any {
        return Ok(());
    }
    let compatible = match literal {
        // Optional members compare against null
        Value::Null => op.is_equality(),
        Value::Bool(_) => *declared == FieldType::Bool,
        Value::Number(_) => declared.is_numeric(),
        Value::String(_) => *declared == FieldType::String,
        Value::Array(_) => matches!(declared, FieldType::Array { .. }),
        Value::Object(_) => matches!(declared, FieldType::Object { .. }),
    };
    if !compatible {
        return Err(TranslationError::type_mismatch(
            operand_name(operand),
            declared.type_name(),
            format!("{} literal {}", json_type_name(literal), literal),
        ));
    }
    check_ordering(operand, declared, op)
}

fn check_ordering(operand: &CompiledOperand, declared: &FieldType, op: CompareOp) -> TranslationResult<()> {
    let ordered = declared.is_numeric() || *declared == FieldType::String || *declared == FieldType::Any;
    if op.is_equality() || ordered {
        return Ok(());
    }
    Err(TranslationError::type_mismatch(
        operand_name(operand),
        declared.type_name(),
        format!("operator {}", op),
    ))
}

fn operand_name(operand: &CompiledOperand) -> String {
    match operand {
        CompiledOperand::Member(accessor) => accessor.path().to_string(),
        CompiledOperand::Literal(v) => v.to_string(),
        CompiledOperand::Length(inner) => format!("length({})", operand_name(inner)),
    }
}
