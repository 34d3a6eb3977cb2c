//! Operator records
//!
//! A query is a flat list of tagged operator records appended in call order
//! and consumed once by the [`Translator`](super::Translator).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::path::{FieldPath, FilterExpr};
use crate::schema::ElementSchema;

/// Result shape produced by a projection
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Sequence of one member's values
    Field(FieldPath),
    /// Objects built from `(alias, member)` pairs, in the given order
    Object(Vec<(String, FieldPath)>),
}

impl Projection {
    pub fn field(path: impl Into<FieldPath>) -> Self {
        Projection::Field(path.into())
    }

    pub fn object<'a>(members: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Projection::Object(
            members
                .into_iter()
                .map(|(alias, path)| (alias.to_string(), FieldPath::from(path)))
                .collect(),
        )
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Field(path) => write!(f, "{}", path),
            Projection::Object(members) => {
                write!(f, "{{")?;
                for (i, (alias, path)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", alias, path)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Inner-join specification; the inner side is already materialized
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub inner: Arc<[Value]>,
    pub inner_schema: ElementSchema,
    pub outer_key: FieldPath,
    pub inner_key: FieldPath,
}

impl JoinSpec {
    pub fn new(
        inner: impl Into<Arc<[Value]>>,
        outer_key: impl Into<FieldPath>,
        inner_key: impl Into<FieldPath>,
    ) -> Self {
        Self {
            inner: inner.into(),
            inner_schema: ElementSchema::dynamic(),
            outer_key: outer_key.into(),
            inner_key: inner_key.into(),
        }
    }

    pub fn with_inner_schema(mut self, schema: ElementSchema) -> Self {
        self.inner_schema = schema;
        self
    }
}

/// Terminal reductions
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Count,
    Any,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    Last,
    ElementAt(usize),
    Min(FieldPath),
    Max(FieldPath),
    Sum(FieldPath),
    Average(FieldPath),
}

impl Aggregate {
    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Any => "any",
            Aggregate::First => "first",
            Aggregate::FirstOrDefault => "first_or_default",
            Aggregate::Single => "single",
            Aggregate::SingleOrDefault => "single_or_default",
            Aggregate::Last => "last",
            Aggregate::ElementAt(_) => "element_at",
            Aggregate::Min(_) => "min",
            Aggregate::Max(_) => "max",
            Aggregate::Sum(_) => "sum",
            Aggregate::Average(_) => "average",
        }
    }

    /// Member the reduction reads, if any
    pub fn member(&self) -> Option<&FieldPath> {
        match self {
            Aggregate::Min(p) | Aggregate::Max(p) | Aggregate::Sum(p) | Aggregate::Average(p) => {
                Some(p)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::ElementAt(n) => write!(f, "element_at({})", n),
            other => match other.member() {
                Some(path) => write!(f, "{}({})", other.name(), path),
                None => write!(f, "{}()", other.name()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Filter(FilterExpr),
    OrderBy { path: FieldPath, ascending: bool },
    ThenBy { path: FieldPath, ascending: bool },
    Skip(usize),
    Take(usize),
    Project(Projection),
    GroupBy { key: FieldPath },
    Join(JoinSpec),
    Aggregate(Aggregate),
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Filter(_) => "filter",
            Operator::OrderBy { .. } => "order_by",
            Operator::ThenBy { .. } => "then_by",
            Operator::Skip(_) => "skip",
            Operator::Take(_) => "take",
            Operator::Project(_) => "project",
            Operator::GroupBy { .. } => "group_by",
            Operator::Join(_) => "join",
            Operator::Aggregate(_) => "aggregate",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = |asc: &bool| if *asc { "asc" } else { "desc" };
        match self {
            Operator::Filter(expr) => write!(f, "filter({})", expr),
            Operator::OrderBy { path, ascending } => {
                write!(f, "order_by({} {})", path, direction(ascending))
            }
            Operator::ThenBy { path, ascending } => {
                write!(f, "then_by({} {})", path, direction(ascending))
            }
            Operator::Skip(n) => write!(f, "skip({})", n),
            Operator::Take(n) => write!(f, "take({})", n),
            Operator::Project(p) => write!(f, "project({})", p),
            Operator::GroupBy { key } => write!(f, "group_by({})", key),
            Operator::Join(spec) => write!(
                f,
                "join({} = {}, {} inner)",
                spec.outer_key,
                spec.inner_key,
                spec.inner.len()
            ),
            Operator::Aggregate(agg) => write!(f, "{}", agg),
        }
    }
}

/// Operator records in call order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorChain {
    operators: Vec<Operator>,
}

impl OperatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, op: Operator) -> Self {
        self.operators.push(op);
        self
    }

    pub fn filter(self, expr: FilterExpr) -> Self {
        self.push(Operator::Filter(expr))
    }

    pub fn order_by(self, path: impl Into<FieldPath>, ascending: bool) -> Self {
        self.push(Operator::OrderBy {
            path: path.into(),
            ascending,
        })
    }

    pub fn then_by(self, path: impl Into<FieldPath>, ascending: bool) -> Self {
        self.push(Operator::ThenBy {
            path: path.into(),
            ascending,
        })
    }

    pub fn skip(self, n: usize) -> Self {
        self.push(Operator::Skip(n))
    }

    pub fn take(self, n: usize) -> Self {
        self.push(Operator::Take(n))
    }

    pub fn project(self, projection: Projection) -> Self {
        self.push(Operator::Project(projection))
    }

    pub fn group_by(self, key: impl Into<FieldPath>) -> Self {
        self.push(Operator::GroupBy { key: key.into() })
    }

    pub fn join(self, spec: JoinSpec) -> Self {
        self.push(Operator::Join(spec))
    }

    pub fn aggregate(self, agg: Aggregate) -> Self {
        self.push(Operator::Aggregate(agg))
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
