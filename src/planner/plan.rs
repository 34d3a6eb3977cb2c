//! Execution plan and post-processing description
//!
//! An [`ExecutionPlan`] holds what every executor can apply while reading:
//! predicates, sort keys, skip/take and one projection. Anything after the
//! first operator the plan cannot express lands in [`PostProcess`] and runs
//! in memory over the plan's output.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::ast::{Aggregate, JoinSpec};
use crate::compiler::{CompiledPredicate, CompiledSelector, MemberAccessor};
use crate::path::FieldPath;
use crate::schema::ElementSchema;

/// One sort key; keys are applied primary first
#[derive(Debug, Clone)]
pub struct SortKey {
    pub path: FieldPath,
    pub accessor: Arc<MemberAccessor>,
    pub ascending: bool,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "asc" } else { "desc" };
        write!(f, "{} {}", self.accessor.path(), direction)
    }
}

/// Immutable description of one query over one source
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub(crate) source_schema: ElementSchema,
    pub(crate) result_schema: ElementSchema,
    pub(crate) predicates: Vec<Arc<CompiledPredicate>>,
    pub(crate) projection: Option<Arc<CompiledSelector>>,
    pub(crate) sort_keys: Vec<SortKey>,
    pub(crate) skip: usize,
    pub(crate) take: Option<usize>,
}

impl ExecutionPlan {
    /// Plan that passes every element through unchanged
    pub fn passthrough(schema: ElementSchema) -> Self {
        Self {
            result_schema: schema.clone(),
            source_schema: schema,
            predicates: Vec::new(),
            projection: None,
            sort_keys: Vec::new(),
            skip: 0,
            take: None,
        }
    }

    pub fn source_schema(&self) -> &ElementSchema {
        &self.source_schema
    }

    pub fn result_schema(&self) -> &ElementSchema {
        &self.result_schema
    }

    pub fn predicates(&self) -> &[Arc<CompiledPredicate>] {
        &self.predicates
    }

    pub fn projection(&self) -> Option<&CompiledSelector> {
        self.projection.as_deref()
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort_keys
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    /// `None` means unbounded
    pub fn take(&self) -> Option<usize> {
        self.take
    }

    pub fn has_sort(&self) -> bool {
        !self.sort_keys.is_empty()
    }

    /// True when the plan yields nothing regardless of the source
    pub fn is_empty_result(&self) -> bool {
        self.take == Some(0)
    }

    /// Runs the predicates in order, stopping at the first failure
    pub fn matches(&self, element: &Value) -> bool {
        self.predicates.iter().all(|p| p.test(element))
    }

    /// Applies the projection, if any
    pub fn shape(&self, element: Value) -> Value {
        match &self.projection {
            Some(selector) => selector.apply(&element),
            None => element,
        }
    }
}

/// In-memory operator applied after the plan
#[derive(Debug, Clone)]
pub enum RelationalOp {
    Filter(Arc<CompiledPredicate>),
    Sort(Vec<SortKey>),
    Skip(usize),
    Take(usize),
    Project(Arc<CompiledSelector>),
    GroupBy(Arc<MemberAccessor>),
    Join {
        spec: JoinSpec,
        outer: Arc<MemberAccessor>,
        inner: Arc<MemberAccessor>,
    },
}

impl fmt::Display for RelationalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationalOp::Filter(p) => write!(f, "filter({})", p.text()),
            RelationalOp::Sort(keys) => {
                let keys: Vec<String> = keys.iter().map(SortKey::to_string).collect();
                write!(f, "sort({})", keys.join(", "))
            }
            RelationalOp::Skip(n) => write!(f, "skip({})", n),
            RelationalOp::Take(n) => write!(f, "take({})", n),
            RelationalOp::Project(s) => write!(f, "project({})", s.result_schema().schema_id),
            RelationalOp::GroupBy(key) => write!(f, "group_by({})", key.path()),
            RelationalOp::Join { outer, inner, spec } => write!(
                f,
                "join({} = {}, {} inner)",
                outer.path(),
                inner.path(),
                spec.inner.len()
            ),
        }
    }
}

/// Terminal reduction with its member resolved
#[derive(Debug, Clone)]
pub struct Terminal {
    pub aggregate: Aggregate,
    pub accessor: Option<Arc<MemberAccessor>>,
}

/// Work done in memory after the plan's sequence is produced
#[derive(Debug, Clone, Default)]
pub struct PostProcess {
    pub(crate) ops: Vec<RelationalOp>,
    pub(crate) terminal: Option<Terminal>,
}

impl PostProcess {
    pub fn ops(&self) -> &[RelationalOp] {
        &self.ops
    }

    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.terminal.is_none()
    }
}

/// Output of translation
#[derive(Debug, Clone)]
pub struct TranslatedQuery {
    pub plan: ExecutionPlan,
    pub post: PostProcess,
}
