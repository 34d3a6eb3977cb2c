//! Plan application over a candidate sequence
//!
//! Every executor feeds candidates through a [`Pipeline`] in source order.
//! Each candidate is conformed to the declared element type, then tested
//! against the predicates. Without sort keys, skip/take run as counters and
//! [`Pipeline::is_finished`] reports when the take budget is spent so the
//! caller can stop reading. With sort keys, survivors are held until
//! [`Pipeline::drain`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::errors::{ExecutorError, ExecutorResult};
use super::result::ExecutorKind;
use super::sorter::ElementSorter;
use crate::config::{EngineConfig, ReaderConfig, ShapePolicy};
use crate::observability::MetricsRegistry;
use crate::planner::ExecutionPlan;
use crate::reader::BufferPool;
use crate::schema::conform;

/// Settings and shared resources an executor runs with
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub reader: ReaderConfig,
    pub shape_policy: ShapePolicy,
    pub metrics: Arc<MetricsRegistry>,
    pub pool: BufferPool,
}

impl ExecutionContext {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            reader: config.reader.clone(),
            shape_policy: config.shape_policy,
            metrics: Arc::new(MetricsRegistry::new()),
            pool: BufferPool::new(config.reader.async_buffer_size, config.reader.pool_retain),
        }
    }

    pub fn with_shape_policy(mut self, policy: ShapePolicy) -> Self {
        self.shape_policy = policy;
        self
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[derive(Debug)]
pub(crate) struct Pipeline {
    plan: ExecutionPlan,
    kind: ExecutorKind,
    policy: ShapePolicy,
    metrics: Arc<MetricsRegistry>,
    candidates: u64,
    skip_left: usize,
    take_left: Option<usize>,
    /// Survivors held for sorting
    held: Option<Vec<Value>>,
}

impl Pipeline {
    pub(crate) fn new(plan: &ExecutionPlan, kind: ExecutorKind, ctx: &ExecutionContext) -> Self {
        debug!(
            executor = %kind,
            predicates = plan.predicates().len(),
            sort_keys = plan.sort_keys().len(),
            "executor selected"
        );
        Self {
            plan: plan.clone(),
            kind,
            policy: ctx.shape_policy,
            metrics: ctx.metrics.clone(),
            candidates: 0,
            skip_left: plan.skip(),
            take_left: plan.take(),
            held: plan.has_sort().then(Vec::new),
        }
    }

    /// True once nothing more can be emitted
    pub(crate) fn is_finished(&self) -> bool {
        self.held.is_none() && self.take_left == Some(0)
    }

    /// Feeds one candidate. Returns the element to emit now, if any.
    pub(crate) fn push(&mut self, candidate: Value) -> ExecutorResult<Option<Value>> {
        let Some(element) = self.admit(candidate)? else {
            return Ok(None);
        };
        if let Some(held) = &mut self.held {
            held.push(element);
            return Ok(None);
        }
        Ok(self.window(element))
    }

    /// Called once the source is exhausted; returns the sorted remainder
    pub(crate) fn drain(&mut self) -> Vec<Value> {
        let Some(mut held) = self.held.take() else {
            return Vec::new();
        };
        ElementSorter::sort(&mut held, self.plan.sort_keys());
        let mut out = Vec::new();
        for element in held {
            if self.take_left == Some(0) {
                break;
            }
            if let Some(shaped) = self.window(element) {
                out.push(shaped);
            }
        }
        out
    }

    /// Records the end of a successful run
    pub(crate) fn complete(&self) {
        self.metrics.increment_queries_executed();
        debug!(executor = %self.kind, candidates = self.candidates, "query finished");
    }

    /// Records a failed or cancelled run and passes the error on
    pub(crate) fn fault(&self, err: ExecutorError) -> ExecutorError {
        if err.is_cancelled() {
            self.metrics.increment_queries_cancelled();
            debug!(executor = %self.kind, candidates = self.candidates, "query cancelled");
        } else {
            self.metrics.increment_queries_faulted();
            debug!(executor = %self.kind, candidates = self.candidates, error = %err, "query faulted");
        }
        err
    }

    fn admit(&mut self, candidate: Value) -> ExecutorResult<Option<Value>> {
        let position = self.candidates;
        self.candidates += 1;
        self.metrics.increment_elements_scanned();

        let element = match conform(self.plan.source_schema(), candidate) {
            Ok(element) => element,
            Err(mismatch) => match self.policy {
                ShapePolicy::Abort => return Err(ExecutorError::shape_mismatch(position, &mismatch)),
                ShapePolicy::Skip => {
                    warn!(
                        element = position,
                        field = %mismatch.field,
                        expected = %mismatch.expected,
                        actual = %mismatch.actual,
                        "element skipped: shape mismatch"
                    );
                    self.metrics.increment_elements_skipped();
                    return Ok(None);
                }
            },
        };
        Ok(self.plan.matches(&element).then_some(element))
    }

    fn window(&mut self, element: Value) -> Option<Value> {
        if self.skip_left > 0 {
            self.skip_left -= 1;
            return None;
        }
        match &mut self.take_left {
            Some(0) => return None,
            Some(n) => *n -= 1,
            None => {}
        }
        self.metrics.increment_elements_emitted();
        Some(self.plan.shape(element))
    }
}
