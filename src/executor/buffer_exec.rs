//! Whole-buffer executor
//!
//! The whole source is validated and deserialized before anything is
//! returned, so a failure anywhere fails the query with no partial results.

use futures_util::stream::{self, StreamExt};
use serde_json::Value;

use super::async_iter::{cancellable, CancellationSignal, ElementStream};
use super::errors::{ExecutorError, ExecutorResult};
use super::pipeline::{ExecutionContext, Pipeline};
use super::result::{Elements, ExecutorKind};
use crate::path::PathQuery;
use crate::planner::ExecutionPlan;
use crate::reader::scan_slice;

/// Runs plans over a contiguous in-memory document
#[derive(Debug, Clone)]
pub struct BufferExecutor<'a> {
    source: &'a [u8],
    path: Option<PathQuery>,
    ctx: ExecutionContext,
}

impl<'a> BufferExecutor<'a> {
    pub fn new(source: &'a [u8], path: Option<PathQuery>, ctx: ExecutionContext) -> Self {
        Self { source, path, ctx }
    }

    pub fn kind(&self) -> ExecutorKind {
        ExecutorKind::select(false, self.path.is_some())
    }

    pub fn execute(&self, plan: &ExecutionPlan) -> ExecutorResult<Elements<'static>> {
        self.run(plan).map(Elements::from_values)
    }

    /// Same sequence as [`execute`](Self::execute); the work starts on first
    /// poll unless cancellation is already requested.
    pub fn execute_async(&self, plan: &ExecutionPlan, cancel: CancellationSignal) -> ElementStream<'a> {
        let this = self.clone();
        let plan = plan.clone();
        let inner = stream::once(async move {
            match this.run(&plan) {
                Ok(values) => values.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(err)],
            }
        })
        .flat_map(stream::iter);
        cancellable(inner, cancel)
    }

    fn run(&self, plan: &ExecutionPlan) -> ExecutorResult<Vec<Value>> {
        let mut pipeline = Pipeline::new(plan, self.kind(), &self.ctx);
        if plan.is_empty_result() {
            pipeline.complete();
            return Ok(Vec::new());
        }

        let candidates = self.candidates().map_err(|e| pipeline.fault(e))?;
        let mut out = Vec::new();
        for candidate in candidates {
            if pipeline.is_finished() {
                break;
            }
            match pipeline.push(candidate) {
                Ok(Some(element)) => out.push(element),
                Ok(None) => {}
                Err(err) => return Err(pipeline.fault(err)),
            }
        }
        out.extend(pipeline.drain());
        pipeline.complete();
        Ok(out)
    }

    /// Every candidate element, in document order
    fn candidates(&self) -> ExecutorResult<Vec<Value>> {
        scan_slice(self.source, self.path.as_ref(), self.ctx.reader.max_depth)?
            .into_iter()
            .map(|m| m.into_value().map_err(ExecutorError::from))
            .collect()
    }
}
