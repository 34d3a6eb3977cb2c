//! Streaming executor
//!
//! Reads candidates one at a time from a forward-only source. Memory stays
//! bounded by the reader's buffer plus one element, except when the plan
//! sorts: then survivors are held until the source ends. Without a sort the
//! source is not read past the point where the take budget runs out.
//!
//! Errors surface at the element where they occur, after every earlier
//! element has been yielded.

use std::io::Read;
use std::vec;

use futures_util::stream;
use serde_json::Value;
use tokio::io::AsyncRead;

use super::async_iter::{cancellable, CancellationSignal, ElementStream};
use super::errors::{ExecutorError, ExecutorResult};
use super::pipeline::{ExecutionContext, Pipeline};
use super::result::{Elements, ExecutorKind};
use crate::path::PathQuery;
use crate::planner::ExecutionPlan;
use crate::reader::{AsyncElementReader, ElementReader, Matched, ReadResult};

/// Runs a plan over a forward-only byte source. The caller owns opening and
/// closing the underlying handle.
#[derive(Debug)]
pub struct StreamExecutor<R> {
    source: R,
    path: Option<PathQuery>,
    ctx: ExecutionContext,
}

impl<R> StreamExecutor<R> {
    pub fn new(source: R, path: Option<PathQuery>, ctx: ExecutionContext) -> Self {
        Self { source, path, ctx }
    }

    pub fn kind(&self) -> ExecutorKind {
        ExecutorKind::select(true, self.path.is_some())
    }
}

impl<R: Read> StreamExecutor<R> {
    pub fn execute<'a>(self, plan: &ExecutionPlan) -> ExecutorResult<Elements<'a>>
    where
        R: 'a,
    {
        let pipeline = Pipeline::new(plan, self.kind(), &self.ctx);
        if plan.is_empty_result() {
            pipeline.complete();
            return Ok(Elements::empty());
        }
        let reader = ElementReader::new(self.source, self.path.as_ref(), &self.ctx.reader);
        Ok(Elements::new(SyncRun {
            reader,
            run: Run::new(pipeline),
        }))
    }
}

impl<R: AsyncRead + Unpin + Send> StreamExecutor<R> {
    /// Asynchronous, cancellable pull over the same sequence as `execute`
    pub fn execute_async<'a>(self, plan: &ExecutionPlan, cancel: CancellationSignal) -> ElementStream<'a>
    where
        R: 'a,
    {
        let pipeline = Pipeline::new(plan, self.kind(), &self.ctx);
        if plan.is_empty_result() {
            pipeline.complete();
            return cancellable(stream::empty(), cancel);
        }
        let reader = AsyncElementReader::new(
            self.source,
            self.path.as_ref(),
            &self.ctx.reader,
            self.ctx.pool.clone(),
        );
        let state = AsyncRun {
            reader,
            run: Run::new(pipeline),
            cancel: cancel.clone(),
        };
        let inner = stream::unfold(state, |mut state| async move {
            let item = state.next().await?;
            Some((item, state))
        });
        cancellable(inner, cancel)
    }
}

/// Pull-side state shared by the sync and async runs
struct Run {
    pipeline: Pipeline,
    drained: Option<vec::IntoIter<Value>>,
    done: bool,
}

enum Next {
    Item(Option<ExecutorResult<Value>>),
    Pull,
}

impl Run {
    fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            drained: None,
            done: false,
        }
    }

    /// What to do before pulling another candidate
    fn poll(&mut self) -> Next {
        if self.done {
            return Next::Item(None);
        }
        if let Some(drained) = &mut self.drained {
            let next = drained.next();
            if next.is_none() {
                self.finish();
            }
            return Next::Item(next.map(Ok));
        }
        if self.pipeline.is_finished() {
            self.finish();
            return Next::Item(None);
        }
        Next::Pull
    }

    /// Handles one pulled candidate; `None` means pull again
    fn accept(&mut self, pulled: Option<ReadResult<Matched>>) -> Option<Option<ExecutorResult<Value>>> {
        let matched = match pulled {
            None => {
                self.drained = Some(self.pipeline.drain().into_iter());
                return None;
            }
            Some(Err(err)) => return Some(Some(Err(self.fail(err.into())))),
            Some(Ok(matched)) => matched,
        };
        let value = match matched.into_value() {
            Ok(value) => value,
            Err(err) => return Some(Some(Err(self.fail(err.into())))),
        };
        match self.pipeline.push(value) {
            Ok(Some(element)) => Some(Some(Ok(element))),
            Ok(None) => None,
            Err(err) => Some(Some(Err(self.fail(err)))),
        }
    }

    fn fail(&mut self, err: ExecutorError) -> ExecutorError {
        self.done = true;
        self.pipeline.fault(err)
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.pipeline.complete();
        }
    }
}

struct SyncRun<R> {
    reader: ElementReader<R>,
    run: Run,
}

impl<R: Read> Iterator for SyncRun<R> {
    type Item = ExecutorResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.run.poll() {
                Next::Item(item) => return item,
                Next::Pull => {
                    let pulled = self.reader.next_match();
                    if let Some(item) = self.run.accept(pulled) {
                        return item;
                    }
                }
            }
        }
    }
}

struct AsyncRun<R> {
    reader: AsyncElementReader<R>,
    run: Run,
    cancel: CancellationSignal,
}

impl<R: AsyncRead + Unpin> AsyncRun<R> {
    async fn next(&mut self) -> Option<ExecutorResult<Value>> {
        loop {
            match self.run.poll() {
                Next::Item(item) => return item,
                Next::Pull => {
                    let pulled = self.reader.next_match(&self.cancel).await;
                    if let Some(item) = self.run.accept(pulled) {
                        return item;
                    }
                }
            }
        }
    }
}

impl<R> Drop for AsyncRun<R> {
    /// The adapter drops the run as soon as it observes cancellation
    fn drop(&mut self) {
        if !self.run.done && self.cancel.is_cancelled() {
            self.run.fail(ExecutorError::cancelled());
        }
    }
}
