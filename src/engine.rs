//! Query engine facade
//!
//! Owns the configuration, compiler cache, buffer pool and metrics shared by
//! every query. Picks the executor for a source and finishes the query with
//! its in-memory post-processing.

use std::io::Read;
use std::sync::Arc;

use futures_util::TryStreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncRead;

use crate::compiler::{CacheStats, CompilerCache};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::executor::{
    apply_ops, reduce, BufferExecutor, CancellationSignal, Elements, ExecutionContext, StreamExecutor,
};
use crate::observability::MetricsSnapshot;
use crate::path::PathQuery;
use crate::planner::{ExecutionPlan, ExplainPlan, OperatorChain, PostProcess, TranslatedQuery, Translator};
use crate::schema::ElementSchema;

/// Final value of a query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Sequence(Vec<Value>),
    Scalar(Value),
}

impl QueryOutput {
    /// Elements in output order; a scalar is a one-element sequence
    pub fn into_values(self) -> Vec<Value> {
        match self {
            QueryOutput::Sequence(values) => values,
            QueryOutput::Scalar(value) => vec![value],
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            QueryOutput::Scalar(value) => Some(value),
            QueryOutput::Sequence(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: EngineConfig,
    cache: Arc<CompilerCache>,
    ctx: ExecutionContext,
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let ctx = ExecutionContext::new(&config);
        Self {
            config,
            cache: Arc::new(CompilerCache::new()),
            ctx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Context handed to executors created by this engine
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Translates a chain against the declared element type
    pub fn translate(&self, chain: &OperatorChain, schema: &ElementSchema) -> Result<TranslatedQuery> {
        match Translator::new(&self.cache).translate(chain, schema) {
            Ok(query) => {
                self.ctx.metrics.increment_queries_translated();
                Ok(query)
            }
            Err(err) => {
                self.ctx.metrics.increment_queries_rejected();
                Err(err.into())
            }
        }
    }

    /// Translation outcome as a readable plan; never fails
    pub fn explain(&self, chain: &OperatorChain, schema: &ElementSchema) -> ExplainPlan {
        match Translator::new(&self.cache).translate(chain, schema) {
            Ok(query) => ExplainPlan::from_query(&query),
            Err(err) => ExplainPlan::from_error(&err),
        }
    }

    /// Runs a chain over an in-memory document
    pub fn run_buffer(
        &self,
        source: &[u8],
        path: Option<PathQuery>,
        chain: &OperatorChain,
        schema: &ElementSchema,
    ) -> Result<QueryOutput> {
        let query = self.translate(chain, schema)?;
        let values = BufferExecutor::new(source, path, self.ctx.clone())
            .execute(&query.plan)?
            .collect_values()?;
        finish(&query.post, values)
    }

    /// Runs a chain over a forward-only source
    pub fn run_stream<R: Read>(
        &self,
        source: R,
        path: Option<PathQuery>,
        chain: &OperatorChain,
        schema: &ElementSchema,
    ) -> Result<QueryOutput> {
        let query = self.translate(chain, schema)?;
        let values = self.stream(source, path, &query.plan)?.collect_values()?;
        finish(&query.post, values)
    }

    /// Plan sequence over a forward-only source, pulled lazily
    pub fn stream<'a, R: Read + 'a>(
        &self,
        source: R,
        path: Option<PathQuery>,
        plan: &ExecutionPlan,
    ) -> Result<Elements<'a>> {
        Ok(StreamExecutor::new(source, path, self.ctx.clone()).execute(plan)?)
    }

    /// Runs a chain over an asynchronous source, stopping with
    /// `FLOW_CANCELLED` once `cancel` fires
    pub async fn run_async<R: AsyncRead + Unpin + Send>(
        &self,
        source: R,
        path: Option<PathQuery>,
        chain: &OperatorChain,
        schema: &ElementSchema,
        cancel: CancellationSignal,
    ) -> Result<QueryOutput> {
        let query = self.translate(chain, schema)?;
        let values: Vec<Value> = StreamExecutor::new(source, path, self.ctx.clone())
            .execute_async(&query.plan, cancel)
            .try_collect()
            .await?;
        finish(&query.post, values)
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Applies post-processing and the terminal reduction
pub fn finish(post: &PostProcess, values: Vec<Value>) -> Result<QueryOutput> {
    let values = apply_ops(post, values);
    match post.terminal() {
        Some(terminal) => Ok(QueryOutput::Scalar(reduce(terminal, values)?)),
        None => Ok(QueryOutput::Sequence(values)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FilterExpr;
    use crate::planner::Aggregate;
    use serde_json::json;
    use std::io::Cursor;

    const DOC: &[u8] = br#"[{"n":1,"g":"a"},{"n":2,"g":"b"},{"n":3,"g":"a"}]"#;

    #[test]
    fn test_run_buffer_sequence() {
        let engine = QueryEngine::default();
        let chain = OperatorChain::new().filter(FilterExpr::parse("@.n >= 2").unwrap());
        let out = engine.run_buffer(DOC, None, &chain, &ElementSchema::dynamic()).unwrap();
        assert_eq!(out.into_values().len(), 2);
    }

    #[test]
    fn test_run_stream_scalar() {
        let engine = QueryEngine::default();
        let chain = OperatorChain::new().aggregate(Aggregate::Sum("n".into()));
        let out = engine
            .run_stream(Cursor::new(DOC), None, &chain, &ElementSchema::dynamic())
            .unwrap();
        assert_eq!(out.as_scalar(), Some(&json!(6)));
    }

    #[test]
    fn test_translate_counts_rejections() {
        let engine = QueryEngine::default();
        let bad = OperatorChain::new().then_by("n", true);
        assert!(engine.translate(&bad, &ElementSchema::dynamic()).is_err());
        assert!(engine.translate(&OperatorChain::new(), &ElementSchema::dynamic()).is_ok());
        let metrics = engine.metrics();
        assert_eq!(metrics.queries_rejected, 1);
        assert_eq!(metrics.queries_translated, 1);
    }

    #[test]
    fn test_group_then_count() {
        let engine = QueryEngine::default();
        let chain = OperatorChain::new().group_by("g").aggregate(Aggregate::Count);
        let out = engine.run_buffer(DOC, None, &chain, &ElementSchema::dynamic()).unwrap();
        assert_eq!(out, QueryOutput::Scalar(json!(2)));
    }

    #[tokio::test]
    async fn test_run_async() {
        let engine = QueryEngine::default();
        let chain = OperatorChain::new().order_by("n", false).take(1);
        let out = engine
            .run_async(Cursor::new(DOC.to_vec()), None, &chain, &ElementSchema::dynamic(), CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(out.into_values(), vec![json!({"n": 3, "g": "a"})]);
        assert_eq!(engine.context().pool.outstanding(), 0);
    }
}
