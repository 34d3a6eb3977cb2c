//! Streaming execution guarantees
//!
//! Test Categories:
//! 1. Streaming / whole-buffer equivalence
//! 2. Skip/take arithmetic
//! 3. Mid-token refills
//! 4. Buffer pool accounting under faults and cancellation
//! 5. Wrong-shaped elements under both policies

use std::collections::BTreeMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, ReadBuf};

use jsonflow::executor::{BufferExecutor, ExecutionContext, StreamExecutor};
use jsonflow::{
    CancellationSignal, ElementSchema, FieldDef, FilterExpr, OperatorChain, PathQuery, QueryEngine, ShapePolicy,
};

/// Hands out one byte per poll so every token spans many refills
struct OneByte {
    data: Vec<u8>,
    pos: usize,
}

impl OneByte {
    fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl AsyncRead for OneByte {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.pos < self.data.len() && buf.remaining() > 0 {
            let byte = self.data[self.pos];
            buf.put_slice(&[byte]);
            self.pos += 1;
        }
        Poll::Ready(Ok(()))
    }
}

fn people() -> Value {
    Value::Array(
        (0..50)
            .map(|i| {
                json!({
                    "id": i,
                    "age": 18 + (i * 17) % 60,
                    "name": format!("person \"{}\" \u{e9}", i),
                    "active": i % 4 != 1,
                    "score": (i as f64) * 1.5e-1,
                })
            })
            .collect(),
    )
}

fn filter(text: &str) -> FilterExpr {
    FilterExpr::parse(text).unwrap()
}

fn run_both(doc: &[u8], path: Option<&str>, chain: &OperatorChain) -> (Vec<Value>, Vec<Value>) {
    let engine = QueryEngine::default();
    let schema = ElementSchema::dynamic();
    let path = path.map(|p| PathQuery::parse(p).unwrap());
    let whole = engine.run_buffer(doc, path.clone(), chain, &schema).unwrap().into_values();
    let streamed = engine
        .run_stream(Cursor::new(doc), path, chain, &schema)
        .unwrap()
        .into_values();
    (whole, streamed)
}

fn strict_schema() -> ElementSchema {
    let mut fields = BTreeMap::new();
    fields.insert("n".to_string(), FieldDef::required_int());
    ElementSchema::object("strict", fields)
}

// =============================================================================
// STREAMING / WHOLE-BUFFER EQUIVALENCE
// =============================================================================

#[test]
fn test_streaming_matches_whole_buffer() {
    let doc = serde_json::to_vec(&json!({"data": people()})).unwrap();
    let chains = [
        OperatorChain::new(),
        OperatorChain::new().filter(filter("@.age > 40")),
        OperatorChain::new().filter(filter("@.active == true")).order_by("age", false).then_by("id", true),
        OperatorChain::new().skip(7).take(9),
        OperatorChain::new().order_by("score", true).take(3).filter(filter("@.id > 0")),
    ];
    for chain in &chains {
        let (whole, streamed) = run_both(&doc, Some("$.data[*]"), chain);
        assert_eq!(whole, streamed);
    }

    let bare = serde_json::to_vec(&people()).unwrap();
    for chain in &chains {
        let (whole, streamed) = run_both(&bare, None, chain);
        assert_eq!(whole, streamed);
    }
}

#[test]
fn test_streaming_path_matches_in_memory_predicate() {
    let doc = json!({"data": people()});
    let bytes = serde_json::to_vec(&doc).unwrap();
    let (_, streamed) = run_both(&bytes, Some("$.data[?@.age >= 30 && @.active == true]"), &OperatorChain::new());
    let expected: Vec<Value> = doc["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["age"].as_i64().unwrap() >= 30 && p["active"] == json!(true))
        .cloned()
        .collect();
    assert_eq!(streamed, expected);
}

#[test]
fn test_predicate_order_does_not_change_sorted_output() {
    let doc = serde_json::to_vec(&people()).unwrap();
    let a = OperatorChain::new()
        .filter(filter("@.age > 25"))
        .filter(filter("@.active == true"))
        .order_by("age", true)
        .then_by("id", false);
    let b = OperatorChain::new()
        .filter(filter("@.active == true"))
        .filter(filter("@.age > 25"))
        .order_by("age", true)
        .then_by("id", false);
    assert_eq!(run_both(&doc, None, &a), run_both(&doc, None, &b));
}

// =============================================================================
// SKIP / TAKE
// =============================================================================

#[test]
fn test_skip_take_length_formula() {
    for len in [0usize, 1, 5, 10] {
        let doc = serde_json::to_vec(&(0..len).collect::<Vec<_>>()).unwrap();
        for n in 0..12usize {
            for m in 0..12usize {
                let chain = OperatorChain::new().skip(n).take(m);
                let expected = m.min(len.saturating_sub(n));
                let (whole, streamed) = run_both(&doc, None, &chain);
                assert_eq!(whole.len(), expected, "L={} n={} m={}", len, n, m);
                assert_eq!(whole, streamed);

                let (again, _) = run_both(&doc, None, &chain);
                assert_eq!(whole, again);
                if let Some(first) = whole.first() {
                    assert_eq!(first, &json!(n));
                }
            }
        }
    }
}

#[test]
fn test_take_zero_never_reads_source() {
    let engine = QueryEngine::default();
    let out = engine
        .run_stream(Cursor::new(b"{{{ not json".to_vec()), None, &OperatorChain::new().take(0), &ElementSchema::dynamic())
        .unwrap();
    assert!(out.into_values().is_empty());
}

// =============================================================================
// MID-TOKEN REFILLS
// =============================================================================

#[tokio::test]
async fn test_one_byte_reads_match_whole_buffer() {
    let doc = serde_json::to_vec(&json!({"data": people(), "tail": [1.5e3, -0.25, "x\\u0041"]})).unwrap();
    let chain = OperatorChain::new().filter(filter("@.age < 50")).order_by("name", true);
    let path = PathQuery::parse("$.data[*]").unwrap();
    let engine = QueryEngine::default();

    let whole = engine
        .run_buffer(&doc, Some(path.clone()), &chain, &ElementSchema::dynamic())
        .unwrap();
    let streamed = engine
        .run_async(OneByte::new(doc), Some(path), &chain, &ElementSchema::dynamic(), CancellationSignal::new())
        .await
        .unwrap();
    assert_eq!(whole, streamed);
    assert_eq!(engine.context().pool.outstanding(), 0);
}

#[tokio::test]
async fn test_one_byte_reads_report_truncation() {
    let engine = QueryEngine::default();
    let err = engine
        .run_async(OneByte::new(&b"[1, 2, {\"a\": tr"[..]), None, &OperatorChain::new(), &ElementSchema::dynamic(), CancellationSignal::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("FLOW_DESERIALIZATION"));
}

// =============================================================================
// BUFFER POOL ACCOUNTING
// =============================================================================

#[tokio::test]
async fn test_pool_returns_to_baseline_after_faults_and_cancellation() {
    let ctx = ExecutionContext::default();
    let baseline = ctx.pool.outstanding();
    let plan = QueryEngine::default()
        .translate(&OperatorChain::new(), &ElementSchema::dynamic())
        .unwrap()
        .plan;
    let good = serde_json::to_vec(&people()).unwrap();

    for round in 0..6 {
        let cancel = CancellationSignal::new();
        match round % 3 {
            0 => {
                let items: Vec<_> = StreamExecutor::new(OneByte::new(good.clone()), None, ctx.clone())
                    .execute_async(&plan, cancel)
                    .collect()
                    .await;
                assert!(items.iter().all(Result::is_ok));
            }
            1 => {
                let items: Vec<_> = StreamExecutor::new(Cursor::new(b"[1, 2, ]".to_vec()), None, ctx.clone())
                    .execute_async(&plan, cancel)
                    .collect()
                    .await;
                assert!(items.last().unwrap().is_err());
            }
            _ => {
                let mut stream =
                    StreamExecutor::new(OneByte::new(good.clone()), None, ctx.clone()).execute_async(&plan, cancel.clone());
                assert!(stream.next().await.unwrap().is_ok());
                cancel.cancel();
                assert!(stream.next().await.unwrap().unwrap_err().is_cancelled());
                assert!(stream.next().await.is_none());
            }
        }
        assert_eq!(ctx.pool.outstanding(), baseline, "round {}", round);
    }

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.queries_cancelled, 2);
    assert_eq!(snapshot.queries_faulted, 2);
}

#[tokio::test]
async fn test_cancel_before_first_poll_yields_only_cancellation() {
    let ctx = ExecutionContext::default();
    let plan = QueryEngine::default()
        .translate(&OperatorChain::new(), &ElementSchema::dynamic())
        .unwrap()
        .plan;
    let cancel = CancellationSignal::new();
    cancel.cancel();
    let items: Vec<_> = StreamExecutor::new(Cursor::new(b"[1, 2, 3]".to_vec()), None, ctx.clone())
        .execute_async(&plan, cancel)
        .collect()
        .await;
    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().unwrap_err().is_cancelled());
    assert_eq!(ctx.pool.outstanding(), 0);
}

// =============================================================================
// WRONG-SHAPED ELEMENTS
// =============================================================================

const MIXED: &[u8] = br#"[{"n": 1}, {"n": "two"}, {"n": 3.0}, {"m": 4}]"#;

#[test]
fn test_abort_policy_in_buffer_mode_yields_nothing() {
    let plan = QueryEngine::default()
        .translate(&OperatorChain::new(), &strict_schema())
        .unwrap()
        .plan;
    let err = BufferExecutor::new(MIXED, None, ExecutionContext::default())
        .execute(&plan)
        .unwrap_err();
    assert_eq!(err.code().code(), "FLOW_SHAPE_MISMATCH");
    assert_eq!(err.element(), Some(1));
}

#[test]
fn test_abort_policy_in_stream_mode_yields_earlier_elements() {
    let plan = QueryEngine::default()
        .translate(&OperatorChain::new(), &strict_schema())
        .unwrap()
        .plan;
    let items: Vec<_> = StreamExecutor::new(Cursor::new(MIXED), None, ExecutionContext::default())
        .execute(&plan)
        .unwrap()
        .collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], Ok(json!({"n": 1})));
    assert_eq!(items[1].as_ref().unwrap_err().code().code(), "FLOW_SHAPE_MISMATCH");
}

#[test]
fn test_skip_policy_drops_and_counts() {
    let plan = QueryEngine::default()
        .translate(&OperatorChain::new(), &strict_schema())
        .unwrap()
        .plan;
    let ctx = ExecutionContext::default().with_shape_policy(ShapePolicy::Skip);

    let whole = BufferExecutor::new(MIXED, None, ctx.clone())
        .execute(&plan)
        .unwrap()
        .collect_values()
        .unwrap();
    let streamed = StreamExecutor::new(Cursor::new(MIXED), None, ctx.clone())
        .execute(&plan)
        .unwrap()
        .collect_values()
        .unwrap();
    assert_eq!(whole, vec![json!({"n": 1}), json!({"n": 3})]);
    assert_eq!(whole, streamed);
    assert_eq!(ctx.metrics.snapshot().elements_skipped, 4);
}

#[test]
fn test_malformed_bytes_abort_even_under_skip_policy() {
    let plan = QueryEngine::default()
        .translate(&OperatorChain::new(), &strict_schema())
        .unwrap()
        .plan;
    let ctx = ExecutionContext::default().with_shape_policy(ShapePolicy::Skip);
    let items: Vec<_> = StreamExecutor::new(Cursor::new(&br#"[{"n": 1}, {"n": }]"#[..]), None, ctx)
        .execute(&plan)
        .unwrap()
        .collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].as_ref().unwrap_err().code().code(), "FLOW_DESERIALIZATION");
}
