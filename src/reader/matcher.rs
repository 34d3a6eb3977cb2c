//! MatchState: decides, while tokens arrive, which values are selected
//!
//! One frame per navigated container records the step governing its
//! children plus the cursors needed to decide them. Values outside every
//! selection are skipped without being materialized. Selected values are
//! captured as raw bytes and queued as [`Matched`].

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;

use super::errors::ReadResult;
use super::lexer::{TokenSink, ValueKind};
use crate::path::steps::{Admission, Candidate, ChildKey, Step, StepMode};
use crate::path::{evaluate_steps, PathQuery, Segment};

/// A selected value
#[derive(Debug, Clone, PartialEq)]
pub enum Matched {
    /// Raw bytes of the value, not yet deserialized
    Span(Vec<u8>),
    /// Value already materialized to evaluate a filter
    Value(Value),
}

impl Matched {
    pub fn into_value(self) -> ReadResult<Value> {
        match self {
            Matched::Span(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Matched::Value(v) => Ok(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OwnedKey {
    Member(String),
    Index(usize),
}

impl OwnedKey {
    fn as_key(&self) -> ChildKey<'_> {
        match self {
            OwnedKey::Member(name) => ChildKey::Member(name),
            OwnedKey::Index(i) => ChildKey::Index(*i),
        }
    }
}

/// A child captured while its container is buffered
#[derive(Debug)]
struct BufferedChild {
    key: OwnedKey,
    value: Value,
}

impl Candidate for BufferedChild {
    fn key(&self) -> ChildKey<'_> {
        self.key.as_key()
    }

    fn value(&self) -> &Value {
        &self.value
    }
}

#[derive(Debug)]
struct MatchFrame {
    is_object: bool,
    /// Step applied to this container's children
    step: usize,
    next_index: usize,
    pending_member: Option<String>,
    needs_names: bool,
    counters: Vec<usize>,
    buffered: Vec<BufferedChild>,
}

#[derive(Debug)]
enum Purpose {
    Emit,
    /// Decide at the value's end, resuming admission at `stage`
    Evaluate { key: OwnedKey, stage: usize },
    Buffer { key: OwnedKey },
}

#[derive(Debug)]
enum Mode {
    Navigate,
    Skip { depth: usize },
    Capture {
        depth: usize,
        buf: Vec<u8>,
        purpose: Purpose,
    },
}

/// Per-enumeration selection state; owned by one reader
#[derive(Debug)]
pub struct MatchState {
    steps: Arc<[Step]>,
    /// No path: a root array yields its elements, any other root itself
    elements_of_root: bool,
    frames: Vec<MatchFrame>,
    mode: Mode,
    ready: VecDeque<Matched>,
}

impl MatchState {
    pub fn new(path: Option<&PathQuery>) -> Self {
        let (steps, elements_of_root) = match path {
            Some(query) => (Arc::clone(query.steps()), false),
            None => (Arc::from(Vec::new()), true),
        };
        Self {
            steps,
            elements_of_root,
            frames: Vec::new(),
            mode: Mode::Navigate,
            ready: VecDeque::new(),
        }
    }

    pub fn pop(&mut self) -> Option<Matched> {
        self.ready.pop_front()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    fn is_last(&self, step: usize) -> bool {
        step + 1 >= self.steps.len()
    }

    fn push_frame(&mut self, is_object: bool, step: usize) {
        let stages = self.steps[step].stages();
        self.frames.push(MatchFrame {
            is_object,
            step,
            next_index: 0,
            pending_member: None,
            needs_names: is_object && matches!(stages.first(), Some(Segment::Name(_))),
            counters: vec![0; stages.len()],
            buffered: Vec::new(),
        });
    }

    fn capture(&mut self, purpose: Purpose) {
        self.mode = Mode::Capture {
            depth: 1,
            buf: Vec::new(),
            purpose,
        };
    }

    fn root_start(&mut self, kind: ValueKind) {
        if self.elements_of_root && kind == ValueKind::Array {
            self.steps = Arc::clone(PathQuery::from_segments(vec![Segment::Wildcard]).steps());
        }
        if self.steps.is_empty() {
            self.capture(Purpose::Emit);
        } else if kind.is_container() {
            self.push_frame(kind == ValueKind::Object, 0);
        } else {
            self.mode = Mode::Skip { depth: 1 };
        }
    }

    fn child_start(&mut self, kind: ValueKind) {
        let steps = Arc::clone(&self.steps);
        let Some(frame) = self.frames.last_mut() else {
            return;
        };

        let key = if frame.is_object {
            OwnedKey::Member(frame.pending_member.take().unwrap_or_default())
        } else {
            let i = frame.next_index;
            frame.next_index += 1;
            OwnedKey::Index(i)
        };

        let step_index = frame.step;
        let step = &steps[step_index];
        if step.mode() == StepMode::Buffered {
            self.capture(Purpose::Buffer { key });
            return;
        }

        match step.admit(0, &mut frame.counters, key.as_key(), None) {
            Admission::Rejected => self.mode = Mode::Skip { depth: 1 },
            Admission::Pending(stage) => self.capture(Purpose::Evaluate { key, stage }),
            Admission::Accepted if self.is_last(step_index) => self.capture(Purpose::Emit),
            Admission::Accepted if kind.is_container() => {
                self.push_frame(kind == ValueKind::Object, step_index + 1)
            }
            Admission::Accepted => self.mode = Mode::Skip { depth: 1 },
        }
    }

    fn finish_capture(&mut self, buf: Vec<u8>, purpose: Purpose) -> ReadResult<()> {
        match purpose {
            Purpose::Emit => self.ready.push_back(Matched::Span(buf)),
            Purpose::Evaluate { key, stage } => {
                let value: Value = serde_json::from_slice(&buf)?;
                let steps = Arc::clone(&self.steps);
                let Some(frame) = self.frames.last_mut() else {
                    return Ok(());
                };
                let step_index = frame.step;
                let admitted =
                    steps[step_index].admit(stage, &mut frame.counters, key.as_key(), Some(&value));
                if admitted == Admission::Accepted {
                    self.emit_from(step_index, value);
                }
            }
            Purpose::Buffer { key } => {
                let value: Value = serde_json::from_slice(&buf)?;
                if let Some(frame) = self.frames.last_mut() {
                    frame.buffered.push(BufferedChild { key, value });
                }
            }
        }
        Ok(())
    }

    /// Emits a value selected by step `step_index`, applying the remaining
    /// steps to it in memory.
    fn emit_from(&mut self, step_index: usize, value: Value) {
        if self.is_last(step_index) {
            self.ready.push_back(Matched::Value(value));
            return;
        }
        let rest = &self.steps[step_index + 1..];
        let selected: Vec<Value> = evaluate_steps(rest, &value).into_iter().cloned().collect();
        self.ready.extend(selected.into_iter().map(Matched::Value));
    }

    fn close_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let steps = Arc::clone(&self.steps);
        let step = &steps[frame.step];
        if step.is_buffered() {
            for child in step.select_list(frame.buffered) {
                self.emit_from(frame.step, child.value);
            }
        }
    }
}

impl TokenSink for MatchState {
    fn value_start(&mut self, kind: ValueKind) {
        if let Mode::Skip { depth } | Mode::Capture { depth, .. } = &mut self.mode {
            *depth += 1;
            return;
        }
        if self.frames.is_empty() {
            self.root_start(kind);
        } else {
            self.child_start(kind);
        }
    }

    fn member(&mut self, name: String) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pending_member = Some(name);
        }
    }

    fn wants_member(&self) -> bool {
        matches!(self.mode, Mode::Navigate) && self.frames.last().is_some_and(|f| f.needs_names)
    }

    fn byte(&mut self, b: u8) {
        if let Mode::Capture { buf, .. } = &mut self.mode {
            buf.push(b);
        }
    }

    fn value_end(&mut self) -> ReadResult<()> {
        let remaining = match &mut self.mode {
            Mode::Skip { depth } | Mode::Capture { depth, .. } => {
                *depth -= 1;
                *depth
            }
            Mode::Navigate => {
                self.close_frame();
                return Ok(());
            }
        };
        if remaining > 0 {
            return Ok(());
        }
        match std::mem::replace(&mut self.mode, Mode::Navigate) {
            Mode::Capture { buf, purpose, .. } => self.finish_capture(buf, purpose),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::lexer::Lexer;
    use serde_json::json;

    fn run(path: Option<&str>, doc: &str, chunk: usize) -> Vec<Value> {
        let query = path.map(|p| PathQuery::parse(p).unwrap());
        let mut state = MatchState::new(query.as_ref());
        let mut lexer = Lexer::new(64);
        for part in doc.as_bytes().chunks(chunk) {
            lexer.feed(part, &mut state).unwrap();
        }
        lexer.finish(&mut state).unwrap();
        let mut out = Vec::new();
        while let Some(m) = state.pop() {
            out.push(m.into_value().unwrap());
        }
        out
    }

    fn ints(n: usize) -> String {
        serde_json::to_string(&(0..n).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_no_path_root_array_yields_elements() {
        assert_eq!(run(None, "[1, {\"a\": 2}]", 3), vec![json!(1), json!({"a": 2})]);
    }

    #[test]
    fn test_no_path_scalar_or_object_root_yields_itself() {
        assert_eq!(run(None, "{\"a\": [1]}", 2), vec![json!({"a": [1]})]);
        assert_eq!(run(None, "7", 1), vec![json!(7)]);
    }

    #[test]
    fn test_member_then_wildcard() {
        let doc = r#"{"meta": {"x": 1}, "data": [{"age": 25}, {"age": 31}]}"#;
        assert_eq!(
            run(Some("$.data[*]"), doc, 5),
            vec![json!({"age": 25}), json!({"age": 31})]
        );
    }

    #[test]
    fn test_member_names_case_insensitive() {
        let doc = r#"{"Data": {"Name": "x"}}"#;
        assert_eq!(run(Some("$.data.name"), doc, 4), vec![json!("x")]);
    }

    #[test]
    fn test_filter_step() {
        let doc = r#"[{"age": 25}, {"age": 31}]"#;
        assert_eq!(run(Some("$[?@.age > 25]"), doc, 1), vec![json!({"age": 31})]);
    }

    #[test]
    fn test_eager_slices() {
        assert_eq!(
            run(Some("$[2:5]"), &ints(10), 3),
            vec![json!(2), json!(3), json!(4)]
        );
        assert_eq!(
            run(Some("$[0:10:2]"), &ints(10), 2),
            vec![json!(0), json!(2), json!(4), json!(6), json!(8)]
        );
    }

    #[test]
    fn test_buffered_negative_slice() {
        assert_eq!(
            run(Some("$[-3:]"), &ints(10), 4),
            vec![json!(7), json!(8), json!(9)]
        );
        assert_eq!(run(Some("$[-1]"), &ints(10), 4), vec![json!(9)]);
    }

    #[test]
    fn test_filter_then_slice_in_document_order() {
        let doc: Vec<Value> = (0..12).map(|i| json!({"i": i, "active": i % 2 == 1})).collect();
        let doc = serde_json::to_string(&doc).unwrap();
        let got: Vec<Value> = run(Some("$[?@.active==true][0:5]"), &doc, 7)
            .into_iter()
            .map(|v| v["i"].clone())
            .collect();
        assert_eq!(got, vec![json!(1), json!(3), json!(5), json!(7), json!(9)]);
    }

    #[test]
    fn test_filter_on_non_final_step_continues_in_memory() {
        let doc = r#"[{"ok": true, "tags": ["a", "b"]}, {"ok": false, "tags": ["c"]}]"#;
        assert_eq!(
            run(Some("$[?@.ok == true].tags[*]"), doc, 3),
            vec![json!("a"), json!("b")]
        );
    }

    #[test]
    fn test_scalars_where_containers_expected() {
        assert!(run(Some("$.a.b"), r#"{"a": 1}"#, 2).is_empty());
        assert!(run(Some("$[0]"), r#"{"a": 1}"#, 2).is_empty());
        assert!(run(Some("$.a"), "5", 1).is_empty());
    }

    #[test]
    fn test_equivalent_to_in_memory_evaluation() {
        let doc = r#"{"items": [
            {"n": "a", "v": 3, "tags": [1, 2, 3]},
            {"n": "bb", "v": 9, "tags": []},
            {"n": "ccc", "v": 1, "tags": [7]},
            {"n": "d", "v": 4}
        ]}"#;
        let parsed: Value = serde_json::from_str(doc).unwrap();
        for path in [
            "$.items[*].n",
            "$.items[1:3]",
            "$.items[-2:]",
            "$.items[?@.v >= 3].tags[*]",
            "$.items[?length(@.n) > 1][0:1]",
            "$.items[*].tags[-1]",
            "$.items[::-1].v",
            "$[*]",
            "$",
        ] {
            let q = PathQuery::parse(path).unwrap();
            let expected: Vec<Value> = crate::path::evaluate(&q, &parsed)
                .into_iter()
                .cloned()
                .collect();
            for chunk in [1, 3, 64] {
                assert_eq!(run(Some(path), doc, chunk), expected, "{} / {}", path, chunk);
            }
        }
    }
}
