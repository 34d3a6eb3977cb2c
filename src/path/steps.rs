//! Evaluation steps
//!
//! Segments are grouped into steps. Each step descends one level and may
//! refine the selected children with further filter/slice stages:
//!
//! ```text
//! $.data[*]               -> [Name(data)] [Wildcard]
//! $[?@.active==true][0:5] -> [Filter, Slice(0:5)]
//! ```
//!
//! A step is decided one of three ways while streaming (see [`StepMode`]).
//! The same stages drive list selection for materialized children, so both
//! paths share one definition of every segment.

use serde_json::Value;

use super::ast::{names_match, Segment};
use super::filter::evaluate_filter;

/// How a step is decided while streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Decided when the child starts, from its key and running counters
    Eager,
    /// A filter stage needs the child's value; decided when the child ends
    Filtered,
    /// A stage depends on the container length; decided when the container closes
    Buffered,
}

/// Identity of a child inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKey<'a> {
    Member(&'a str),
    Index(usize),
}

/// A materialized child offered to list selection
pub trait Candidate {
    fn key(&self) -> ChildKey<'_>;
    fn value(&self) -> &Value;
}

impl<'v> Candidate for (ChildKey<'v>, &'v Value) {
    fn key(&self) -> ChildKey<'_> {
        self.0
    }

    fn value(&self) -> &Value {
        self.1
    }
}

/// Outcome of single-pass admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Rejected,
    Accepted,
    /// Stopped at this stage, which needs the child's value
    Pending(usize),
}

/// One level of descent plus its refining stages
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    stages: Vec<Segment>,
    mode: StepMode,
}

impl Step {
    fn new(stages: Vec<Segment>) -> Self {
        let mode = if stages.iter().any(Segment::needs_length) {
            StepMode::Buffered
        } else if stages.iter().any(|s| matches!(s, Segment::Filter(_))) {
            StepMode::Filtered
        } else {
            StepMode::Eager
        };
        Self { stages, mode }
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    pub fn is_buffered(&self) -> bool {
        self.mode == StepMode::Buffered
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stages(&self) -> &[Segment] {
        &self.stages
    }

    /// Single-pass admission of one child, starting at stage `from`.
    ///
    /// `counters[k]` holds how many children have entered refining stage `k`
    /// so far within the current container. Only valid for steps that are
    /// not [`StepMode::Buffered`].
    pub fn admit(
        &self,
        from: usize,
        counters: &mut [usize],
        key: ChildKey<'_>,
        value: Option<&Value>,
    ) -> Admission {
        for (stage, segment) in self.stages.iter().enumerate().skip(from) {
            let passed = match segment {
                Segment::Filter(expr) => match value {
                    Some(v) => evaluate_filter(expr, v),
                    None => return Admission::Pending(stage),
                },
                _ if stage == 0 => head_admits(segment, key),
                Segment::Slice(spec) => {
                    let ordinal = counters[stage];
                    counters[stage] += 1;
                    spec.admits_forward(ordinal)
                }
                _ => false,
            };
            if !passed {
                return Admission::Rejected;
            }
        }
        Admission::Accepted
    }

    /// Selects from the complete list of a container's children, in order
    pub fn select_list<C: Candidate>(&self, children: Vec<C>) -> Vec<C> {
        let mut current = children;
        for (stage, segment) in self.stages.iter().enumerate() {
            current = match segment {
                Segment::Filter(expr) => {
                    current.retain(|c| evaluate_filter(expr, c.value()));
                    current
                }
                Segment::Name(name) => {
                    current.retain(|c| matches!(c.key(), ChildKey::Member(k) if names_match(k, name)));
                    current
                }
                Segment::Wildcard => current,
                Segment::Index(_) | Segment::Slice(_) if stage == 0 && !is_array(&current) => {
                    Vec::new()
                }
                Segment::Index(i) => {
                    let len = current.len() as i64;
                    let target = if *i < 0 { len + i } else { *i };
                    pick(current, (0..len).filter(|p| *p == target).map(|p| p as usize))
                }
                Segment::Slice(spec) => {
                    let positions = spec.indices(current.len());
                    pick(current, positions.into_iter())
                }
            };
            if current.is_empty() {
                break;
            }
        }
        current
    }
}

fn head_admits(segment: &Segment, key: ChildKey<'_>) -> bool {
    match segment {
        Segment::Name(name) => matches!(key, ChildKey::Member(k) if names_match(k, name)),
        Segment::Wildcard => true,
        Segment::Index(i) => *i >= 0 && key == ChildKey::Index(*i as usize),
        Segment::Slice(spec) => matches!(key, ChildKey::Index(idx) if spec.admits_forward(idx)),
        Segment::Filter(_) => true,
    }
}

fn is_array<C: Candidate>(children: &[C]) -> bool {
    children
        .first()
        .is_some_and(|c| matches!(c.key(), ChildKey::Index(_)))
}

fn pick<C>(items: Vec<C>, positions: impl Iterator<Item = usize>) -> Vec<C> {
    let mut slots: Vec<Option<C>> = items.into_iter().map(Some).collect();
    positions
        .filter_map(|p| slots.get_mut(p).and_then(Option::take))
        .collect()
}

/// Groups written segments into steps
pub fn group(segments: &[Segment]) -> Vec<Step> {
    let mut grouped: Vec<Vec<Segment>> = Vec::new();
    let mut previous_refines = false;
    for segment in segments {
        let refines = segment.is_refinement();
        match grouped.last_mut() {
            Some(stages) if refines && previous_refines => stages.push(segment.clone()),
            _ => grouped.push(vec![segment.clone()]),
        }
        previous_refines = refines;
    }
    grouped.into_iter().map(Step::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathQuery;
    use serde_json::json;

    fn steps(text: &str) -> Vec<Step> {
        PathQuery::parse(text).unwrap().steps().to_vec()
    }

    #[test]
    fn test_grouping() {
        let s = steps("$.data[*]");
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].mode(), StepMode::Eager);

        let s = steps("$[?@.active==true][0:5]");
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].stage_count(), 2);
        assert_eq!(s[0].mode(), StepMode::Filtered);

        let s = steps("$[*][0:5]");
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_buffered_mode() {
        assert_eq!(steps("$[-3:]")[0].mode(), StepMode::Buffered);
        assert_eq!(steps("$[-1]")[0].mode(), StepMode::Buffered);
        assert_eq!(steps("$[::-1]")[0].mode(), StepMode::Buffered);
        assert_eq!(steps("$[?@.a][-2:]")[0].mode(), StepMode::Buffered);
        assert_eq!(steps("$[2]")[0].mode(), StepMode::Eager);
    }

    #[test]
    fn test_admit_eager_slice() {
        let step = &steps("$[2:5]")[0];
        let mut counters = vec![0; step.stage_count()];
        let admitted: Vec<usize> = (0..10)
            .filter(|i| {
                step.admit(0, &mut counters, ChildKey::Index(*i), None) == Admission::Accepted
            })
            .collect();
        assert_eq!(admitted, vec![2, 3, 4]);
    }

    #[test]
    fn test_admit_pending_then_refine() {
        let step = &steps("$[?@.ok==true][1:]")[0];
        let mut counters = vec![0; step.stage_count()];
        let docs = [json!({"ok": true}), json!({"ok": false}), json!({"ok": true})];
        let mut accepted = Vec::new();
        for (i, doc) in docs.iter().enumerate() {
            let key = ChildKey::Index(i);
            match step.admit(0, &mut counters, key, None) {
                Admission::Pending(stage) => {
                    if step.admit(stage, &mut counters, key, Some(doc)) == Admission::Accepted {
                        accepted.push(i);
                    }
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(accepted, vec![2]);
    }

    #[test]
    fn test_select_list_negative_slice() {
        let values: Vec<Value> = (0..10).map(|i| json!(i)).collect();
        let children: Vec<(ChildKey<'_>, &Value)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (ChildKey::Index(i), v))
            .collect();
        let picked = steps("$[-3:]")[0].select_list(children);
        let picked: Vec<&Value> = picked.into_iter().map(|(_, v)| v).collect();
        assert_eq!(picked, vec![&json!(7), &json!(8), &json!(9)]);
    }

    #[test]
    fn test_index_on_object_selects_nothing() {
        let v = json!(1);
        let children = vec![(ChildKey::Member("a"), &v)];
        assert!(steps("$[0]")[0].select_list(children).is_empty());
    }
}
