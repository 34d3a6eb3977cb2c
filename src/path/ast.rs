//! Path query AST (RFC 9535 subset)
//!
//! A query always starts at the document root `$`. Segments are kept as
//! written; [`super::steps`] groups them into evaluation steps.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use super::errors::PathResult;
use super::parser;
use super::steps::{self, Step};

/// A parsed, validated path query
#[derive(Debug, Clone)]
pub struct PathQuery {
    segments: Vec<Segment>,
    steps: Arc<[Step]>,
}

impl PathQuery {
    /// Parses and validates path text. Malformed text is rejected here and
    /// never surfaces while a document is being read.
    pub fn parse(text: &str) -> PathResult<Self> {
        let segments = parser::parse_path(text)?;
        Ok(Self::from_segments(segments))
    }

    /// Builds a query from already-validated segments
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let steps = steps::group(&segments).into();
        Self { segments, steps }
    }

    /// The root query `$`
    pub fn root() -> Self {
        Self::from_segments(Vec::new())
    }

    /// Returns the segments as written
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the evaluation steps
    pub(crate) fn steps(&self) -> &Arc<[Step]> {
        &self.steps
    }

    /// Returns true if this is the bare root `$`
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if any step must see a whole container before selecting
    pub fn requires_buffering(&self) -> bool {
        self.steps.iter().any(Step::is_buffered)
    }
}

impl PartialEq for PathQuery {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.segments {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

/// A segment in a path query
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Member access: `.name`, `['name']`; matched case-insensitively
    Name(String),
    /// Every member or element: `.*`, `[*]`
    Wildcard,
    /// Single element: `[2]`, `[-1]`
    Index(i64),
    /// Element range: `[start:end:step]`
    Slice(SliceSpec),
    /// Filter: `[?expr]`
    Filter(FilterExpr),
}

impl Segment {
    /// Returns true if this segment refines a node list rather than descending
    pub(crate) fn is_refinement(&self) -> bool {
        matches!(self, Segment::Slice(_) | Segment::Filter(_))
    }

    /// Returns true if selection depends on the final container length
    pub(crate) fn needs_length(&self) -> bool {
        match self {
            Segment::Index(i) => *i < 0,
            Segment::Slice(s) => s.needs_length(),
            _ => false,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => write_member(f, name),
            Segment::Wildcard => write!(f, "[*]"),
            Segment::Index(i) => write!(f, "[{}]", i),
            Segment::Slice(s) => write!(f, "{}", s),
            Segment::Filter(expr) => write!(f, "[?{}]", expr),
        }
    }
}

/// Slice bounds; any bound may be omitted or negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub step: Option<i64>,
}

impl SliceSpec {
    pub fn new(start: Option<i64>, end: Option<i64>, step: Option<i64>) -> Self {
        Self { start, end, step }
    }

    /// Returns the effective step (default 1)
    pub fn step(&self) -> i64 {
        self.step.unwrap_or(1)
    }

    /// Negative bounds or a negative step can only be resolved once the
    /// container length is known.
    pub fn needs_length(&self) -> bool {
        self.start.is_some_and(|s| s < 0) || self.end.is_some_and(|e| e < 0) || self.step() < 0
    }

    /// Single-pass admission for slices that do not need the length.
    pub fn admits_forward(&self, ordinal: usize) -> bool {
        let step = self.step();
        if step <= 0 {
            return false;
        }
        let start = self.start.unwrap_or(0).max(0) as usize;
        if ordinal < start {
            return false;
        }
        if let Some(end) = self.end {
            if ordinal >= end.max(0) as usize {
                return false;
            }
        }
        (ordinal - start) % step as usize == 0
    }

    /// Resolves the selected positions for a container of `len` elements,
    /// clamping negative bounds against the length first.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let len = len as i64;
        let step = self.step();
        if step == 0 || len == 0 {
            return Vec::new();
        }

        let normalize = |i: i64| if i >= 0 { i } else { len + i };
        let mut selected = Vec::new();

        if step > 0 {
            let lower = normalize(self.start.unwrap_or(0)).clamp(0, len);
            let upper = normalize(self.end.unwrap_or(len)).clamp(0, len);
            let mut i = lower;
            while i < upper {
                selected.push(i as usize);
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
        } else {
            let upper = normalize(self.start.unwrap_or(len - 1)).clamp(-1, len - 1);
            let lower = match self.end {
                Some(e) => normalize(e).clamp(-1, len - 1),
                None => -1,
            };
            let mut i = upper;
            while lower < i {
                selected.push(i as usize);
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
        }

        selected
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if let Some(s) = self.start {
            write!(f, "{}", s)?;
        }
        write!(f, ":")?;
        if let Some(e) = self.end {
            write!(f, "{}", e)?;
        }
        if let Some(st) = self.step {
            write!(f, ":{}", st)?;
        }
        write!(f, "]")
    }
}

/// Boolean filter expression evaluated against a candidate `@`
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `left op right`
    Comparison {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// `left && right`, `left || right`
    Logical {
        op: LogicalOp,
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },
    /// `!expr`
    Not(Box<FilterExpr>),
    /// Bare `@.field`: true when the member exists
    Exists(FieldPath),
    /// `match(..)` / `search(..)` used as a test
    Function(FunctionCall),
}

impl FilterExpr {
    /// Parses a standalone filter expression such as `@.age > 25`
    pub fn parse(text: &str) -> PathResult<Self> {
        parser::parse_filter(text)
    }

    pub fn and(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Comparison between a member and a literal
    pub fn compare(path: FieldPath, op: CompareOp, literal: Value) -> Self {
        FilterExpr::Comparison {
            left: Operand::Path(path),
            op,
            right: Operand::Literal(literal),
        }
    }

    /// Visits every field path referenced by this expression
    pub fn field_paths(&self) -> Vec<&FieldPath> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a FieldPath>) {
        match self {
            FilterExpr::Comparison { left, right, .. } => {
                left.collect_paths(out);
                right.collect_paths(out);
            }
            FilterExpr::Logical { left, right, .. } => {
                left.collect_paths(out);
                right.collect_paths(out);
            }
            FilterExpr::Not(inner) => inner.collect_paths(out),
            FilterExpr::Exists(path) => out.push(path),
            FilterExpr::Function(call) => {
                for arg in &call.args {
                    arg.collect_paths(out);
                }
            }
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Comparison { left, op, right } => write!(f, "{} {} {}", left, op, right),
            FilterExpr::Logical { op, left, right } => {
                write_logical_child(f, left)?;
                write!(f, " {} ", op)?;
                write_logical_child(f, right)
            }
            FilterExpr::Not(inner) => match inner.as_ref() {
                FilterExpr::Logical { .. } | FilterExpr::Comparison { .. } => {
                    write!(f, "!({})", inner)
                }
                _ => write!(f, "!{}", inner),
            },
            FilterExpr::Exists(path) => write!(f, "@{}", path.filter_suffix()),
            FilterExpr::Function(call) => write!(f, "{}", call),
        }
    }
}

fn write_logical_child(f: &mut fmt::Formatter<'_>, expr: &FilterExpr) -> fmt::Result {
    match expr {
        FilterExpr::Logical { .. } => write!(f, "({})", expr),
        _ => write!(f, "{}", expr),
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Returns true for `==` and `!=`
    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "&&"),
            LogicalOp::Or => write!(f, "||"),
        }
    }
}

/// A comparison operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `@`-relative member path
    Path(FieldPath),
    /// JSON literal
    Literal(Value),
    /// Function result
    Function(FunctionCall),
}

impl Operand {
    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a FieldPath>) {
        match self {
            Operand::Path(p) => out.push(p),
            Operand::Literal(_) => {}
            Operand::Function(call) => {
                for arg in &call.args {
                    arg.collect_paths(out);
                }
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Path(p) => write!(f, "@{}", p.filter_suffix()),
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Function(call) => write!(f, "{}", call),
        }
    }
}

/// Supported filter functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// Character count of a string, element count of an array or object
    Length,
    /// Pattern matches the entire string
    Match,
    /// Pattern occurs anywhere in the string
    Search,
}

impl FunctionName {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "length" => Some(FunctionName::Length),
            "match" => Some(FunctionName::Match),
            "search" => Some(FunctionName::Search),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionName::Length => "length",
            FunctionName::Match => "match",
            FunctionName::Search => "search",
        }
    }

    /// Returns the required argument count
    pub fn arity(&self) -> usize {
        match self {
            FunctionName::Length => 1,
            FunctionName::Match | FunctionName::Search => 2,
        }
    }

    /// Returns true if the function yields a logical result
    pub fn is_test(&self) -> bool {
        matches!(self, FunctionName::Match | FunctionName::Search)
    }
}

/// A validated function call. Pattern arguments are compiled while parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: FunctionName,
    pub args: Vec<Operand>,
    pub pattern: Option<Pattern>,
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name.as_str())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// Compiled regular expression for `match` / `search`
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern; `anchored` wraps it so it must cover the whole input.
    pub fn compile(source: &str, anchored: bool) -> Result<Self, regex::Error> {
        let regex = if anchored {
            Regex::new(&format!("^(?:{})$", source))?
        } else {
            Regex::new(source)?
        };
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.regex.as_str() == other.regex.as_str()
    }
}

/// Member path relative to a candidate value. Empty means the candidate itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// The candidate itself (`@`)
    pub fn current() -> Self {
        Self::default()
    }

    /// Parses a dotted member path such as `address.city`. A leading `@`
    /// or `@.` is accepted.
    pub fn parse(text: &str) -> PathResult<Self> {
        parser::parse_field_path(text)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_current(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolves this path against a value, matching members exact-first then
    /// case-insensitively.
    pub fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut current = value;
        for seg in &self.segments {
            match current {
                Value::Object(map) => current = lookup_member(map, seg)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Renders the path as it follows `@` in a filter
    fn filter_suffix(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            if is_identifier(seg) {
                out.push('.');
                out.push_str(seg);
            } else {
                out.push_str(&format!("[{}]", Value::String(seg.clone())));
            }
        }
        out
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "@");
        }
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for FieldPath {
    /// Splits on dots without validation; use [`FieldPath::parse`] for user input.
    fn from(text: &str) -> Self {
        Self::new(
            text.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Case-insensitive member name comparison
pub fn names_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.eq_ignore_ascii_case(b)
        || a.chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase))
}

/// Looks up a member exact-first, then case-insensitively
pub fn lookup_member<'v>(map: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| names_match(key, name))
            .map(|(_, v)| v)
    })
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn write_member(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_identifier(name) {
        write!(f, ".{}", name)
    } else {
        write!(f, "[{}]", Value::String(name.to_string()))
    }
}
