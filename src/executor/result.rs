//! Result types for query execution

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{ExecutorError, ExecutorResult};

/// Which of the four executor compositions runs a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    /// Whole source deserialized at once
    BufferNoPath,
    /// Path engine over in-memory bytes
    BufferWithPath,
    /// Top-level elements read one at a time
    StreamNoPath,
    /// Path engine over a forward-only stream
    StreamWithPath,
}

impl ExecutorKind {
    pub fn select(streaming: bool, has_path: bool) -> Self {
        match (streaming, has_path) {
            (false, false) => ExecutorKind::BufferNoPath,
            (false, true) => ExecutorKind::BufferWithPath,
            (true, false) => ExecutorKind::StreamNoPath,
            (true, true) => ExecutorKind::StreamWithPath,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorKind::BufferNoPath => "buffer",
            ExecutorKind::BufferWithPath => "buffer+path",
            ExecutorKind::StreamNoPath => "stream",
            ExecutorKind::StreamWithPath => "stream+path",
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, ExecutorKind::StreamNoPath | ExecutorKind::StreamWithPath)
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous element sequence. Ends after the first error.
pub struct Elements<'a> {
    inner: Box<dyn Iterator<Item = ExecutorResult<Value>> + 'a>,
    done: bool,
}

impl<'a> Elements<'a> {
    pub(crate) fn new(inner: impl Iterator<Item = ExecutorResult<Value>> + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            done: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub(crate) fn from_values(values: Vec<Value>) -> Self {
        Self::new(values.into_iter().map(Ok))
    }

    /// Deserializes each element into `T`
    pub fn typed<T: DeserializeOwned + 'a>(self) -> impl Iterator<Item = ExecutorResult<T>> + 'a {
        self.map(|item| {
            item.and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|e| ExecutorError::deserialization(None, e.to_string()))
            })
        })
    }

    /// Collects every element, stopping at the first error
    pub fn collect_values(self) -> ExecutorResult<Vec<Value>> {
        self.collect()
    }
}

impl Iterator for Elements<'_> {
    type Item = ExecutorResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.inner.next();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl fmt::Debug for Elements<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elements").field("done", &self.done).finish_non_exhaustive()
    }
}
