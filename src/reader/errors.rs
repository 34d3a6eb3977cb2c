//! Reader errors
//!
//! Any of these aborts the enumeration. There is no recovery at this layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("malformed JSON at byte {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("unexpected end of input at byte {offset}")]
    Truncated { offset: u64 },

    #[error("nesting deeper than {max_depth} levels at byte {offset}")]
    Depth { offset: u64, max_depth: usize },

    #[error("cannot decode matched value: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("source read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("read cancelled")]
    Cancelled,
}

impl ReadError {
    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        ReadError::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    /// Byte offset where the error was detected, if known
    pub fn offset(&self) -> Option<u64> {
        match self {
            ReadError::Malformed { offset, .. }
            | ReadError::Truncated { offset }
            | ReadError::Depth { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReadError::Cancelled)
    }
}

pub type ReadResult<T> = Result<T, ReadError>;
