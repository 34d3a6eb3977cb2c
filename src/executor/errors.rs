//! Executor error types
//!
//! Error codes:
//! - FLOW_DESERIALIZATION (ERROR)
//! - FLOW_SHAPE_MISMATCH (ERROR)
//! - FLOW_IO (ERROR)
//! - FLOW_CANCELLED (SIGNAL)
//! - FLOW_EMPTY_SEQUENCE (ERROR)
//! - FLOW_MULTIPLE_ELEMENTS (ERROR)
//! - FLOW_INDEX_OUT_OF_RANGE (ERROR)
//! - FLOW_NUMERIC_OVERFLOW (ERROR)

use std::fmt;

use crate::reader::ReadError;
use crate::schema::ShapeMismatch;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query failed
    Error,
    /// The query was stopped on request; not a failure
    Signal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Signal => write!(f, "SIGNAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// Malformed bytes, truncated input or undecodable value
    FlowDeserialization,
    /// Valid JSON that does not conform to the declared element type
    FlowShapeMismatch,
    /// Source read failed
    FlowIo,
    /// Cancellation observed
    FlowCancelled,
    /// Reduction needs at least one element
    FlowEmptySequence,
    /// Reduction needs at most one element
    FlowMultipleElements,
    /// `element_at` past the end
    FlowIndexOutOfRange,
    /// Sum does not fit
    FlowNumericOverflow,
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::FlowDeserialization => "FLOW_DESERIALIZATION",
            ExecutorErrorCode::FlowShapeMismatch => "FLOW_SHAPE_MISMATCH",
            ExecutorErrorCode::FlowIo => "FLOW_IO",
            ExecutorErrorCode::FlowCancelled => "FLOW_CANCELLED",
            ExecutorErrorCode::FlowEmptySequence => "FLOW_EMPTY_SEQUENCE",
            ExecutorErrorCode::FlowMultipleElements => "FLOW_MULTIPLE_ELEMENTS",
            ExecutorErrorCode::FlowIndexOutOfRange => "FLOW_INDEX_OUT_OF_RANGE",
            ExecutorErrorCode::FlowNumericOverflow => "FLOW_NUMERIC_OVERFLOW",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::FlowCancelled => Severity::Signal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
    /// Source byte offset if applicable
    offset: Option<u64>,
    /// Position of the offending element in the candidate sequence
    element: Option<u64>,
}

impl ExecutorError {
    fn new(code: ExecutorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            offset: None,
            element: None,
        }
    }

    pub fn deserialization(offset: Option<u64>, reason: impl Into<String>) -> Self {
        Self {
            offset,
            ..Self::new(ExecutorErrorCode::FlowDeserialization, reason)
        }
    }

    /// Element `element` (0-based candidate position) has the wrong shape
    pub fn shape_mismatch(element: u64, mismatch: &ShapeMismatch) -> Self {
        Self {
            element: Some(element),
            ..Self::new(
                ExecutorErrorCode::FlowShapeMismatch,
                format!("element {}: {}", element, mismatch),
            )
        }
    }

    pub fn io(err: &std::io::Error) -> Self {
        Self::new(ExecutorErrorCode::FlowIo, format!("source read failed: {}", err))
    }

    pub fn cancelled() -> Self {
        Self::new(ExecutorErrorCode::FlowCancelled, "query cancelled")
    }

    pub fn empty_sequence(operation: &str) -> Self {
        Self::new(
            ExecutorErrorCode::FlowEmptySequence,
            format!("{}() over an empty sequence", operation),
        )
    }

    pub fn multiple_elements(operation: &str) -> Self {
        Self::new(
            ExecutorErrorCode::FlowMultipleElements,
            format!("{}() found more than one element", operation),
        )
    }

    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::new(
            ExecutorErrorCode::FlowIndexOutOfRange,
            format!("element_at({}) on a sequence of {} elements", index, len),
        )
    }

    pub fn numeric_overflow(operation: &str) -> Self {
        Self::new(
            ExecutorErrorCode::FlowNumericOverflow,
            format!("{}() overflowed", operation),
        )
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn element(&self) -> Option<u64> {
        self.element
    }

    /// Cancellation is reported through the error channel but is not a failure
    pub fn is_cancelled(&self) -> bool {
        self.code == ExecutorErrorCode::FlowCancelled
    }
}

impl From<ReadError> for ExecutorError {
    fn from(err: ReadError) -> Self {
        match &err {
            ReadError::Cancelled => ExecutorError::cancelled(),
            ReadError::Io(io) => ExecutorError::io(io),
            _ => ExecutorError::deserialization(err.offset(), err.to_string()),
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecutorError {}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;
