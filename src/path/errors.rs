//! Path syntax errors
//!
//! Error codes:
//! - FLOW_PATH_SYNTAX (REJECT)
//! - FLOW_PATH_PATTERN (REJECT)
//!
//! Both are raised while parsing, never while a document is being read.

use std::fmt;

/// Path error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathErrorCode {
    /// Path text does not follow the grammar
    FlowPathSyntax,
    /// `match` / `search` pattern is not a valid regular expression
    FlowPathPattern,
}

impl PathErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PathErrorCode::FlowPathSyntax => "FLOW_PATH_SYNTAX",
            PathErrorCode::FlowPathPattern => "FLOW_PATH_PATTERN",
        }
    }
}

impl fmt::Display for PathErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Invalid path text, rejected at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSyntaxError {
    code: PathErrorCode,
    message: String,
    /// Byte position in the path text where parsing stopped
    position: usize,
}

impl PathSyntaxError {
    /// Create a grammar error at the given byte position
    pub fn syntax(position: usize, reason: impl Into<String>) -> Self {
        Self {
            code: PathErrorCode::FlowPathSyntax,
            message: reason.into(),
            position,
        }
    }

    /// Create an invalid pattern error
    pub fn pattern(position: usize, pattern: &str, reason: impl fmt::Display) -> Self {
        Self {
            code: PathErrorCode::FlowPathPattern,
            message: format!("invalid pattern '{}': {}", pattern, reason),
            position,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> PathErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the byte position of the error
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for PathSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[REJECT] {}: {} (at position {})",
            self.code.code(),
            self.message,
            self.position
        )
    }
}

impl std::error::Error for PathSyntaxError {}

/// Result type for path parsing
pub type PathResult<T> = Result<T, PathSyntaxError>;
