//! Shape mismatch details
//!
//! Raised when a structurally valid element does not conform to the declared
//! element schema. Executors report it as FLOW_SHAPE_MISMATCH.

use std::fmt;

/// Where and how an element failed to conform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    /// Member path (e.g., "address.city", "tags[2]", "$root")
    pub field: String,
    /// Expected type or condition
    pub expected: String,
    /// Actual type found
    pub actual: String,
}

impl ShapeMismatch {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(field, "member to be present", "missing")
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(field, expected, actual)
    }
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "member '{}': expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

impl std::error::Error for ShapeMismatch {}
