//! Translation error types
//!
//! Error codes:
//! - FLOW_TRANSLATE_UNKNOWN_MEMBER (REJECT)
//! - FLOW_TRANSLATE_TYPE_MISMATCH (REJECT)
//! - FLOW_TRANSLATE_UNSUPPORTED (REJECT)
//! - FLOW_TRANSLATE_INVALID_ORDER (REJECT)

use std::fmt;

/// Severity levels for translation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operator chain rejected before execution
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationErrorCode {
    /// Member path not provable on the declared element type
    FlowTranslateUnknownMember,
    /// Literal or operator incompatible with the member's declared type
    FlowTranslateTypeMismatch,
    /// Operator or function the plan cannot express
    FlowTranslateUnsupported,
    /// Operators in an order that has no meaning
    FlowTranslateInvalidOrder,
}

impl TranslationErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            TranslationErrorCode::FlowTranslateUnknownMember => "FLOW_TRANSLATE_UNKNOWN_MEMBER",
            TranslationErrorCode::FlowTranslateTypeMismatch => "FLOW_TRANSLATE_TYPE_MISMATCH",
            TranslationErrorCode::FlowTranslateUnsupported => "FLOW_TRANSLATE_UNSUPPORTED",
            TranslationErrorCode::FlowTranslateInvalidOrder => "FLOW_TRANSLATE_INVALID_ORDER",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for TranslationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Translation error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationError {
    code: TranslationErrorCode,
    message: String,
    /// Member path if applicable
    field: Option<String>,
}

impl TranslationError {
    /// Member path that the declared type does not have
    pub fn unknown_member(field: impl Into<String>) -> Self {
        let f = field.into();
        Self {
            code: TranslationErrorCode::FlowTranslateUnknownMember,
            message: format!("Member '{}' is not declared on the element type", f),
            field: Some(f),
        }
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        let f = field.into();
        Self {
            code: TranslationErrorCode::FlowTranslateTypeMismatch,
            message: format!("Member '{}' is {}, cannot use it with {}", f, expected, actual),
            field: Some(f),
        }
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self {
            code: TranslationErrorCode::FlowTranslateUnsupported,
            message: format!("Unsupported: {}", what.into()),
            field: None,
        }
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self {
            code: TranslationErrorCode::FlowTranslateInvalidOrder,
            message: reason.into(),
            field: None,
        }
    }

    pub fn code(&self) -> TranslationErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for TranslationError {
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

impl std::error::Error for TranslationError {}

/// Result type for translation
pub type TranslationResult<T> = Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TranslationErrorCode::FlowTranslateUnknownMember.code(),
            "FLOW_TRANSLATE_UNKNOWN_MEMBER"
        );
        assert_eq!(
            TranslationErrorCode::FlowTranslateTypeMismatch.code(),
            "FLOW_TRANSLATE_TYPE_MISMATCH"
        );
        assert_eq!(
            TranslationErrorCode::FlowTranslateUnsupported.code(),
            "FLOW_TRANSLATE_UNSUPPORTED"
        );
        assert_eq!(
            TranslationErrorCode::FlowTranslateInvalidOrder.code(),
            "FLOW_TRANSLATE_INVALID_ORDER"
        );
    }

    #[test]
    fn test_error_display() {
        let err = TranslationError::unknown_member("agee");
        let display = format!("{}", err);
        assert!(display.starts_with("[REJECT] FLOW_TRANSLATE_UNKNOWN_MEMBER"));
        assert!(display.contains("agee"));
        assert_eq!(err.field(), Some("agee"));
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = TranslationError::type_mismatch("age", "int", "string literal \"x\"");
        assert_eq!(err.code(), TranslationErrorCode::FlowTranslateTypeMismatch);
        assert!(err.message().contains("int"));
    }
}
