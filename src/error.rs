//! Crate-wide error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::executor::ExecutorError;
use crate::path::PathSyntaxError;
use crate::planner::TranslationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Path(#[from] PathSyntaxError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Execution(#[from] ExecutorError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Stable `FLOW_*` code, when the underlying error carries one
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Error::Path(e) => Some(e.code().code()),
            Error::Translation(e) => Some(e.code().code()),
            Error::Execution(e) => Some(e.code().code()),
            Error::Config(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Execution(e) if e.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err: Error = ExecutorError::cancelled().into();
        assert_eq!(err.code(), Some("FLOW_CANCELLED"));
        assert!(err.is_cancelled());

        let err: Error = TranslationError::unknown_member("ghost").into();
        assert_eq!(err.code(), Some("FLOW_TRANSLATE_UNKNOWN_MEMBER"));
        assert!(err.to_string().contains("FLOW_TRANSLATE_UNKNOWN_MEMBER"));
        assert!(!err.is_cancelled());
    }
}
