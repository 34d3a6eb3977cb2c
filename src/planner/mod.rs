//! Plan Translator
//!
//! Turns an [`OperatorChain`] into an [`ExecutionPlan`] that every executor
//! can run while reading, plus a [`PostProcess`] of in-memory operators and
//! an optional terminal reduction.
//!
//! Translation is fail-fast: member paths are proven against the declared
//! element type and operator order is checked before any source is read.

mod ast;
mod errors;
mod explain;
mod plan;
mod translator;

pub use ast::{Aggregate, JoinSpec, Operator, OperatorChain, Projection};
pub use errors::{Severity, TranslationError, TranslationErrorCode, TranslationResult};
pub use explain::ExplainPlan;
pub use plan::{ExecutionPlan, PostProcess, RelationalOp, SortKey, Terminal, TranslatedQuery};
pub use translator::Translator;
