//! Path Filter Engine
//!
//! RFC 9535 subset used to select sub-elements of a document:
//!
//! ```text
//! $                      root
//! .name  ['name']        member (case-insensitive)
//! .*  [*]                every member / element
//! [n]  [-n]              element
//! [start:end:step]       slice, bounds may be negative
//! [?expr]                filter: comparisons, && || !, length() match() search()
//! ```
//!
//! Queries are validated when parsed. The reader consumes the compiled
//! [`steps`] while tokens arrive; [`evaluate`] applies the same semantics to
//! a materialized value.

mod ast;
mod errors;
mod evaluator;
mod filter;
mod parser;
pub(crate) mod steps;

pub use ast::{
    lookup_member, names_match, CompareOp, FieldPath, FilterExpr, FunctionCall, FunctionName,
    LogicalOp, Operand, PathQuery, Pattern, Segment, SliceSpec,
};
pub use errors::{PathErrorCode, PathResult, PathSyntaxError};
pub use evaluator::evaluate;
pub(crate) use evaluator::evaluate_steps;
pub use filter::{compare, compare_numbers, evaluate_filter, length, ordering, values_equal, Resolved};
