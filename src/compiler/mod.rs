//! Predicate/Selector Compiler
//!
//! Turns filter expressions, projections and member paths into reusable
//! compiled artifacts validated against a declared element type, cached by
//! (schema id, canonical text) in a [`CompilerCache`] shared across queries.

mod accessor;
mod cache;
mod predicate;
mod selector;

pub use accessor::MemberAccessor;
pub use cache::{CacheStats, CompilerCache};
pub use predicate::CompiledPredicate;
pub use selector::CompiledSelector;
