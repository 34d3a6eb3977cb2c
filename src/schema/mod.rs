//! Declared element schemas
//!
//! A query is translated against the declared type of its elements. The
//! schema proves member paths at plan build and checks each element's shape
//! as it is deserialized.

mod conform;
mod errors;
mod types;

pub use conform::{conform, json_type_name};
pub use errors::ShapeMismatch;
pub use types::{ElementSchema, FieldDef, FieldType, ResolvedMember};
