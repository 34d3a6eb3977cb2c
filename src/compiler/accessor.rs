//! First-access-cached member lookup

use serde_json::Value;

use crate::path::FieldPath;
use crate::planner::{TranslationError, TranslationResult};
use crate::schema::{ElementSchema, FieldType};

/// Reads one member from elements of a declared type.
///
/// The path is resolved against the schema once, at compile time, so lookups
/// use the declared spelling of each member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberAccessor {
    path: FieldPath,
    field_type: FieldType,
}

impl MemberAccessor {
    /// Resolves `path` on `schema`
    pub fn compile(schema: &ElementSchema, path: &FieldPath) -> TranslationResult<Self> {
        let resolved = schema
            .resolve(path)
            .ok_or_else(|| TranslationError::unknown_member(path.to_string()))?;
        Ok(Self {
            path: resolved.canonical,
            field_type: resolved.field_type,
        })
    }

    /// Canonical member path
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Member value, or `None` when absent from this element
    pub fn get<'v>(&self, element: &'v Value) -> Option<&'v Value> {
        self.path.lookup(element)
    }
}
