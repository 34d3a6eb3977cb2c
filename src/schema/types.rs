//! Declared element types
//!
//! Supported types:
//! - string: UTF-8 string
//! - int: 64-bit integer
//! - bool: Boolean
//! - float: 64-bit floating point (integers accepted)
//! - object: nested object with declared members
//! - array: homogeneous array with element type
//! - any: undeclared shape, every member path is accepted

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::path::{names_match, FieldPath};

/// Field types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
    Float,
    Object {
        fields: BTreeMap<String, FieldDef>,
    },
    Array {
        #[serde(rename = "element_type")]
        element_type: Box<FieldType>,
    },
    Any,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Bool => "bool",
            FieldType::Float => "float",
            FieldType::Object { .. } => "object",
            FieldType::Array { .. } => "array",
            FieldType::Any => "any",
        }
    }

    /// Returns true for int and float
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    /// Looks up a declared member exact-first, then case-insensitively
    fn member(fields: &BTreeMap<String, FieldDef>, name: &str) -> Option<(String, FieldDef)> {
        fields
            .get_key_value(name)
            .or_else(|| fields.iter().find(|(k, _)| names_match(k, name)))
            .map(|(k, v)| (k.clone(), v.clone()))
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    pub fn new(field_type: FieldType, required: bool) -> Self {
        Self {
            field_type,
            required,
        }
    }

    pub fn required_string() -> Self {
        Self::new(FieldType::String, true)
    }

    pub fn optional_string() -> Self {
        Self::new(FieldType::String, false)
    }

    pub fn required_int() -> Self {
        Self::new(FieldType::Int, true)
    }

    pub fn optional_int() -> Self {
        Self::new(FieldType::Int, false)
    }

    pub fn required_bool() -> Self {
        Self::new(FieldType::Bool, true)
    }

    pub fn optional_bool() -> Self {
        Self::new(FieldType::Bool, false)
    }

    pub fn required_float() -> Self {
        Self::new(FieldType::Float, true)
    }

    pub fn optional_float() -> Self {
        Self::new(FieldType::Float, false)
    }

    pub fn required_object(fields: BTreeMap<String, FieldDef>) -> Self {
        Self::new(FieldType::Object { fields }, true)
    }

    pub fn optional_object(fields: BTreeMap<String, FieldDef>) -> Self {
        Self::new(FieldType::Object { fields }, false)
    }

    pub fn optional_array(element_type: FieldType) -> Self {
        Self::new(
            FieldType::Array {
                element_type: Box::new(element_type),
            },
            false,
        )
    }

    pub fn optional_any() -> Self {
        Self::new(FieldType::Any, false)
    }
}

/// A member path resolved against a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMember {
    /// Path using declared member names where the schema declares them
    pub canonical: FieldPath,
    /// Declared type of the member
    pub field_type: FieldType,
}

/// Declared type of the elements a query runs over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSchema {
    /// Identity used to key compiled artifacts
    pub schema_id: String,
    pub element: FieldType,
}

impl ElementSchema {
    /// Object elements with declared members
    pub fn object(schema_id: impl Into<String>, fields: BTreeMap<String, FieldDef>) -> Self {
        Self {
            schema_id: schema_id.into(),
            element: FieldType::Object { fields },
        }
    }

    /// Elements of any shape
    pub fn dynamic() -> Self {
        Self {
            schema_id: "dynamic".into(),
            element: FieldType::Any,
        }
    }

    /// Elements of a declared type other than an object
    pub fn of(schema_id: impl Into<String>, element: FieldType) -> Self {
        Self {
            schema_id: schema_id.into(),
            element,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.element == FieldType::Any
    }

    /// Proves a member path exists on the declared type. Returns `None` when
    /// the path names a member that is not declared.
    pub fn resolve(&self, path: &FieldPath) -> Option<ResolvedMember> {
        let mut current = self.element.clone();
        let mut canonical = Vec::with_capacity(path.segments().len());

        for seg in path.segments() {
            current = match current {
                FieldType::Any => {
                    canonical.push(seg.clone());
                    FieldType::Any
                }
                FieldType::Object { fields } => {
                    let (name, def) = FieldType::member(&fields, seg)?;
                    canonical.push(name);
                    def.field_type
                }
                _ => return None,
            };
        }

        Some(ResolvedMember {
            canonical: FieldPath::new(canonical),
            field_type: current,
        })
    }
}

impl Default for ElementSchema {
    fn default() -> Self {
        Self::dynamic()
    }
}
