//! Compiled projections

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::accessor::MemberAccessor;
use crate::planner::{Projection, TranslationError, TranslationResult};
use crate::schema::{ElementSchema, FieldDef};

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Field(MemberAccessor),
    Object(Vec<(String, MemberAccessor)>),
}

/// Reshapes elements of one declared type into the projected result type
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelector {
    shape: Shape,
    result_schema: ElementSchema,
}

impl CompiledSelector {
    pub fn compile(schema: &ElementSchema, projection: &Projection) -> TranslationResult<Self> {
        let result_id = format!("{}=>{}", schema.schema_id, projection);
        match projection {
            Projection::Field(path) => {
                let accessor = MemberAccessor::compile(schema, path)?;
                let result_schema = ElementSchema::of(result_id, accessor.field_type().clone());
                Ok(Self {
                    shape: Shape::Field(accessor),
                    result_schema,
                })
            }
            Projection::Object(members) => {
                let mut compiled = Vec::with_capacity(members.len());
                let mut fields = BTreeMap::new();
                for (alias, path) in members {
                    if fields.contains_key(alias) {
                        return Err(TranslationError::unsupported(format!(
                            "duplicate projection alias '{}'",
                            alias
                        )));
                    }
                    let accessor = MemberAccessor::compile(schema, path)?;
                    fields.insert(
                        alias.clone(),
                        FieldDef::new(accessor.field_type().clone(), false),
                    );
                    compiled.push((alias.clone(), accessor));
                }
                Ok(Self {
                    shape: Shape::Object(compiled),
                    result_schema: ElementSchema::object(result_id, fields),
                })
            }
        }
    }

    /// Declared type of projected elements
    pub fn result_schema(&self) -> &ElementSchema {
        &self.result_schema
    }

    /// Missing members project as `null`
    pub fn apply(&self, element: &Value) -> Value {
        match &self.shape {
            Shape::Field(accessor) => accessor.get(element).cloned().unwrap_or(Value::Null),
            Shape::Object(members) => {
                let mut out = Map::with_capacity(members.len());
                for (alias, accessor) in members {
                    out.insert(
                        alias.clone(),
                        accessor.get(element).cloned().unwrap_or(Value::Null),
                    );
                }
                Value::Object(out)
            }
        }
    }
}
