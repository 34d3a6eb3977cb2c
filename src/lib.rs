//! jsonflow - declarative query plans over JSON
//!
//! An [`OperatorChain`] is translated against a declared [`ElementSchema`]
//! into an [`ExecutionPlan`], then run by one of four executors over either
//! an in-memory buffer or a forward-only stream, with or without a
//! [`PathQuery`] that narrows the document while it is being read.
//!
//! ```no_run
//! use jsonflow::{FilterExpr, OperatorChain, PathQuery, QueryEngine, ElementSchema};
//!
//! let engine = QueryEngine::default();
//! let chain = OperatorChain::new()
//!     .filter(FilterExpr::parse("@.age > 25").unwrap())
//!     .order_by("age", false)
//!     .take(10);
//! let file = std::fs::File::open("people.json").unwrap();
//! let path = PathQuery::parse("$.data[*]").unwrap();
//! let out = engine.run_stream(file, Some(path), &chain, &ElementSchema::dynamic()).unwrap();
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod observability;
pub mod path;
pub mod planner;
pub mod reader;
pub mod schema;

pub use config::{EngineConfig, ReaderConfig, ShapePolicy};
pub use engine::{QueryEngine, QueryOutput};
pub use error::{Error, Result};
pub use executor::{CancellationSignal, Elements, ElementStream, ExecutorError, ExecutorKind};
pub use path::{FieldPath, FilterExpr, PathQuery};
pub use planner::{Aggregate, ExecutionPlan, JoinSpec, OperatorChain, Projection, TranslationError};
pub use schema::{ElementSchema, FieldDef, FieldType};
