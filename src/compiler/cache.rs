//! Shared cache of compiled predicates, selectors and accessors
//!
//! Keyed by (schema id, canonical text). Entries are compiled outside the
//! lock; when two queries race on the same key the first insert wins and
//! both use it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use super::accessor::MemberAccessor;
use super::predicate::CompiledPredicate;
use super::selector::CompiledSelector;
use crate::path::{FieldPath, FilterExpr};
use crate::planner::{Projection, TranslationResult};
use crate::schema::ElementSchema;

type CacheKey = (String, String);

#[derive(Debug)]
struct Table<T> {
    entries: RwLock<HashMap<CacheKey, Arc<T>>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Table<T> {
    fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Inserts unless another writer got there first; returns the stored entry
    fn insert(&self, key: CacheKey, value: Arc<T>) -> Arc<T> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(key).or_insert(value).clone()
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub compiles: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct CompilerCache {
    predicates: Table<CompiledPredicate>,
    selectors: Table<CompiledSelector>,
    accessors: Table<MemberAccessor>,
    hits: AtomicU64,
    compiles: AtomicU64,
}

impl CompilerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicate(
        &self,
        schema: &ElementSchema,
        expr: &FilterExpr,
    ) -> TranslationResult<Arc<CompiledPredicate>> {
        let key = (schema.schema_id.clone(), expr.to_string());
        self.get_or_compile(&self.predicates, key, || CompiledPredicate::compile(schema, expr))
    }

    pub fn selector(
        &self,
        schema: &ElementSchema,
        projection: &Projection,
    ) -> TranslationResult<Arc<CompiledSelector>> {
        let key = (schema.schema_id.clone(), projection.to_string());
        self.get_or_compile(&self.selectors, key, || CompiledSelector::compile(schema, projection))
    }

    pub fn accessor(
        &self,
        schema: &ElementSchema,
        path: &FieldPath,
    ) -> TranslationResult<Arc<MemberAccessor>> {
        let key = (schema.schema_id.clone(), path.to_string());
        self.get_or_compile(&self.accessors, key, || MemberAccessor::compile(schema, path))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            compiles: self.compiles.load(Ordering::Relaxed),
            entries: self.predicates.len() + self.selectors.len() + self.accessors.len(),
        }
    }

    fn get_or_compile<T, F>(&self, table: &Table<T>, key: CacheKey, compile: F) -> TranslationResult<Arc<T>>
    where
        F: FnOnce() -> TranslationResult<T>,
    {
        if let Some(hit) = table.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        let compiled = Arc::new(compile()?);
        self.compiles.fetch_add(1, Ordering::Relaxed);
        trace!(schema = %key.0, expr = %key.1, "compiled");
        Ok(table.insert(key, compiled))
    }
}
