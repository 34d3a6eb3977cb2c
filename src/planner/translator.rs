//! Operator chain to execution plan
//!
//! Operators are folded into the plan until the first one the plan cannot
//! express. From there on every operator becomes an in-memory
//! [`RelationalOp`]. The plan applies, in this order: predicates, sort,
//! skip/take, projection. So within the plan phase:
//!
//! - a filter or sort after skip, take or a projection ends the phase
//! - a second projection ends the phase
//! - group and join always end the phase
//! - skip and take fold into one window: `skip(n)` then `take(m)` keeps
//!   `m` after `n`; `take(m)` then `skip(n)` keeps `m - n` after `n`
//!
//! An aggregate is only valid as the last operator.

use std::collections::BTreeMap;

use tracing::debug;

use super::ast::{Aggregate, Operator, OperatorChain};
use super::errors::{TranslationError, TranslationResult};
use super::plan::{ExecutionPlan, PostProcess, RelationalOp, SortKey, Terminal, TranslatedQuery};
use crate::compiler::{CompilerCache, MemberAccessor};
use crate::path::FieldPath;
use crate::schema::{ElementSchema, FieldDef, FieldType};

pub struct Translator<'a> {
    cache: &'a CompilerCache,
}

/// Plan-phase bookkeeping
struct PlanBuilder {
    plan: ExecutionPlan,
    /// Keys belonging to the most recent `order_by`
    current_sort_len: usize,
    windowed: bool,
}

impl PlanBuilder {
    fn accepts(&self, op: &Operator) -> bool {
        match op {
            Operator::Filter(_) | Operator::OrderBy { .. } => {
                !self.windowed && self.plan.projection.is_none()
            }
            Operator::ThenBy { .. } => true,
            Operator::Skip(_) | Operator::Take(_) => true,
            Operator::Project(_) => self.plan.projection.is_none(),
            Operator::GroupBy { .. } | Operator::Join(_) | Operator::Aggregate(_) => false,
        }
    }
}

impl<'a> Translator<'a> {
    pub fn new(cache: &'a CompilerCache) -> Self {
        Self { cache }
    }

    pub fn translate(&self, chain: &OperatorChain, schema: &ElementSchema) -> TranslationResult<TranslatedQuery> {
        let ops = chain.operators();
        let mut builder = PlanBuilder {
            plan: ExecutionPlan::passthrough(schema.clone()),
            current_sort_len: 0,
            windowed: false,
        };

        let mut index = 0;
        while index < ops.len() {
            let op = &ops[index];
            if !builder.accepts(op) {
                break;
            }
            check_then_by(ops, index)?;
            self.fold_into_plan(&mut builder, op)?;
            index += 1;
        }

        let mut post = PostProcess::default();
        let mut current = builder.plan.result_schema.clone();
        while index < ops.len() {
            let op = &ops[index];
            check_then_by(ops, index)?;
            if let Operator::Aggregate(agg) = op {
                if index + 1 != ops.len() {
                    return Err(TranslationError::invalid_order(format!(
                        "{} must be the last operator",
                        agg
                    )));
                }
                post.terminal = Some(self.terminal(&current, agg)?);
            } else {
                current = self.push_relational(&mut post, &current, op)?;
            }
            index += 1;
        }

        let plan = builder.plan;
        debug!(
            operators = ops.len(),
            predicates = plan.predicates.len(),
            sort_keys = plan.sort_keys.len(),
            skip = plan.skip,
            take = ?plan.take,
            projected = plan.projection.is_some(),
            post_ops = post.ops.len(),
            terminal = ?post.terminal.as_ref().map(|t| t.aggregate.name()),
            "plan translated"
        );
        Ok(TranslatedQuery { plan, post })
    }

    fn fold_into_plan(&self, builder: &mut PlanBuilder, op: &Operator) -> TranslationResult<()> {
        let plan = &mut builder.plan;
        match op {
            Operator::Filter(expr) => {
                plan.predicates.push(self.cache.predicate(&plan.source_schema, expr)?);
            }
            Operator::OrderBy { path, ascending } => {
                let key = self.sort_key(&plan.source_schema, path, *ascending)?;
                // A new primary sort keeps earlier keys as tie-breakers
                plan.sort_keys.insert(0, key);
                builder.current_sort_len = 1;
            }
            Operator::ThenBy { path, ascending } => {
                let key = self.sort_key(&plan.source_schema, path, *ascending)?;
                plan.sort_keys.insert(builder.current_sort_len, key);
                builder.current_sort_len += 1;
            }
            Operator::Skip(n) => {
                plan.skip = plan.skip.saturating_add(*n);
                plan.take = plan.take.map(|t| t.saturating_sub(*n));
                builder.windowed = true;
            }
            Operator::Take(m) => {
                plan.take = Some(plan.take.map_or(*m, |t| t.min(*m)));
                builder.windowed = true;
            }
            Operator::Project(projection) => {
                let selector = self.cache.selector(&plan.source_schema, projection)?;
                plan.result_schema = selector.result_schema().clone();
                plan.projection = Some(selector);
            }
            Operator::GroupBy { .. } | Operator::Join(_) | Operator::Aggregate(_) => {
                return Err(TranslationError::unsupported(format!("{} inside the plan", op.name())));
            }
        }
        Ok(())
    }

    /// Appends one in-memory operator; returns the element schema after it
    fn push_relational(
        &self,
        post: &mut PostProcess,
        current: &ElementSchema,
        op: &Operator,
    ) -> TranslationResult<ElementSchema> {
        let next = match op {
            Operator::Filter(expr) => {
                post.ops.push(RelationalOp::Filter(self.cache.predicate(current, expr)?));
                current.clone()
            }
            Operator::OrderBy { path, ascending } => {
                let key = self.sort_key(current, path, *ascending)?;
                post.ops.push(RelationalOp::Sort(vec![key]));
                current.clone()
            }
            Operator::ThenBy { path, ascending } => {
                let key = self.sort_key(current, path, *ascending)?;
                match post.ops.last_mut() {
                    Some(RelationalOp::Sort(keys)) => keys.push(key),
                    _ => return Err(then_by_without_order_by()),
                }
                current.clone()
            }
            Operator::Skip(n) => {
                post.ops.push(RelationalOp::Skip(*n));
                current.clone()
            }
            Operator::Take(m) => {
                post.ops.push(RelationalOp::Take(*m));
                current.clone()
            }
            Operator::Project(projection) => {
                let selector = self.cache.selector(current, projection)?;
                let next = selector.result_schema().clone();
                post.ops.push(RelationalOp::Project(selector));
                next
            }
            Operator::GroupBy { key } => {
                let accessor = self.cache.accessor(current, key)?;
                let next = group_schema(current, &accessor);
                post.ops.push(RelationalOp::GroupBy(accessor));
                next
            }
            Operator::Join(spec) => {
                let outer = self.cache.accessor(current, &spec.outer_key)?;
                let inner = self.cache.accessor(&spec.inner_schema, &spec.inner_key)?;
                let next = join_schema(current, &spec.inner_schema);
                post.ops.push(RelationalOp::Join {
                    spec: spec.clone(),
                    outer,
                    inner,
                });
                next
            }
            Operator::Aggregate(agg) => {
                return Err(TranslationError::invalid_order(format!(
                    "{} must be the last operator",
                    agg
                )));
            }
        };
        Ok(next)
    }

    fn sort_key(&self, schema: &ElementSchema, path: &FieldPath, ascending: bool) -> TranslationResult<SortKey> {
        let accessor = self.cache.accessor(schema, path)?;
        Ok(SortKey {
            path: path.clone(),
            accessor,
            ascending,
        })
    }

    fn terminal(&self, schema: &ElementSchema, agg: &Aggregate) -> TranslationResult<Terminal> {
        let accessor = match agg.member() {
            Some(path) => {
                let accessor = self.cache.accessor(schema, path)?;
                let field_type = accessor.field_type();
                let numeric_only = matches!(agg, Aggregate::Sum(_) | Aggregate::Average(_));
                let allowed = field_type.is_numeric()
                    || *field_type == FieldType::Any
                    || (!numeric_only && *field_type == FieldType::String);
                if !allowed {
                    return Err(TranslationError::type_mismatch(
                        accessor.path().to_string(),
                        field_type.type_name(),
                        format!("{}()", agg.name()),
                    ));
                }
                Some(accessor)
            }
            None => None,
        };
        Ok(Terminal {
            aggregate: agg.clone(),
            accessor,
        })
    }
}

/// `then_by` must directly follow `order_by` or another `then_by`
fn check_then_by(ops: &[Operator], index: usize) -> TranslationResult<()> {
    if !matches!(ops[index], Operator::ThenBy { .. }) {
        return Ok(());
    }
    match index.checked_sub(1).map(|i| &ops[i]) {
        Some(Operator::OrderBy { .. }) | Some(Operator::ThenBy { .. }) => Ok(()),
        _ => Err(then_by_without_order_by()),
    }
}

fn then_by_without_order_by() -> TranslationError {
    TranslationError::invalid_order("then_by must follow order_by or then_by")
}

/// `{"key": k, "items": [...]}`; the id names the key since `key` takes its type
fn group_schema(current: &ElementSchema, key: &MemberAccessor) -> ElementSchema {
    let mut fields = BTreeMap::new();
    fields.insert("key".to_string(), FieldDef::new(key.field_type().clone(), false));
    fields.insert(
        "items".to_string(),
        FieldDef::new(
            FieldType::Array {
                element_type: Box::new(current.element.clone()),
            },
            true,
        ),
    );
    ElementSchema::object(format!("group<{},{}>", current.schema_id, key.path()), fields)
}

/// `{"outer": o, "inner": i}`
fn join_schema(outer: &ElementSchema, inner: &ElementSchema) -> ElementSchema {
    let mut fields = BTreeMap::new();
    fields.insert("outer".to_string(), FieldDef::new(outer.element.clone(), true));
    fields.insert("inner".to_string(), FieldDef::new(inner.element.clone(), true));
    ElementSchema::object(format!("join<{},{}>", outer.schema_id, inner.schema_id), fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FilterExpr;
    use crate::planner::{JoinSpec, Projection, TranslationErrorCode};
    use serde_json::json;

    fn person() -> ElementSchema {
        let mut fields = BTreeMap::new();
        fields.insert("name".into(), FieldDef::required_string());
        fields.insert("age".into(), FieldDef::optional_int());
        fields.insert("active".into(), FieldDef::optional_bool());
        fields.insert("city".into(), FieldDef::optional_string());
        ElementSchema::object("person", fields)
    }

    fn translate(chain: OperatorChain) -> TranslationResult<TranslatedQuery> {
        let cache = CompilerCache::new();
        Translator::new(&cache).translate(&chain, &person())
    }

    fn filter(text: &str) -> FilterExpr {
        FilterExpr::parse(text).unwrap()
    }

    #[test]
    fn test_filters_collected_in_order() {
        let q = translate(
            OperatorChain::new()
                .filter(filter("@.age > 1"))
                .filter(filter("@.active == true")),
        )
        .unwrap();
        let texts: Vec<&str> = q.plan.predicates().iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["@.age > 1", "@.active == true"]);
        assert!(q.post.is_empty());
    }

    #[test]
    fn test_sort_keys_primary_first() {
        let q = translate(
            OperatorChain::new()
                .order_by("city", true)
                .then_by("age", false)
                .then_by("name", true),
        )
        .unwrap();
        let keys: Vec<String> = q.plan.sort_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["city asc", "age desc", "name asc"]);
    }

    #[test]
    fn test_second_order_by_becomes_primary() {
        let q = translate(
            OperatorChain::new()
                .order_by("age", true)
                .order_by("city", false)
                .then_by("name", true),
        )
        .unwrap();
        let keys: Vec<String> = q.plan.sort_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["city desc", "name asc", "age asc"]);
    }

    #[test]
    fn test_skip_take_folding() {
        let q = translate(OperatorChain::new().skip(2).take(5)).unwrap();
        assert_eq!((q.plan.skip(), q.plan.take()), (2, Some(5)));

        let q = translate(OperatorChain::new().take(5).skip(2)).unwrap();
        assert_eq!((q.plan.skip(), q.plan.take()), (2, Some(3)));

        let q = translate(OperatorChain::new().take(5).take(3).skip(1).skip(1)).unwrap();
        assert_eq!((q.plan.skip(), q.plan.take()), (2, Some(1)));

        let q = translate(OperatorChain::new().take(2).skip(5)).unwrap();
        assert!(q.plan.is_empty_result());
    }

    #[test]
    fn test_take_zero_empty_result() {
        let q = translate(OperatorChain::new().filter(filter("@.age > 1")).take(0)).unwrap();
        assert!(q.plan.is_empty_result());
    }

    #[test]
    fn test_filter_after_take_goes_to_post() {
        let q = translate(OperatorChain::new().take(3).filter(filter("@.age > 1"))).unwrap();
        assert_eq!(q.plan.take(), Some(3));
        assert!(q.plan.predicates().is_empty());
        assert!(matches!(q.post.ops(), [RelationalOp::Filter(_)]));
    }

    #[test]
    fn test_projection_changes_post_schema() {
        let q = translate(
            OperatorChain::new()
                .project(Projection::object([("who", "name"), ("years", "age")]))
                .filter(filter("@.years > 3")),
        )
        .unwrap();
        assert!(q.plan.projection().is_some());
        assert_eq!(q.post.ops().len(), 1);

        let err = translate(
            OperatorChain::new()
                .project(Projection::object([("who", "name")]))
                .filter(filter("@.age > 3")),
        )
        .unwrap_err();
        assert_eq!(err.code(), TranslationErrorCode::FlowTranslateUnknownMember);
    }

    #[test]
    fn test_group_and_join_are_post_ops() {
        let spec = JoinSpec::new(vec![json!({"city": "Oslo", "country": "NO"})], "city", "city");
        let q = translate(
            OperatorChain::new()
                .filter(filter("@.age > 1"))
                .join(spec)
                .group_by("inner.country")
                .aggregate(Aggregate::Count),
        )
        .unwrap();
        assert_eq!(q.plan.predicates().len(), 1);
        assert_eq!(q.post.ops().len(), 2);
        assert!(matches!(q.post.terminal().map(|t| &t.aggregate), Some(Aggregate::Count)));
    }

    #[test]
    fn test_aggregate_must_be_last() {
        let err = translate(OperatorChain::new().aggregate(Aggregate::Count).take(1)).unwrap_err();
        assert_eq!(err.code(), TranslationErrorCode::FlowTranslateInvalidOrder);
    }

    #[test]
    fn test_then_by_requires_order_by() {
        let err = translate(OperatorChain::new().then_by("age", true)).unwrap_err();
        assert_eq!(err.code(), TranslationErrorCode::FlowTranslateInvalidOrder);

        let err = translate(
            OperatorChain::new()
                .order_by("age", true)
                .filter(filter("@.age > 1"))
                .then_by("name", true),
        )
        .unwrap_err();
        assert_eq!(err.code(), TranslationErrorCode::FlowTranslateInvalidOrder);
    }

    #[test]
    fn test_unknown_member_rejected() {
        let err = translate(OperatorChain::new().order_by("salary", true)).unwrap_err();
        assert_eq!(err.code(), TranslationErrorCode::FlowTranslateUnknownMember);
        assert_eq!(err.field(), Some("salary"));
    }

    #[test]
    fn test_sum_over_string_rejected() {
        let err = translate(OperatorChain::new().aggregate(Aggregate::Sum(FieldPath::from("name")))).unwrap_err();
        assert_eq!(err.code(), TranslationErrorCode::FlowTranslateTypeMismatch);

        assert!(translate(OperatorChain::new().aggregate(Aggregate::Max(FieldPath::from("name")))).is_ok());
    }

    #[test]
    fn test_group_schema_depends_on_key() {
        let cache = CompilerCache::new();
        let translator = Translator::new(&cache);
        let by_age = OperatorChain::new().group_by("age").filter(filter("@.key > 3"));
        let by_name = OperatorChain::new().group_by("name").filter(filter("@.key > 3"));

        assert!(translator.translate(&by_age, &person()).is_ok());
        let err = translator.translate(&by_name, &person()).unwrap_err();
        assert_eq!(err.code(), TranslationErrorCode::FlowTranslateTypeMismatch);
    }
}
