//! Explain output
//!
//! Produces deterministic, human-readable descriptions of a translation.

use std::fmt;

use super::errors::TranslationError;
use super::plan::TranslatedQuery;

/// Explain output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainPlan {
    /// Whether translation succeeded
    pub accepted: bool,
    pub source_schema: Option<String>,
    pub predicates: Vec<String>,
    pub sort_keys: Vec<String>,
    pub skip: usize,
    pub take: Option<usize>,
    pub projection: Option<String>,
    /// In-memory operators after the plan
    pub post_ops: Vec<String>,
    pub terminal: Option<String>,
    pub empty_result: bool,
    pub rejection_reason: Option<String>,
    pub rejection_code: Option<String>,
}

impl ExplainPlan {
    pub fn from_query(query: &TranslatedQuery) -> Self {
        let plan = &query.plan;
        Self {
            accepted: true,
            source_schema: Some(plan.source_schema().schema_id.clone()),
            predicates: plan.predicates().iter().map(|p| p.text().to_string()).collect(),
            sort_keys: plan.sort_keys().iter().map(|k| k.to_string()).collect(),
            skip: plan.skip(),
            take: plan.take(),
            projection: plan
                .projection()
                .map(|s| s.result_schema().schema_id.clone()),
            post_ops: query.post.ops().iter().map(|op| op.to_string()).collect(),
            terminal: query.post.terminal().map(|t| t.aggregate.to_string()),
            empty_result: plan.is_empty_result(),
            rejection_reason: None,
            rejection_code: None,
        }
    }

    pub fn from_error(err: &TranslationError) -> Self {
        Self {
            accepted: false,
            source_schema: None,
            predicates: Vec::new(),
            sort_keys: Vec::new(),
            skip: 0,
            take: None,
            projection: None,
            post_ops: Vec::new(),
            terminal: None,
            empty_result: false,
            rejection_reason: Some(err.message().to_string()),
            rejection_code: Some(err.code().code().to_string()),
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if !self.accepted {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
            return Ok(());
        }

        writeln!(f, "Status: ACCEPTED")?;
        if let Some(schema) = &self.source_schema {
            writeln!(f, "Source: {}", schema)?;
        }
        if self.empty_result {
            writeln!(f, "Empty Result: source is not read")?;
        }
        if !self.predicates.is_empty() {
            writeln!(f, "Predicates:")?;
            for pred in &self.predicates {
                writeln!(f, "  - {}", pred)?;
            }
        }
        if !self.sort_keys.is_empty() {
            writeln!(f, "Sort: {}", self.sort_keys.join(", "))?;
        }
        writeln!(f, "Skip: {}", self.skip)?;
        match self.take {
            Some(take) => writeln!(f, "Take: {}", take)?,
            None => writeln!(f, "Take: unbounded")?,
        }
        if let Some(projection) = &self.projection {
            writeln!(f, "Projection: {}", projection)?;
        }
        if !self.post_ops.is_empty() {
            writeln!(f, "Post-processing:")?;
            for op in &self.post_ops {
                writeln!(f, "  - {}", op)?;
            }
        }
        if let Some(terminal) = &self.terminal {
            writeln!(f, "Terminal: {}", terminal)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompilerCache;
    use crate::path::FilterExpr;
    use crate::planner::{Aggregate, OperatorChain, Translator};
    use crate::schema::ElementSchema;

    fn chain() -> OperatorChain {
        OperatorChain::new()
            .filter(FilterExpr::parse("@.age > 25").unwrap())
            .order_by("name", true)
            .take(10)
            .group_by("city")
            .aggregate(Aggregate::Count)
    }

    #[test]
    fn test_explain_accepted() {
        let cache = CompilerCache::new();
        let query = Translator::new(&cache)
            .translate(&chain(), &ElementSchema::dynamic())
            .unwrap();
        let explain = ExplainPlan::from_query(&query);

        assert!(explain.accepted);
        assert_eq!(explain.predicates, vec!["@.age > 25"]);
        assert_eq!(explain.sort_keys, vec!["name asc"]);
        assert_eq!(explain.take, Some(10));
        assert_eq!(explain.post_ops, vec!["group_by(city)"]);
        assert_eq!(explain.terminal.as_deref(), Some("count()"));

        let output = format!("{}", explain);
        assert!(output.contains("ACCEPTED"));
        assert!(output.contains("Take: 10"));
    }

    #[test]
    fn test_explain_rejected() {
        let err = TranslationError::unsupported("descendant segment");
        let explain = ExplainPlan::from_error(&err);

        assert!(!explain.accepted);
        assert_eq!(explain.rejection_code.as_deref(), Some("FLOW_TRANSLATE_UNSUPPORTED"));
        let output = format!("{}", explain);
        assert!(output.contains("REJECTED"));
        assert!(output.contains("FLOW_TRANSLATE_UNSUPPORTED"));
    }

    #[test]
    fn test_explain_deterministic() {
        let cache = CompilerCache::new();
        let translator = Translator::new(&cache);
        let a = translator.translate(&chain(), &ElementSchema::dynamic()).unwrap();
        let b = translator.translate(&chain(), &ElementSchema::dynamic()).unwrap();
        assert_eq!(
            format!("{}", ExplainPlan::from_query(&a)),
            format!("{}", ExplainPlan::from_query(&b))
        );
    }
}
