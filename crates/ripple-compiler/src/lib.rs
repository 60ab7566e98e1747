// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! Compiles [`BasicExpression`] trees into pure row evaluators.
//!
//! A compiled query's rows are "namespaced": each top-level field of the
//! working [`Row`] is a join alias holding that alias's entity as a nested
//! [`Value::Object`]. A `Ref(["user", "id"])` therefore resolves by looking
//! up `user` then `id` inside it; a single-segment `Ref(["id"])` (the
//! post-path-stripping collection-filter form) resolves directly against an
//! un-namespaced row.

use std::sync::Arc;

use ripple_ir::{Agg, BasicExpression};
use ripple_registry::{AggregateRegistry, IvmAggregate, OperatorRegistry, RowEvaluator};
use ripple_type::{Row, Value};

/// Compiles [`BasicExpression`]s against a shared operator registry. Cheap
/// to construct per-compile-call since it only borrows an `Arc`.
#[derive(Clone)]
pub struct ExpressionCompiler {
    operators: Arc<OperatorRegistry>,
}

impl ExpressionCompiler {
    pub fn new(operators: Arc<OperatorRegistry>) -> Self {
        ExpressionCompiler { operators }
    }

    /// `is_single_row` mirrors the operator factory hint: true when the
    /// compiled evaluator is known to run against groups of at most one row
    /// (e.g. a `findOne`-marked query), letting operators skip per-row
    /// branching they'd otherwise need for multi-row groups.
    pub fn compile(&self, expr: &BasicExpression, is_single_row: bool) -> ripple_registry::Result<RowEvaluator> {
        match expr {
            BasicExpression::Val(value) => {
                let value = value.clone();
                Ok(Arc::new(move |_row: &Row| value.clone()))
            }
            BasicExpression::Ref(path) => Ok(compile_ref(path.clone())),
            BasicExpression::Func(name, args) => {
                let operator = self.operators.get(name)?;
                let compiled_args = args
                    .iter()
                    .map(|arg| self.compile(arg, is_single_row))
                    .collect::<ripple_registry::Result<Vec<_>>>()?;
                Ok(operator.build(compiled_args, is_single_row))
            }
        }
    }

    /// Compiles a boolean predicate, defaulting to `false` for any non-bool
    /// result (e.g. a mis-typed expression) rather than panicking.
    pub fn compile_predicate(
        &self,
        expr: &BasicExpression,
        is_single_row: bool,
    ) -> ripple_registry::Result<Arc<dyn Fn(&Row) -> bool + Send + Sync>> {
        let evaluator = self.compile(expr, is_single_row)?;
        Ok(Arc::new(move |row| evaluator(row).as_bool().unwrap_or(false)))
    }
}

fn compile_ref(path: Vec<String>) -> RowEvaluator {
    if path.len() == 1 {
        let field = path[0].clone();
        Arc::new(move |row: &Row| row.get(&field).clone())
    } else {
        Arc::new(move |row: &Row| row.get(&path[0]).get_path(&path[1..]).clone())
    }
}

/// Compiles an [`Agg`] into a fresh per-group [`IvmAggregate`] factory, used
/// by `groupBy` to instantiate one aggregate state per group.
#[derive(Clone)]
pub struct AggregateCompiler {
    operators: Arc<OperatorRegistry>,
    aggregates: Arc<AggregateRegistry>,
}

impl AggregateCompiler {
    pub fn new(operators: Arc<OperatorRegistry>, aggregates: Arc<AggregateRegistry>) -> Self {
        AggregateCompiler { operators, aggregates }
    }

    pub fn compile(&self, agg: &Agg) -> ripple_registry::Result<Box<dyn Fn() -> Box<dyn IvmAggregate> + Send + Sync>> {
        // Validate the name eagerly so compile() fails at query-compile time
        // rather than on first row.
        self.aggregates.get(&agg.name)?;

        let expr_compiler = ExpressionCompiler::new(self.operators.clone());
        let extractor = match agg.args.first() {
            Some(expr) => expr_compiler.compile(expr, false)?,
            None => Arc::new(|_row: &Row| Value::Undefined),
        };

        let name = agg.name.clone();
        let aggregates = self.aggregates.clone();
        Ok(Box::new(move || {
            let aggregate = aggregates.get(&name).expect("aggregate name was validated at compile time");
            aggregate.factory(extractor.clone())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_ir::BasicExpression;

    #[test]
    fn compiles_equality_over_refs() {
        let operators = Arc::new(OperatorRegistry::new());
        let compiler = ExpressionCompiler::new(operators);
        let expr = BasicExpression::func(
            "eq",
            vec![BasicExpression::reference(["id"]), BasicExpression::val(1i64)],
        );
        let evaluator = compiler.compile(&expr, false).unwrap();
        let mut row = Row::new();
        row.set("id", Value::Int(1));
        assert_eq!(evaluator(&row), Value::Bool(true));
    }

    #[test]
    fn resolves_namespaced_ref_through_alias() {
        let operators = Arc::new(OperatorRegistry::new());
        let compiler = ExpressionCompiler::new(operators);
        let expr = BasicExpression::reference(["user", "id"]);
        let evaluator = compiler.compile(&expr, false).unwrap();

        let mut namespaced = Row::new();
        namespaced.set("user", Value::Object(std::collections::BTreeMap::from([("id".to_string(), Value::Int(7))])));
        assert_eq!(evaluator(&namespaced), Value::Int(7));
    }

    #[test]
    fn unknown_function_surfaces_name() {
        let operators = Arc::new(OperatorRegistry::new());
        let compiler = ExpressionCompiler::new(operators);
        let expr = BasicExpression::func("nope", vec![]);
        let err = compiler.compile(&expr, false).unwrap_err();
        assert_eq!(err, ripple_registry::Error::UnknownFunction("nope".to_string()));
    }

    #[test]
    fn aggregate_factory_produces_independent_states() {
        let operators = Arc::new(OperatorRegistry::new());
        let aggregates = Arc::new(AggregateRegistry::new());
        let compiler = AggregateCompiler::new(operators, aggregates);
        let agg = Agg::new("count", vec![BasicExpression::reference(["id"])]);
        let factory = compiler.compile(&agg).unwrap();
        let mut a = factory();
        let mut b = factory();
        a.add(&Value::Int(1));
        assert_eq!(a.current(), Value::Int(1));
        assert_eq!(b.current(), Value::Int(0));
        let _ = &mut b;
    }
}
