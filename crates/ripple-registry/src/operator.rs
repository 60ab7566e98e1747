// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::sync::Arc;

use ripple_type::{Row, Value};

/// A compiled row-to-value evaluator: a pure function of a namespaced row,
/// produced by the expression compiler from a `BasicExpression` and shared
/// freely across dataflow operators that reuse the same compiled predicate.
pub type RowEvaluator = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// A scalar operator's evaluator factory.
///
/// `build` receives the already-compiled argument evaluators plus a hint for
/// whether the surrounding query ever sees more than one row per group
/// (`is_single_row`), letting operators like `count` short-circuit to a
/// constant when known to run against exactly one row.
pub trait Operator: Send + Sync {
    fn build(&self, args: Vec<RowEvaluator>, is_single_row: bool) -> RowEvaluator;
}
