// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! The operator and aggregate registry: pluggable evaluators for scalar
//! functions and aggregates, looked up by name at query-compile time.
//!
//! Mirrors the "dynamic operator/aggregate registry -> sum types + factory
//! tables" redesign: registration happens once at process start (or once
//! per [`OperatorRegistry`]/[`AggregateRegistry`] built with defaults), and
//! lookups happen purely at compilation time, so registration order never
//! matters.

mod aggregate;
mod builtin_aggregates;
mod builtin_operators;
mod error;
mod operator;

pub use aggregate::{Aggregate, IvmAggregate, ValueTransform};
pub use error::{Error, Result};
pub use operator::{Operator, RowEvaluator};

use std::collections::HashMap;

/// Registry of scalar operators (`eq`, `gt`, `and`, ...), keyed by the name
/// used in `BasicExpression::Func`.
pub struct OperatorRegistry {
    operators: HashMap<String, Box<dyn Operator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        let mut operators: HashMap<String, Box<dyn Operator>> = HashMap::new();
        builtin_operators::register_all(&mut operators);
        OperatorRegistry { operators }
    }

    pub fn register(&mut self, name: impl Into<String>, operator: Box<dyn Operator>) {
        self.operators.insert(name.into(), operator);
    }

    pub fn get(&self, name: &str) -> Result<&dyn Operator> {
        self.operators.get(name).map(|o| o.as_ref()).ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of aggregate functions (`count`, `sum`, `min`, `max`, `avg`),
/// keyed by the name used in `Agg`.
pub struct AggregateRegistry {
    aggregates: HashMap<String, Box<dyn Aggregate>>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        let mut aggregates: HashMap<String, Box<dyn Aggregate>> = HashMap::new();
        builtin_aggregates::register_all(&mut aggregates);
        AggregateRegistry { aggregates }
    }

    pub fn register(&mut self, name: impl Into<String>, aggregate: Box<dyn Aggregate>) {
        self.aggregates.insert(name.into(), aggregate);
    }

    pub fn get(&self, name: &str) -> Result<&dyn Aggregate> {
        self.aggregates
            .get(name)
            .map(|a| a.as_ref())
            .ok_or_else(|| Error::UnsupportedAggregateFunction(name.to_string()))
    }
}

impl Default for AggregateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operator_fails_with_name() {
        let registry = OperatorRegistry::new();
        let err = registry.get("definitely_not_registered").unwrap_err();
        assert_eq!(err, Error::UnknownFunction("definitely_not_registered".to_string()));
    }

    #[test]
    fn unknown_aggregate_fails_with_name() {
        let registry = AggregateRegistry::new();
        let err = registry.get("definitely_not_registered").unwrap_err();
        assert_eq!(err, Error::UnsupportedAggregateFunction("definitely_not_registered".to_string()));
    }
}
