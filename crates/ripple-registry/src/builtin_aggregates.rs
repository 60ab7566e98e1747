// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::HashMap;

use ripple_type::Value;

use crate::aggregate::{Aggregate, IvmAggregate, ValueTransform};
use crate::operator::RowEvaluator;

pub(crate) fn register_all(aggregates: &mut HashMap<String, Box<dyn Aggregate>>) {
    aggregates.insert("count".into(), Box::new(CountAggregate));
    aggregates.insert("sum".into(), Box::new(SumAggregate));
    aggregates.insert("avg".into(), Box::new(AvgAggregate));
    aggregates.insert("min".into(), Box::new(MinAggregate));
    aggregates.insert("max".into(), Box::new(MaxAggregate));
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some((*f).into()),
        _ => None,
    }
}

struct CountAggregate;

impl Aggregate for CountAggregate {
    fn value_transform(&self) -> ValueTransform {
        ValueTransform::Raw
    }

    fn factory(&self, value_extractor: RowEvaluator) -> Box<dyn IvmAggregate> {
        Box::new(CountState { count: 0, extractor: value_extractor })
    }
}

struct CountState {
    count: i64,
    // retained for interface symmetry with the other aggregates; count
    // only tracks presence and never evaluates the row.
    #[allow(dead_code)]
    extractor: RowEvaluator,
}

impl IvmAggregate for CountState {
    fn add(&mut self, _value: &Value) {
        self.count += 1;
    }

    fn remove(&mut self, _value: &Value) {
        self.count -= 1;
    }

    fn current(&self) -> Value {
        Value::Int(self.count)
    }
}

struct SumAggregate;

impl Aggregate for SumAggregate {
    fn value_transform(&self) -> ValueTransform {
        ValueTransform::Numeric
    }

    fn factory(&self, _value_extractor: RowEvaluator) -> Box<dyn IvmAggregate> {
        Box::new(SumState { total: 0.0 })
    }
}

struct SumState {
    total: f64,
}

impl IvmAggregate for SumState {
    fn add(&mut self, value: &Value) {
        if let Some(n) = numeric(value) {
            self.total += n;
        }
    }

    fn remove(&mut self, value: &Value) {
        if let Some(n) = numeric(value) {
            self.total -= n;
        }
    }

    fn current(&self) -> Value {
        Value::float(self.total)
    }
}

struct AvgAggregate;

impl Aggregate for AvgAggregate {
    fn value_transform(&self) -> ValueTransform {
        ValueTransform::Numeric
    }

    fn factory(&self, _value_extractor: RowEvaluator) -> Box<dyn IvmAggregate> {
        Box::new(AvgState { total: 0.0, count: 0 })
    }
}

struct AvgState {
    total: f64,
    count: i64,
}

impl IvmAggregate for AvgState {
    fn add(&mut self, value: &Value) {
        if let Some(n) = numeric(value) {
            self.total += n;
            self.count += 1;
        }
    }

    fn remove(&mut self, value: &Value) {
        if let Some(n) = numeric(value) {
            self.total -= n;
            self.count -= 1;
        }
    }

    fn current(&self) -> Value {
        if self.count == 0 {
            Value::Null
        } else {
            Value::float(self.total / self.count as f64)
        }
    }
}

/// `min`/`max` keep a full multiset of live values rather than a running
/// extremum so that removing the current extremum can recompute correctly
/// in constant-factor time proportional to group size.
struct MinAggregate;

impl Aggregate for MinAggregate {
    fn value_transform(&self) -> ValueTransform {
        ValueTransform::NumericOrDate
    }

    fn factory(&self, _value_extractor: RowEvaluator) -> Box<dyn IvmAggregate> {
        Box::new(ExtremumState { values: Vec::new(), pick_min: true })
    }
}

struct MaxAggregate;

impl Aggregate for MaxAggregate {
    fn value_transform(&self) -> ValueTransform {
        ValueTransform::NumericOrDate
    }

    fn factory(&self, _value_extractor: RowEvaluator) -> Box<dyn IvmAggregate> {
        Box::new(ExtremumState { values: Vec::new(), pick_min: false })
    }
}

struct ExtremumState {
    values: Vec<Value>,
    pick_min: bool,
}

impl IvmAggregate for ExtremumState {
    fn add(&mut self, value: &Value) {
        self.values.push(value.clone());
    }

    fn remove(&mut self, value: &Value) {
        if let Some(pos) = self.values.iter().position(|v| v == value) {
            self.values.remove(pos);
        }
    }

    fn current(&self) -> Value {
        if self.values.is_empty() {
            return Value::Null;
        }
        if self.pick_min {
            self.values.iter().min().cloned().unwrap_or(Value::Null)
        } else {
            self.values.iter().max().cloned().unwrap_or(Value::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn identity() -> RowEvaluator {
        Arc::new(|row: &ripple_type::Row| row.get("v").clone())
    }

    #[test]
    fn sum_tracks_add_and_remove() {
        let mut state = SumAggregate.factory(identity());
        state.add(&Value::Int(3));
        state.add(&Value::Int(4));
        assert_eq!(state.current(), Value::float(7.0));
        state.remove(&Value::Int(3));
        assert_eq!(state.current(), Value::float(4.0));
    }

    #[test]
    fn max_recomputes_after_removing_extremum() {
        let mut state = MaxAggregate.factory(identity());
        state.add(&Value::Int(1));
        state.add(&Value::Int(5));
        state.add(&Value::Int(3));
        assert_eq!(state.current(), Value::Int(5));
        state.remove(&Value::Int(5));
        assert_eq!(state.current(), Value::Int(3));
    }

    #[test]
    fn avg_of_empty_group_is_null() {
        let state = AvgAggregate.factory(identity());
        assert_eq!(state.current(), Value::Null);
    }
}
