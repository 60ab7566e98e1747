// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::HashMap;

use indexmap::IndexMap;
use ripple_registry::{IvmAggregate, RowEvaluator};
use ripple_type::{EntityKey, Row, Value};

use crate::diff::{Batch, Diff};
use crate::operator::DataflowOperator;

pub type AggregateFactory = Box<dyn Fn() -> Box<dyn IvmAggregate> + Send>;

struct GroupState {
    aggregates: IndexMap<String, Box<dyn IvmAggregate>>,
    member_count: i64,
}

/// Maintains a map `group -> aggregate states`, per spec §4.9: emits a
/// *paired delete+insert* when an aggregate value changes for an existing
/// group and a pure insert when a new group first appears. A group whose
/// member count drops to zero is retracted with a pure delete.
///
/// An empty `group_exprs` collapses every row into a single group — this is
/// how `reduce` (an unkeyed fold over the whole stream) is expressed in
/// terms of the same incremental machinery as `groupBy`.
pub struct GroupBy {
    group_exprs: Vec<RowEvaluator>,
    aggregate_factories: IndexMap<String, AggregateFactory>,
    value_extractors: IndexMap<String, RowEvaluator>,
    groups: HashMap<Vec<Value>, GroupState>,
}

impl GroupBy {
    pub fn new(group_exprs: Vec<RowEvaluator>) -> Self {
        GroupBy {
            group_exprs,
            aggregate_factories: IndexMap::new(),
            value_extractors: IndexMap::new(),
            groups: HashMap::new(),
        }
    }

    pub fn with_aggregate(
        mut self,
        output_name: impl Into<String>,
        factory: AggregateFactory,
        value_extractor: RowEvaluator,
    ) -> Self {
        let name = output_name.into();
        self.aggregate_factories.insert(name.clone(), factory);
        self.value_extractors.insert(name, value_extractor);
        self
    }

    fn group_key(&self, row: &Row) -> Vec<Value> {
        self.group_exprs.iter().map(|e| e(row)).collect()
    }

    fn group_entity_key(&self, key: &[Value]) -> EntityKey {
        let rendered = key.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        EntityKey::Text(rendered)
    }

    /// Names used to project group-by key columns back into the output
    /// row. Positional (`_group_0`, `_group_1`, ...) since `BasicExpression`
    /// group-by terms have no inherent name; the query compiler is
    /// responsible for re-labeling these via `select`.
    fn group_key_names(&self) -> Vec<String> {
        (0..self.group_exprs.len()).map(|i| format!("_group_{i}")).collect()
    }

    fn snapshot(&self, key: &[Value], state: &GroupState) -> Row {
        let mut row = Row::new();
        for (name, value) in self.group_key_names().iter().zip(key.iter()) {
            row.set(name.clone(), value.clone());
        }
        for (name, aggregate) in &state.aggregates {
            row.set(name.clone(), aggregate.current());
        }
        row
    }

    pub fn apply(&mut self, input: Batch) -> Batch {
        let mut out = Batch::new();

        for diff in input {
            let key = self.group_key(&diff.value);
            let previous_row = self.groups.get(&key).map(|state| self.snapshot(&key, state));

            let (member_count, new_row) = {
                let group_key_names = self.group_key_names();
                let aggregate_factories = &self.aggregate_factories;
                let value_extractors = &self.value_extractors;

                let state = self.groups.entry(key.clone()).or_insert_with(|| GroupState {
                    aggregates: aggregate_factories.iter().map(|(name, factory)| (name.clone(), factory())).collect(),
                    member_count: 0,
                });

                let magnitude = diff.multiplicity.unsigned_abs() as usize;
                for (name, aggregate) in state.aggregates.iter_mut() {
                    let value =
                        value_extractors.get(name).map(|e| e(&diff.value)).unwrap_or(Value::Undefined);
                    for _ in 0..magnitude {
                        if diff.multiplicity > 0 {
                            aggregate.add(&value);
                        } else {
                            aggregate.remove(&value);
                        }
                    }
                }
                state.member_count += diff.multiplicity;

                let mut row = Row::new();
                for (name, value) in group_key_names.iter().zip(key.iter()) {
                    row.set(name.clone(), value.clone());
                }
                for (name, aggregate) in &state.aggregates {
                    row.set(name.clone(), aggregate.current());
                }
                (state.member_count, row)
            };

            let entity_key = self.group_entity_key(&key);
            if member_count <= 0 {
                if let Some(prev) = previous_row {
                    out.push(Diff::retract(entity_key, prev));
                }
                self.groups.remove(&key);
            } else {
                match previous_row {
                    None => out.push(Diff::insert(entity_key, new_row)),
                    Some(prev) if prev != new_row => {
                        out.push(Diff::retract(entity_key.clone(), prev));
                        out.push(Diff::insert(entity_key, new_row));
                    }
                    Some(_) => {}
                }
            }
        }

        out
    }
}

impl DataflowOperator for GroupBy {
    fn apply(&mut self, input: Batch) -> Batch {
        GroupBy::apply(self, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_registry::AggregateRegistry;
    use std::sync::Arc;

    fn row_with(field: &str, value: Value) -> Row {
        let mut row = Row::new();
        row.set(field, value);
        row
    }

    #[test]
    fn emits_insert_then_paired_delete_insert_as_count_grows() {
        let registry = AggregateRegistry::new();
        let count = registry.get("count").unwrap();
        let extractor: RowEvaluator = Arc::new(|row: &Row| row.get("id").clone());
        let group_by = GroupBy::new(vec![Arc::new(|row: &Row| row.get("lang").clone())]);
        let mut group_by =
            group_by.with_aggregate("count", Box::new(move || count.factory(extractor.clone())), extractor.clone());

        let batch1 = vec![Diff::insert(
            EntityKey::from("e1"),
            row_with("lang", Value::from("ru")).merged_with(&row_with("id", Value::from("e1"))),
        )];
        let out1 = group_by.apply(batch1);
        assert_eq!(out1.len(), 1);
        assert_eq!(out1[0].value.get("count"), &Value::Int(1));

        let batch2 = vec![Diff::insert(
            EntityKey::from("e2"),
            row_with("lang", Value::from("ru")).merged_with(&row_with("id", Value::from("e2"))),
        )];
        let out2 = group_by.apply(batch2);
        assert_eq!(out2.len(), 2, "expected a paired delete+insert");
        assert_eq!(out2[0].multiplicity, -1);
        assert_eq!(out2[1].multiplicity, 1);
        assert_eq!(out2[1].value.get("count"), &Value::Int(2));
    }

    #[test]
    fn group_disappears_when_member_count_reaches_zero() {
        let registry = AggregateRegistry::new();
        let count = registry.get("count").unwrap();
        let extractor: RowEvaluator = Arc::new(|row: &Row| row.get("id").clone());
        let group_by = GroupBy::new(vec![Arc::new(|row: &Row| row.get("lang").clone())]);
        let mut group_by =
            group_by.with_aggregate("count", Box::new(move || count.factory(extractor.clone())), extractor.clone());

        let row = row_with("lang", Value::from("ru")).merged_with(&row_with("id", Value::from("e1")));
        group_by.apply(vec![Diff::insert(EntityKey::from("e1"), row.clone())]);
        let out = group_by.apply(vec![Diff::retract(EntityKey::from("e1"), row)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].multiplicity, -1);
    }
}
