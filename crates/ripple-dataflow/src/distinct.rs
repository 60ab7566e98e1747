// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::HashMap;

use ripple_type::Row;

use crate::diff::{Batch, Diff};
use crate::operator::DataflowOperator;

/// Collapses multiplicities to at most one contribution per distinct
/// `(key, value)` pair: a row already present in the output is not
/// re-emitted while its multiplicity stays positive, and is retracted only
/// once its multiplicity drops to zero or below.
///
/// Unlike [`crate::diff::consolidate`], which sums multiplicities within a
/// single batch, `Distinct` is a stateful operator tracking cumulative
/// multiplicity across batches.
#[derive(Default)]
pub struct Distinct {
    counts: HashMap<Row, i64>,
}

impl Distinct {
    pub fn new() -> Self {
        Distinct { counts: HashMap::new() }
    }

    pub fn apply(&mut self, input: Batch) -> Batch {
        let mut out = Batch::new();
        for diff in input {
            let count = self.counts.entry(diff.value.clone()).or_insert(0);
            let was_present = *count > 0;
            *count += diff.multiplicity;
            let now_present = *count > 0;
            let drained = *count <= 0;

            if was_present && !now_present {
                out.push(Diff::retract(diff.key, diff.value.clone()));
            } else if !was_present && now_present {
                out.push(Diff::insert(diff.key, diff.value.clone()));
            }

            if drained {
                self.counts.remove(&diff.value);
            }
        }
        out
    }
}

impl DataflowOperator for Distinct {
    fn apply(&mut self, input: Batch) -> Batch {
        Distinct::apply(self, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_type::{EntityKey, Value};

    fn row_with(field: &str, value: Value) -> Row {
        let mut row = Row::new();
        row.set(field, value);
        row
    }

    #[test]
    fn duplicate_inserts_of_the_same_value_emit_once() {
        let mut distinct = Distinct::new();
        let row = row_with("v", Value::Int(1));
        let out1 = distinct.apply(vec![Diff::insert(EntityKey::from("a"), row.clone())]);
        let out2 = distinct.apply(vec![Diff::insert(EntityKey::from("b"), row.clone())]);
        assert_eq!(out1.len(), 1);
        assert!(out2.is_empty(), "second contributor of an already-present value emits nothing");
    }

    #[test]
    fn row_is_retracted_only_after_its_last_contributor_leaves() {
        let mut distinct = Distinct::new();
        let row = row_with("v", Value::Int(1));
        distinct.apply(vec![Diff::insert(EntityKey::from("a"), row.clone())]);
        distinct.apply(vec![Diff::insert(EntityKey::from("b"), row.clone())]);

        let out = distinct.apply(vec![Diff::retract(EntityKey::from("a"), row.clone())]);
        assert!(out.is_empty(), "one remaining contributor keeps the value present");

        let out = distinct.apply(vec![Diff::retract(EntityKey::from("b"), row)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].multiplicity, -1);
    }
}
