// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use indexmap::IndexMap;
use ripple_type::{EntityKey, Row};

/// One entry of the collections-of-diffs model: a keyed row with a signed
/// multiplicity. A positive multiplicity is a contribution (an insert
/// surfaces as `+1`), a negative one a retraction (a delete surfaces as
/// `-1`); an update is conventionally represented as a `-1` of the old
/// value followed by a `+1` of the new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub key: EntityKey,
    pub value: Row,
    pub multiplicity: i64,
}

impl Diff {
    pub fn new(key: EntityKey, value: Row, multiplicity: i64) -> Self {
        Diff { key, value, multiplicity }
    }

    pub fn insert(key: EntityKey, value: Row) -> Self {
        Diff::new(key, value, 1)
    }

    pub fn retract(key: EntityKey, value: Row) -> Self {
        Diff::new(key, value, -1)
    }
}

/// A batch of diffs flowing through one dataflow stage, corresponding to
/// the net effect of one sync `begin`/`commit` or one optimistic mutation.
pub type Batch = Vec<Diff>;

/// Sums multiplicities for identical `(key, value)` pairs within a batch so
/// that positive/negative contributions cancel, yielding the minimal change
/// set. Order of surviving diffs follows first appearance.
pub fn consolidate(batch: Batch) -> Batch {
    let input_len = batch.len();
    let mut totals: IndexMap<(EntityKey, Row), i64> = IndexMap::new();
    for diff in batch {
        *totals.entry((diff.key, diff.value)).or_insert(0) += diff.multiplicity;
    }

    let out: Batch = totals
        .into_iter()
        .filter(|(_, multiplicity)| *multiplicity != 0)
        .map(|((key, value), multiplicity)| Diff::new(key, value, multiplicity))
        .collect();
    tracing::trace!(input_len, output_len = out.len(), "consolidated batch");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_type::Value;

    fn row(v: i64) -> Row {
        let mut row = Row::new();
        row.set("v", Value::Int(v));
        row
    }

    #[test]
    fn cancels_insert_and_retract_of_same_value() {
        let batch = vec![Diff::insert(EntityKey::from("a"), row(1)), Diff::retract(EntityKey::from("a"), row(1))];
        assert_eq!(consolidate(batch), vec![]);
    }

    #[test]
    fn sums_repeated_contributions() {
        let batch = vec![Diff::insert(EntityKey::from("a"), row(1)), Diff::insert(EntityKey::from("a"), row(1))];
        let result = consolidate(batch);
        assert_eq!(result, vec![Diff::new(EntityKey::from("a"), row(1), 2)]);
    }

    #[test]
    fn keeps_distinct_values_for_same_key_separate() {
        let batch = vec![Diff::retract(EntityKey::from("a"), row(1)), Diff::insert(EntityKey::from("a"), row(2))];
        let mut result = consolidate(batch);
        result.sort_by_key(|d| match &d.value.get("v") {
            ripple_type::Value::Int(v) => *v,
            _ => 0,
        });
        assert_eq!(
            result,
            vec![Diff::new(EntityKey::from("a"), row(1), -1), Diff::new(EntityKey::from("a"), row(2), 1)]
        );
    }
}
