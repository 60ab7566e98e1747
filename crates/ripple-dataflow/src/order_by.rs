// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::HashMap;

use ripple_index::{Collation, RangeIndex};
use ripple_registry::RowEvaluator;
use ripple_type::{EntityKey, Row, Value};

use crate::diff::{Batch, Diff};
use crate::operator::DataflowOperator;

/// `orderBy` (and the `limit`/top-K operator built on it) implemented as a
/// range index over the ordering expression, per spec §4.9: "`orderBy` is
/// implemented by a range index over the ordering expression and surfaces a
/// stable `_orderByIndex` attribute for the top-K / limit operator."
///
/// A `limit` of `None` orders the full input; `Some(n)` caps the maintained
/// window to the top `n` rows (after skipping `offset`), re-paging as rows
/// enter/leave it.
pub struct OrderBy {
    index: RangeIndex,
    rows: HashMap<EntityKey, Row>,
    offset: usize,
    limit: Option<usize>,
    last_snapshot: Vec<(EntityKey, Row)>,
}

impl OrderBy {
    pub fn new(extractor: RowEvaluator, collation: Collation, offset: usize, limit: Option<usize>) -> Self {
        OrderBy {
            index: RangeIndex::new(extractor, collation),
            rows: HashMap::new(),
            offset,
            limit,
            last_snapshot: Vec::new(),
        }
    }

    fn window(&self) -> Vec<(EntityKey, Row)> {
        let ordered = self.index.take(self.index.len(), None, |_| true);
        let limit = self.limit.unwrap_or(ordered.len());
        ordered
            .into_iter()
            .skip(self.offset)
            .take(limit)
            .enumerate()
            .map(|(position, key)| {
                let mut row = self.rows.get(&key).cloned().unwrap_or_else(Row::new);
                row.set("_orderByIndex", Value::Int((self.offset + position) as i64));
                (key, row)
            })
            .collect()
    }

    pub fn apply(&mut self, input: Batch) -> Batch {
        for diff in input {
            let previous = self.rows.get(&diff.key).cloned();
            if diff.multiplicity > 0 {
                match &previous {
                    Some(old) => self.index.update(&diff.key, old, &diff.value),
                    None => self.index.insert(diff.key.clone(), &diff.value),
                }
                self.rows.insert(diff.key.clone(), diff.value);
            } else if let Some(old) = previous {
                self.index.remove(&diff.key, &old);
                self.rows.remove(&diff.key);
            }
        }

        let new_snapshot = self.window();
        let out = diff_snapshots(&self.last_snapshot, &new_snapshot);
        self.last_snapshot = new_snapshot;
        out
    }
}

impl DataflowOperator for OrderBy {
    fn apply(&mut self, input: Batch) -> Batch {
        OrderBy::apply(self, input)
    }
}

fn diff_snapshots(old: &[(EntityKey, Row)], new: &[(EntityKey, Row)]) -> Batch {
    let mut out = Batch::new();
    let len = old.len().max(new.len());
    for i in 0..len {
        let old_entry = old.get(i);
        let new_entry = new.get(i);
        match (old_entry, new_entry) {
            (Some((ok, orow)), Some((nk, nrow))) if ok == nk && orow == nrow => {}
            (Some((ok, orow)), Some((nk, nrow))) => {
                out.push(Diff::retract(ok.clone(), orow.clone()));
                out.push(Diff::insert(nk.clone(), nrow.clone()));
            }
            (Some((ok, orow)), None) => out.push(Diff::retract(ok.clone(), orow.clone())),
            (None, Some((nk, nrow))) => out.push(Diff::insert(nk.clone(), nrow.clone())),
            (None, None) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn extractor() -> RowEvaluator {
        Arc::new(|row: &Row| row.get("score").clone())
    }

    fn row_with(field: &str, value: Value) -> Row {
        let mut row = Row::new();
        row.set(field, value);
        row
    }

    #[test]
    fn emits_insert_with_stable_order_index() {
        let mut order_by = OrderBy::new(extractor(), Collation::natural(), 0, None);
        let out = order_by.apply(vec![Diff::insert(EntityKey::from("a"), row_with("score", Value::Int(5)))]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value.get("_orderByIndex"), &Value::Int(0));
    }

    #[test]
    fn top_k_evicts_displaced_row_when_a_lower_ranked_one_arrives() {
        // ascending collation: the window holds the smallest-scored rows.
        let mut order_by = OrderBy::new(extractor(), Collation::natural(), 0, Some(1));
        order_by.apply(vec![Diff::insert(EntityKey::from("a"), row_with("score", Value::Int(5)))]);
        let out = order_by.apply(vec![Diff::insert(EntityKey::from("b"), row_with("score", Value::Int(1)))]);
        assert_eq!(out.len(), 2, "expected a paired delete+insert replacing the window's sole slot");
        assert_eq!(out[0].multiplicity, -1);
        assert_eq!(out[0].key, EntityKey::from("a"));
        assert_eq!(out[1].multiplicity, 1);
        assert_eq!(out[1].key, EntityKey::from("b"));
    }

    #[test]
    fn offset_skips_leading_entries_and_renumbers_from_it() {
        let mut order_by = OrderBy::new(extractor(), Collation::natural(), 1, Some(1));
        order_by.apply(vec![
            Diff::insert(EntityKey::from("a"), row_with("score", Value::Int(1))),
            Diff::insert(EntityKey::from("b"), row_with("score", Value::Int(2))),
            Diff::insert(EntityKey::from("c"), row_with("score", Value::Int(3))),
        ]);
        assert_eq!(order_by.last_snapshot.len(), 1);
        let (key, row) = &order_by.last_snapshot[0];
        assert_eq!(key, &EntityKey::from("b"));
        assert_eq!(row.get("_orderByIndex"), &Value::Int(1));
    }

    #[test]
    fn retracting_a_row_shrinks_the_snapshot() {
        let mut order_by = OrderBy::new(extractor(), Collation::natural(), 0, None);
        let row = row_with("score", Value::Int(1));
        order_by.apply(vec![Diff::insert(EntityKey::from("a"), row.clone())]);
        let out = order_by.apply(vec![Diff::retract(EntityKey::from("a"), row)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].multiplicity, -1);
    }
}
