// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use ripple_registry::RowEvaluator;
use ripple_type::{EntityKey, Row, Value};

use crate::collation::Collation;

/// A range index over an ordering expression's value: keyed by a total
/// order (with configurable collation), used by `orderBy`'s top-K operator
/// and by `requestLimitedSnapshot`.
///
/// Backed by a sorted vector rather than a `BTreeMap` so that the ordering
/// can use an arbitrary runtime [`Collation`] instead of `Value`'s fixed
/// `Ord` impl.
pub struct RangeIndex {
    extractor: RowEvaluator,
    collation: Collation,
    entries: Vec<(Value, EntityKey)>,
}

impl RangeIndex {
    pub fn new(extractor: RowEvaluator, collation: Collation) -> Self {
        RangeIndex { extractor, collation, entries: Vec::new() }
    }

    fn position_of(&self, value: &Value, key: &EntityKey) -> Result<usize, usize> {
        self.entries.binary_search_by(|(v, k)| self.collation.compare(v, value).then_with(|| k.cmp(key)))
    }

    pub fn insert(&mut self, key: EntityKey, row: &Row) {
        let value = (self.extractor)(row);
        match self.position_of(&value, &key) {
            Ok(_) => {}
            Err(pos) => self.entries.insert(pos, (value, key)),
        }
    }

    pub fn remove(&mut self, key: &EntityKey, row: &Row) {
        let value = (self.extractor)(row);
        if let Ok(pos) = self.position_of(&value, key) {
            self.entries.remove(pos);
        }
    }

    pub fn update(&mut self, key: &EntityKey, old_row: &Row, new_row: &Row) {
        self.remove(key, old_row);
        self.insert(key.clone(), new_row);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Yields up to `limit` keys in order whose extracted value compares
    /// greater than `min_value` (exclusive), skipping entries for which
    /// `filter` returns false, stopping once `limit` keys are emitted.
    pub fn take(
        &self,
        limit: usize,
        min_value: Option<&Value>,
        mut filter: impl FnMut(&EntityKey) -> bool,
    ) -> Vec<EntityKey> {
        let start = match min_value {
            Some(min) => {
                let mut idx = 0;
                while idx < self.entries.len() && self.collation.compare(&self.entries[idx].0, min).is_le() {
                    idx += 1;
                }
                idx
            }
            None => 0,
        };

        let mut out = Vec::with_capacity(limit.min(self.entries.len()));
        for (_, key) in &self.entries[start..] {
            if out.len() == limit {
                break;
            }
            if filter(key) {
                out.push(key.clone());
            }
        }
        out
    }
}
