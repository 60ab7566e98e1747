// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::HashMap;

use parking_lot::Mutex;
use ripple_index::EqualityIndex;
use ripple_type::{EntityKey, Row, Value};

use crate::change::{Change, ChangeType};
use crate::config::AutoIndex;

/// Equality indexes over fields a caller has registered interest in, kept
/// current from every change batch (spec §4.1's auto-indexing: "indexes are
/// kept synchronized with every change"). A collection with `autoIndex =
/// off` never builds any of these — [`FieldIndexes::ensure_field`] is then a
/// no-op and [`FieldIndexes::lookup`] always misses, falling back to a full
/// scan at the call site.
pub struct FieldIndexes {
    auto_index: AutoIndex,
    by_field: Mutex<HashMap<String, EqualityIndex>>,
}

impl FieldIndexes {
    pub fn new(auto_index: AutoIndex) -> Self {
        FieldIndexes { auto_index, by_field: Mutex::new(HashMap::new()) }
    }

    /// Declares interest in indexing `field`, backfilling it from `rows`
    /// (the collection's current visible state) the first time it's asked
    /// for. Later calls for an already-indexed field are free.
    pub fn ensure_field(&self, field: &str, rows: impl Iterator<Item = (EntityKey, Row)>) {
        if self.auto_index == AutoIndex::Off {
            return;
        }
        let mut by_field = self.by_field.lock();
        if by_field.contains_key(field) {
            return;
        }
        let mut index = EqualityIndex::by_field(field);
        for (key, row) in rows {
            index.insert(key, &row);
        }
        by_field.insert(field.to_string(), index);
    }

    pub fn lookup(&self, field: &str, value: &Value) -> Option<Vec<EntityKey>> {
        self.by_field.lock().get(field).map(|index| index.lookup(value).cloned().collect())
    }

    /// Re-indexes every field already being tracked against one batch of
    /// visible-state changes.
    pub fn apply_changes(&self, changes: &[Change]) {
        let mut by_field = self.by_field.lock();
        if by_field.is_empty() {
            return;
        }
        for change in changes {
            for index in by_field.values_mut() {
                match change.kind {
                    ChangeType::Insert => index.insert(change.key.clone(), &change.value),
                    ChangeType::Update => {
                        let previous = change.previous_value.clone().unwrap_or_default();
                        index.update(&change.key, &previous, &change.value);
                    }
                    ChangeType::Delete => index.remove(&change.key, &change.value),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(field: &str, value: &str) -> Row {
        let mut row = Row::new();
        row.set(field, Value::from(value));
        row
    }

    #[test]
    fn off_never_builds_an_index() {
        let indexes = FieldIndexes::new(AutoIndex::Off);
        indexes.ensure_field("lang", std::iter::once((EntityKey::from("a"), row("lang", "en"))));
        assert!(indexes.lookup("lang", &Value::from("en")).is_none());
    }

    #[test]
    fn eager_backfills_then_tracks_further_changes() {
        let indexes = FieldIndexes::new(AutoIndex::Eager);
        indexes.ensure_field("lang", std::iter::once((EntityKey::from("a"), row("lang", "en"))));
        assert_eq!(indexes.lookup("lang", &Value::from("en")).unwrap(), vec![EntityKey::from("a")]);

        indexes.apply_changes(&[Change::insert(EntityKey::from("b"), row("lang", "en"))]);
        let mut matches = indexes.lookup("lang", &Value::from("en")).unwrap();
        matches.sort_by_key(|k| k.to_string());
        assert_eq!(matches, vec![EntityKey::from("a"), EntityKey::from("b")]);

        indexes.apply_changes(&[Change::delete(EntityKey::from("a"), row("lang", "en"))]);
        assert_eq!(indexes.lookup("lang", &Value::from("en")).unwrap(), vec![EntityKey::from("b")]);
    }
}
