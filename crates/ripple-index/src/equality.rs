// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::{HashMap, HashSet};

use ripple_registry::RowEvaluator;
use ripple_type::{EntityKey, Row, Value};

/// `name -> map<value, set<key>>`. Backs both the field-name equality index
/// (`extractor` is a plain field lookup) and the compiled-expression
/// equality index (`extractor` is a compiled `Func` over refs) — the two
/// only differ in how the indexed value is derived from a row, per
/// spec §4.8.
pub struct EqualityIndex {
    extractor: RowEvaluator,
    map: HashMap<Value, HashSet<EntityKey>>,
}

impl EqualityIndex {
    /// An index over a single top-level field, used when a `where`/`join`
    /// references a bare field name.
    pub fn by_field(field: impl Into<String>) -> Self {
        let field = field.into();
        EqualityIndex::by_expression(std::sync::Arc::new(move |row: &Row| row.get(&field).clone()))
    }

    /// An index over an arbitrary compiled expression, used when a `where`
    /// clause applies a `Func` to refs (e.g. `lower(name) = 'x'`).
    pub fn by_expression(extractor: RowEvaluator) -> Self {
        EqualityIndex { extractor, map: HashMap::new() }
    }

    pub fn insert(&mut self, key: EntityKey, row: &Row) {
        let value = (self.extractor)(row);
        self.map.entry(value).or_default().insert(key);
    }

    pub fn remove(&mut self, key: &EntityKey, row: &Row) {
        let value = (self.extractor)(row);
        if let Some(keys) = self.map.get_mut(&value) {
            keys.remove(key);
            if keys.is_empty() {
                self.map.remove(&value);
            }
        }
    }

    /// Re-indexes a row whose value changed from `old_row` to `new_row`
    /// under the same key, used for optimistic/synced updates.
    pub fn update(&mut self, key: &EntityKey, old_row: &Row, new_row: &Row) {
        self.remove(key, old_row);
        self.insert(key.clone(), new_row);
    }

    pub fn lookup(&self, value: &Value) -> impl Iterator<Item = &EntityKey> {
        self.map.get(value).into_iter().flatten()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_keys_with_matching_value() {
        let mut index = EqualityIndex::by_field("lang");
        let mut row_a = Row::new();
        row_a.set("lang", Value::from("ru"));
        let mut row_b = Row::new();
        row_b.set("lang", Value::from("en"));

        index.insert(EntityKey::from("a"), &row_a);
        index.insert(EntityKey::from("b"), &row_b);

        let matches: Vec<_> = index.lookup(&Value::from("ru")).cloned().collect();
        assert_eq!(matches, vec![EntityKey::from("a")]);
    }

    #[test]
    fn update_moves_key_between_buckets() {
        let mut index = EqualityIndex::by_field("lang");
        let mut row = Row::new();
        row.set("lang", Value::from("ru"));
        index.insert(EntityKey::from("a"), &row);

        let mut updated = Row::new();
        updated.set("lang", Value::from("en"));
        index.update(&EntityKey::from("a"), &row, &updated);

        assert_eq!(index.lookup(&Value::from("ru")).count(), 0);
        assert_eq!(index.lookup(&Value::from("en")).count(), 1);
    }
}
