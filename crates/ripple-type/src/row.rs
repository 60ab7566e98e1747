// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// An entity as stored in a collection: an ordered map of field name to
/// value. `BTreeMap` keeps field order deterministic for `select`/spread
/// output and for hashing a row's shape during change deduplication.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Row(BTreeMap::new())
    }

    pub fn get(&self, field: &str) -> &Value {
        self.0.get(field).unwrap_or(&Value::Undefined)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `other` on top of `self`, used by `select` spread (`...row`)
    /// expansion: later fields win.
    pub fn merged_with(&self, other: &Row) -> Row {
        let mut merged = self.0.clone();
        for (k, v) in other.0.iter() {
            merged.insert(k.clone(), v.clone());
        }
        Row(merged)
    }
}

impl From<BTreeMap<String, Value>> for Row {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Row(map)
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Row(BTreeMap::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_on_missing_field_is_undefined() {
        let row = Row::new();
        assert_eq!(row.get("missing"), &Value::Undefined);
    }

    #[test]
    fn merge_lets_later_row_win() {
        let mut a = Row::new();
        a.set("x", Value::Int(1));
        a.set("y", Value::Int(1));
        let mut b = Row::new();
        b.set("y", Value::Int(2));
        let merged = a.merged_with(&b);
        assert_eq!(merged.get("x"), &Value::Int(1));
        assert_eq!(merged.get("y"), &Value::Int(2));
    }
}
