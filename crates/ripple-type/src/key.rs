// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::value::Value;

/// The identity of an entity within a collection.
///
/// Mirrors the `get_key` contract in spec.md §4.1: every entity must resolve
/// to either a string or an integer key, never a composite or structural
/// value, so that keys can be used directly as index/map lookups.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKey {
    Text(String),
    Int(i64),
}

impl EntityKey {
    /// Extracts a key from a `get_key` callback's return value, rejecting
    /// anything other than text or int.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(EntityKey::Text(s.clone())),
            Value::Int(i) => Some(EntityKey::Int(*i)),
            _ => None,
        }
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Text(s) => f.write_str(s),
            EntityKey::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<String> for EntityKey {
    fn from(v: String) -> Self {
        EntityKey::Text(v)
    }
}

impl From<&str> for EntityKey {
    fn from(v: &str) -> Self {
        EntityKey::Text(v.to_string())
    }
}

impl From<i64> for EntityKey {
    fn from(v: i64) -> Self {
        EntityKey::Int(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_value_accepts_text_and_int_only() {
        assert_eq!(EntityKey::from_value(&Value::Text("a".into())), Some(EntityKey::Text("a".into())));
        assert_eq!(EntityKey::from_value(&Value::Int(1)), Some(EntityKey::Int(1)));
        assert_eq!(EntityKey::from_value(&Value::Bool(true)), None);
        assert_eq!(EntityKey::from_value(&Value::Undefined), None);
    }

    #[test]
    fn orders_text_before_int_by_derive() {
        let mut keys = vec![EntityKey::Int(1), EntityKey::Text("a".into())];
        keys.sort();
        assert_eq!(keys, vec![EntityKey::Text("a".into()), EntityKey::Int(1)]);
    }
}
