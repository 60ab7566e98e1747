// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::cmp::Ordering;
use std::sync::Arc;

use ripple_type::Value;

/// A total-order comparator used by a [`crate::RangeIndex`], defaulting to
/// `Value`'s natural order but overridable per-collection (the config
/// schema's `defaultStringCollation`) for, e.g., locale-aware text
/// ordering.
#[derive(Clone)]
pub struct Collation(Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>);

impl Collation {
    pub fn new(compare: impl Fn(&Value, &Value) -> Ordering + Send + Sync + 'static) -> Self {
        Collation(Arc::new(compare))
    }

    pub fn natural() -> Self {
        Collation::new(|a, b| a.cmp(b))
    }

    /// Case-insensitive ordering for `Text` values, falling back to the
    /// natural order for any other kind (and for mixed-kind comparisons).
    pub fn case_insensitive() -> Self {
        Collation::new(|a, b| match (a, b) {
            (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            _ => a.cmp(b),
        })
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        (self.0)(a, b)
    }
}

impl Default for Collation {
    fn default() -> Self {
        Collation::natural()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_ignores_case() {
        let collation = Collation::case_insensitive();
        assert_eq!(collation.compare(&Value::Text("Abc".into()), &Value::Text("abc".into())), Ordering::Equal);
    }
}
