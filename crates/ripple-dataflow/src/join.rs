// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ripple_registry::RowEvaluator;
use ripple_type::{EntityKey, Row, Value};

use crate::diff::{Batch, Diff};

/// A synchronous lookup into a live collection's current state by join-key
/// value, used to pull in the lazy side of a join only once a row on the
/// driving side actually needs it (spec §4.11's on-demand load strategy).
pub type OnDemandLookup = Arc<dyn Fn(&Value) -> Vec<(EntityKey, Row)> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

/// How a join's left input should be folded into the merged row.
///
/// The first join off a base source nests its left input under a single
/// alias (`Nest`); a chained join's left input is already a namespaced
/// multi-alias row produced by an earlier join, so its fields are spread
/// onto the merged row's top level instead of being nested again (`Spread`),
/// keeping every alias a sibling top-level field regardless of join depth.
#[derive(Debug, Clone)]
pub enum JoinLeftMode {
    Nest(String),
    Spread,
}

#[derive(Clone)]
struct Arranged {
    key: EntityKey,
    row: Row,
    multiplicity: i64,
}

/// A binary join operator maintaining an arrangement (an index over pending
/// input keyed by the join key) on each side, per spec §4.9. Unlike the
/// unary [`crate::DataflowOperator`] stages, a join consumes batches from
/// two distinct inputs — `apply_left`/`apply_right` — and emits joined rows
/// with a composite key `"[mainKey,joinedKey]"`.
pub struct Join {
    kind: JoinKind,
    left_key: RowEvaluator,
    right_key: RowEvaluator,
    left_mode: JoinLeftMode,
    right_alias: String,
    arrangement_left: HashMap<Value, Vec<Arranged>>,
    arrangement_right: HashMap<Value, Vec<Arranged>>,
    /// Net multiplicity of the `[key,]` placeholder currently standing in
    /// for a left row with no right match yet, keyed by that left row's
    /// key. Removed (and retracted) the moment a matching right row shows
    /// up, so the placeholder never lingers alongside the real match.
    placeholder_left: HashMap<EntityKey, i64>,
    /// Same bookkeeping for the symmetric `[,key]` right-unmatched case.
    placeholder_right: HashMap<EntityKey, i64>,
    /// Set when the right side is loaded lazily: instead of the right
    /// collection feeding its entire current state through `apply_right`
    /// up front, a left row with no in-memory match triggers one lookup
    /// against the live collection for that join value.
    on_demand_right: Option<OnDemandLookup>,
    /// Join values already resolved through `on_demand_right`, so a join
    /// value that genuinely has no right match isn't looked up again on
    /// every subsequent left row.
    looked_up_right: HashSet<Value>,
}

impl Join {
    pub fn new(
        kind: JoinKind,
        left_alias: impl Into<String>,
        left_key: RowEvaluator,
        right_alias: impl Into<String>,
        right_key: RowEvaluator,
    ) -> Self {
        Join::with_left_mode(kind, JoinLeftMode::Nest(left_alias.into()), left_key, right_alias, right_key)
    }

    /// Constructs a join whose left input is already a namespaced row
    /// produced by an earlier join in a chain (see [`JoinLeftMode`]).
    pub fn chained(
        kind: JoinKind,
        left_key: RowEvaluator,
        right_alias: impl Into<String>,
        right_key: RowEvaluator,
    ) -> Self {
        Join::with_left_mode(kind, JoinLeftMode::Spread, left_key, right_alias, right_key)
    }

    fn with_left_mode(
        kind: JoinKind,
        left_mode: JoinLeftMode,
        left_key: RowEvaluator,
        right_alias: impl Into<String>,
        right_key: RowEvaluator,
    ) -> Self {
        Join {
            kind,
            left_key,
            right_key,
            left_mode,
            right_alias: right_alias.into(),
            arrangement_left: HashMap::new(),
            arrangement_right: HashMap::new(),
            placeholder_left: HashMap::new(),
            placeholder_right: HashMap::new(),
            on_demand_right: None,
            looked_up_right: HashSet::new(),
        }
    }

    /// Installs the lazy right-hand lookup (spec §4.11). Once set, a left
    /// row whose join value has no entry yet in the right arrangement is
    /// resolved through `lookup` before falling back to the unmatched
    /// placeholder, rather than relying solely on rows already pushed in
    /// through `apply_right`.
    pub fn set_on_demand_right(&mut self, lookup: OnDemandLookup) {
        self.on_demand_right = Some(lookup);
    }

    fn merge(&self, left: &Row, right: Option<&Row>) -> Row {
        let mut merged = match &self.left_mode {
            JoinLeftMode::Nest(alias) => {
                let mut row = Row::new();
                row.set(alias.clone(), Value::Object(row_to_object(left)));
                row
            }
            JoinLeftMode::Spread => left.clone(),
        };
        let right_value = match right {
            Some(row) => Value::Object(row_to_object(row)),
            None => Value::Undefined,
        };
        merged.set(self.right_alias.clone(), right_value);
        merged
    }

    fn composite_key(&self, left: &EntityKey, right: Option<&EntityKey>) -> EntityKey {
        match right {
            Some(right) => EntityKey::Text(format!("[{left},{right}]")),
            None => EntityKey::Text(format!("[{left},]")),
        }
    }

    pub fn apply_left(&mut self, batch: Batch) -> Batch {
        let mut out = Batch::new();
        for diff in batch {
            let join_value = (self.left_key)(&diff.value);
            self.resolve_on_demand_right(&join_value);
            let matches = matching(&self.arrangement_right, &join_value);

            if matches.is_empty() {
                if matches!(self.kind, JoinKind::Left | JoinKind::Full) {
                    out.push(Diff::new(
                        self.composite_key(&diff.key, None),
                        self.merge(&diff.value, None),
                        diff.multiplicity,
                    ));
                    *self.placeholder_left.entry(diff.key.clone()).or_insert(0) += diff.multiplicity;
                }
            } else {
                for right in &matches {
                    if let Some(old_mult) = self.placeholder_right.remove(&right.key) {
                        let placeholder = EntityKey::Text(String::new());
                        out.push(Diff::new(
                            self.composite_key(&placeholder, Some(&right.key)),
                            self.merge(&Row::new(), Some(&right.row)),
                            -old_mult,
                        ));
                    }
                    out.push(Diff::new(
                        self.composite_key(&diff.key, Some(&right.key)),
                        self.merge(&diff.value, Some(&right.row)),
                        diff.multiplicity * right.multiplicity,
                    ));
                }
            }

            update_arrangement(&mut self.arrangement_left, join_value, diff.key, diff.value, diff.multiplicity);
        }
        out
    }

    /// Pulls the lazy right side's current rows for `join_value` into the
    /// arrangement, once, the first time a left row needs them. A value
    /// already looked up (whether or not it matched anything) is never
    /// queried again — further right-side changes for it arrive through the
    /// live subscription feeding `apply_right` as normal.
    fn resolve_on_demand_right(&mut self, join_value: &Value) {
        let Some(lookup) = &self.on_demand_right else { return };
        if !self.looked_up_right.insert(join_value.clone()) {
            return;
        }
        for (key, row) in lookup(join_value) {
            update_arrangement(&mut self.arrangement_right, join_value.clone(), key, row, 1);
        }
    }

    pub fn apply_right(&mut self, batch: Batch) -> Batch {
        let mut out = Batch::new();
        for diff in batch {
            let join_value = (self.right_key)(&diff.value);
            let matches = matching(&self.arrangement_left, &join_value);

            if matches.is_empty() {
                if matches!(self.kind, JoinKind::Right | JoinKind::Full) {
                    let placeholder = EntityKey::Text(String::new());
                    out.push(Diff::new(
                        self.composite_key(&placeholder, Some(&diff.key)),
                        self.merge(&Row::new(), Some(&diff.value)),
                        diff.multiplicity,
                    ));
                    *self.placeholder_right.entry(diff.key.clone()).or_insert(0) += diff.multiplicity;
                }
            } else {
                for left in &matches {
                    if let Some(old_mult) = self.placeholder_left.remove(&left.key) {
                        out.push(Diff::new(self.composite_key(&left.key, None), self.merge(&left.row, None), -old_mult));
                    }
                    out.push(Diff::new(
                        self.composite_key(&left.key, Some(&diff.key)),
                        self.merge(&left.row, Some(&diff.value)),
                        diff.multiplicity * left.multiplicity,
                    ));
                }
            }

            update_arrangement(&mut self.arrangement_right, join_value, diff.key, diff.value, diff.multiplicity);
        }
        out
    }
}

fn update_arrangement(
    arrangement: &mut HashMap<Value, Vec<Arranged>>,
    join_value: Value,
    key: EntityKey,
    row: Row,
    multiplicity: i64,
) {
    arrangement.entry(join_value).or_default().push(Arranged { key, row, multiplicity });
}

fn row_to_object(row: &Row) -> std::collections::BTreeMap<String, Value> {
    row.fields().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn matching(arrangement: &HashMap<Value, Vec<Arranged>>, join_value: &Value) -> Vec<Arranged> {
    arrangement.get(join_value).cloned().unwrap_or_default()
}
