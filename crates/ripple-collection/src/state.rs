// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use indexmap::IndexMap;
use ripple_txn::TransactionId;
use ripple_type::{EntityKey, Row};

use crate::change::{Change, ChangeType};

/// One optimistic transaction's per-key effect on visible state (spec §3:
/// "original and modified values"). `None` is a delete.
#[derive(Debug, Clone)]
pub struct OptimisticMutation {
    pub value: Option<Row>,
}

#[derive(Debug, Clone)]
struct OptimisticEntry {
    transaction_id: TransactionId,
    mutations: IndexMap<EntityKey, OptimisticMutation>,
}

/// Synced state, the optimistic overlay, and the derived visible state
/// (spec §3). Visible state is recomputed from scratch on every mutation —
/// simple and obviously correct, traded off against the incremental overlay
/// maintenance a larger collection would want.
pub struct LayeredState {
    synced: IndexMap<EntityKey, Row>,
    optimistic: Vec<OptimisticEntry>,
    last_visible: IndexMap<EntityKey, Row>,
}

impl LayeredState {
    pub fn new() -> Self {
        LayeredState { synced: IndexMap::new(), optimistic: Vec::new(), last_visible: IndexMap::new() }
    }

    pub fn synced_get(&self, key: &EntityKey) -> Option<&Row> {
        self.synced.get(key)
    }

    pub fn visible(&self) -> &IndexMap<EntityKey, Row> {
        &self.last_visible
    }

    pub fn visible_get(&self, key: &EntityKey) -> Option<&Row> {
        self.last_visible.get(key)
    }

    /// Applies a committed sync batch. `truncate` replaces the whole synced
    /// map: keys missing from `writes` are removed, and pending
    /// optimistic-only keys are surfaced as delete-then-reinsert on the
    /// overlay (spec §4.1's truncate semantics) by the caller diffing
    /// before/after snapshots — this method only mutates `synced`.
    pub fn apply_sync_commit(&mut self, writes: Vec<(EntityKey, Option<Row>)>, truncate: bool) {
        if truncate {
            let mut next = IndexMap::new();
            for (key, value) in writes {
                if let Some(value) = value {
                    next.insert(key, value);
                }
            }
            self.synced = next;
        } else {
            for (key, value) in writes {
                match value {
                    Some(value) => {
                        self.synced.insert(key, value);
                    }
                    None => {
                        self.synced.shift_remove(&key);
                    }
                }
            }
        }
    }

    pub fn push_optimistic(&mut self, transaction_id: TransactionId, mutations: IndexMap<EntityKey, OptimisticMutation>) {
        self.optimistic.push(OptimisticEntry { transaction_id, mutations });
    }

    /// Removes a settled transaction's overlay entry — called once its
    /// `isPersisted` promise resolves (success folds into synced via the
    /// matching sync commit; failure simply rolls the overlay back).
    pub fn settle_optimistic(&mut self, transaction_id: TransactionId) {
        self.optimistic.retain(|entry| entry.transaction_id != transaction_id);
    }

    pub fn has_optimistic(&self, transaction_id: TransactionId) -> bool {
        self.optimistic.iter().any(|entry| entry.transaction_id == transaction_id)
    }

    /// Recomputes the visible snapshot (synced with every optimistic layer
    /// applied in order) and returns the change messages that take the
    /// previous visible snapshot to the new one (spec §3's change-message
    /// contract).
    pub fn recompute(&mut self) -> Vec<Change> {
        let mut visible = self.synced.clone();
        for entry in &self.optimistic {
            for (key, mutation) in &entry.mutations {
                match &mutation.value {
                    Some(value) => {
                        visible.insert(key.clone(), value.clone());
                    }
                    None => {
                        visible.shift_remove(key);
                    }
                }
            }
        }

        let changes = diff(&self.last_visible, &visible);
        self.last_visible = visible;
        changes
    }
}

impl Default for LayeredState {
    fn default() -> Self {
        Self::new()
    }
}

fn diff(old: &IndexMap<EntityKey, Row>, new: &IndexMap<EntityKey, Row>) -> Vec<Change> {
    let mut changes = Vec::new();
    for (key, value) in new {
        match old.get(key) {
            None => changes.push(Change::insert(key.clone(), value.clone())),
            Some(previous) if previous != value => {
                changes.push(Change::update(key.clone(), value.clone(), previous.clone()))
            }
            Some(_) => {}
        }
    }
    for (key, previous) in old {
        if !new.contains_key(key) {
            changes.push(Change::delete(key.clone(), previous.clone()));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn row(field: &str, value: &str) -> Row {
        let mut row = Row::new();
        row.set(field, ripple_type::Value::from(value));
        row
    }

    #[test]
    fn sync_commit_alone_surfaces_as_insert() {
        let mut state = LayeredState::new();
        state.apply_sync_commit(vec![(EntityKey::from("a"), Some(row("name", "alice")))], false);
        let changes = state.recompute();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeType::Insert);
    }

    #[test]
    fn optimistic_overlay_is_visible_before_sync_confirms_it() {
        let mut state = LayeredState::new();
        let tx_id = Uuid::new_v4();
        let mut mutations = IndexMap::new();
        mutations.insert(EntityKey::from("a"), OptimisticMutation { value: Some(row("name", "pending")) });
        state.push_optimistic(tx_id, mutations);
        let changes = state.recompute();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeType::Insert);
        assert_eq!(state.visible_get(&EntityKey::from("a")), Some(&row("name", "pending")));
    }

    #[test]
    fn settling_then_syncing_the_same_value_produces_no_further_changes() {
        // monotone visibility: once optimistic and synced agree, no
        // redundant change should be emitted.
        let mut state = LayeredState::new();
        let tx_id = Uuid::new_v4();
        let mut mutations = IndexMap::new();
        mutations.insert(EntityKey::from("a"), OptimisticMutation { value: Some(row("name", "alice")) });
        state.push_optimistic(tx_id, mutations);
        state.recompute();

        state.settle_optimistic(tx_id);
        state.apply_sync_commit(vec![(EntityKey::from("a"), Some(row("name", "alice")))], false);
        let changes = state.recompute();
        assert!(changes.is_empty());
    }

    #[test]
    fn truncate_drops_synced_only_keys_but_keeps_pending_optimistic_overlay() {
        let mut state = LayeredState::new();
        state.apply_sync_commit(vec![(EntityKey::from("a"), Some(row("name", "alice")))], false);
        state.recompute();

        let tx_id = Uuid::new_v4();
        let mut mutations = IndexMap::new();
        mutations.insert(EntityKey::from("b"), OptimisticMutation { value: Some(row("name", "pending-b")) });
        state.push_optimistic(tx_id, mutations);
        state.recompute();

        // truncate with an empty batch: `a` (synced-only) disappears, `b`
        // (optimistic-only) remains visible via the overlay.
        state.apply_sync_commit(vec![], true);
        let changes = state.recompute();

        assert!(changes.iter().any(|c| c.key == EntityKey::from("a") && c.kind == ChangeType::Delete));
        assert!(state.visible_get(&EntityKey::from("b")).is_some());
    }
}
