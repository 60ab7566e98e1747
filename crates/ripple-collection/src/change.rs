// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use ripple_type::{EntityKey, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// `{ type, key, value, previousValue? }` (spec §3): the unit every
/// observable state transition is expressed as. Applying the multiset of
/// changes emitted for a transition to the state before it reproduces the
/// state after it.
#[derive(Debug, Clone)]
pub struct Change {
    pub kind: ChangeType,
    pub key: EntityKey,
    pub value: Row,
    pub previous_value: Option<Row>,
}

impl Change {
    pub fn insert(key: EntityKey, value: Row) -> Self {
        Change { kind: ChangeType::Insert, key, value, previous_value: None }
    }

    pub fn update(key: EntityKey, value: Row, previous_value: Row) -> Self {
        Change { kind: ChangeType::Update, key, value, previous_value: Some(previous_value) }
    }

    pub fn delete(key: EntityKey, previous_value: Row) -> Self {
        Change { kind: ChangeType::Delete, key, value: previous_value.clone(), previous_value: Some(previous_value) }
    }
}
