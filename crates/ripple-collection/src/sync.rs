// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::sync::Arc;

use ripple_type::{EntityKey, Row};

use crate::change::ChangeType;

/// One `write` call inside a sync batch (spec §4.1/§6). `delete` carries
/// either the key directly or a value `getKey` can extract it from.
#[derive(Debug, Clone)]
pub struct SyncWrite {
    pub kind: ChangeType,
    pub key: EntityKey,
    pub value: Option<Row>,
}

impl SyncWrite {
    pub fn insert(key: EntityKey, value: Row) -> Self {
        SyncWrite { kind: ChangeType::Insert, key, value: Some(value) }
    }

    pub fn update(key: EntityKey, value: Row) -> Self {
        SyncWrite { kind: ChangeType::Update, key, value: Some(value) }
    }

    pub fn delete(key: EntityKey) -> Self {
        SyncWrite { kind: ChangeType::Delete, key, value: None }
    }
}

/// What `onSyncWhilePersisting` is handed so a host can decide whether an
/// incoming sync batch should commit immediately alongside in-flight
/// optimistic transactions, or wait for them to settle (spec §4.1).
#[derive(Debug, Clone)]
pub struct SyncWhilePersistingInfo {
    pub pending_sync_keys: Vec<EntityKey>,
    pub persisting_keys: Vec<EntityKey>,
    pub conflicting_keys: Vec<EntityKey>,
    pub persisting_transaction_count: usize,
    pub is_truncate: bool,
}

pub type OnSyncWhilePersisting = Arc<dyn Fn(&SyncWhilePersistingInfo) -> bool + Send + Sync>;

/// The driver function a collection calls once at startup with its own
/// control handle (spec §4.1's "sync driver interface (consumed)"); the
/// driver is expected to call back into `begin`/`write`/`commit`/`truncate`/
/// `mark_ready` on [`crate::collection::SyncControls`] as data arrives.
pub type SyncFn = Arc<dyn Fn(crate::collection::SyncControls) + Send + Sync>;
