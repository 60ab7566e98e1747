// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! Keyed entity store with layered optimistic state, sync ingestion and
//! subscription fan-out (spec §3, §4.1, §4.2).

mod change;
mod collection;
mod config;
mod error;
mod indexing;
mod state;
mod subscription;
mod sync;

pub use change::{Change, ChangeType};
pub use collection::{
    BoxFuture, Collection, CollectionBuilder, DuplicateInsertPolicy, GetKeyFn, OrderBy, SyncControls, SyncMoreFn,
    SyncMoreRequest,
};
pub use config::{validate_keys, AutoIndex, CollectionSettings, SyncMode, RECOGNIZED_KEYS};
pub use error::{Error, Result};
pub use state::{LayeredState, OptimisticMutation};
pub use subscription::{ChangeCallback, RowFilter, Subscription, SubscriptionId, SubscriptionStatus};
pub use sync::{OnSyncWhilePersisting, SyncFn, SyncWhilePersistingInfo, SyncWrite};
