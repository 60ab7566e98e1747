// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use ripple_type::EntityKey;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Error, Result, SharedError};
use crate::mutation::Mutation;

pub type TransactionId = Uuid;

/// How a transaction's persistence is ordered against others touching the
/// same keys (spec §4.3): `Ordered` queues behind an in-flight predecessor
/// that overlaps on a key; `Parallel` never queues and may race it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransactionStrategy {
    Ordered,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransactionState {
    Pending,
    Queued,
    Persisting,
    Completed,
    Failed,
    RolledBack,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionState::Completed | TransactionState::Failed | TransactionState::RolledBack)
    }

    /// Mergeable means a later `applyTransaction` call touching one of this
    /// transaction's keys can still fold its mutations in rather than
    /// starting a fresh transaction. Once persistence has started the
    /// mutation set already left for the persist function, so merging would
    /// silently lose the new write.
    pub fn is_mergeable(self) -> bool {
        matches!(self, TransactionState::Pending | TransactionState::Queued)
    }
}

type Settled = Option<std::result::Result<(), SharedError>>;

struct Inner {
    mutations: Mutex<IndexMap<(String, EntityKey), Mutation>>,
    state: Mutex<TransactionState>,
    queued_behind: Mutex<Option<TransactionId>>,
    persisted_tx: watch::Sender<Settled>,
    persisted_rx: watch::Receiver<Settled>,
    synced_tx: watch::Sender<Settled>,
    synced_rx: watch::Receiver<Settled>,
}

/// A handle to an in-flight (or settled) write, mergeable by key overlap
/// with other pending transactions of the same strategy. Cloning shares the
/// same underlying mutation set and completion signals — this is exactly
/// what happens when `applyTransaction` merges a new call into an existing
/// one and hands back the same logical transaction.
#[derive(Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub strategy: TransactionStrategy,
    inner: Arc<Inner>,
}

impl Transaction {
    pub fn new(id: TransactionId, strategy: TransactionStrategy, mutations: Vec<Mutation>) -> Self {
        let (persisted_tx, persisted_rx) = watch::channel(None);
        let (synced_tx, synced_rx) = watch::channel(None);
        let mut by_target = IndexMap::new();
        for mutation in mutations {
            by_target.insert(mutation.target(), mutation);
        }
        Transaction {
            id,
            strategy,
            inner: Arc::new(Inner {
                mutations: Mutex::new(by_target),
                state: Mutex::new(TransactionState::Pending),
                queued_behind: Mutex::new(None),
                persisted_tx,
                persisted_rx,
                synced_tx,
                synced_rx,
            }),
        }
    }

    pub fn state(&self) -> TransactionState {
        *self.inner.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.inner.state.lock() = state;
    }

    pub fn queued_behind(&self) -> Option<TransactionId> {
        *self.inner.queued_behind.lock()
    }

    pub fn set_queued_behind(&self, predecessor: Option<TransactionId>) {
        *self.inner.queued_behind.lock() = predecessor;
    }

    pub fn keys(&self) -> Vec<(String, EntityKey)> {
        self.inner.mutations.lock().keys().cloned().collect()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.inner.mutations.lock().values().cloned().collect()
    }

    /// Folds `incoming` into this transaction's mutation set, later writes
    /// to the same `(collection, key)` winning over earlier ones — the
    /// latest-write-wins merge spec §4.3 requires.
    pub fn merge(&self, incoming: Vec<Mutation>) {
        let mut mutations = self.inner.mutations.lock();
        for mutation in incoming {
            mutations.insert(mutation.target(), mutation);
        }
    }

    pub fn resolve_persisted(&self, result: std::result::Result<(), Error>) {
        let _ = self.inner.persisted_tx.send(Some(result.map_err(Arc::new)));
    }

    pub fn resolve_synced(&self, result: std::result::Result<(), Error>) {
        let _ = self.inner.synced_tx.send(Some(result.map_err(Arc::new)));
    }

    /// Cancels this transaction before it has started persisting (spec
    /// §4.4: a strategy replacing or clearing a not-yet-persisting
    /// transaction rolls it back rather than letting it land). A no-op once
    /// the transaction has reached persisting or a terminal state — its
    /// mutations already left for the persist function, or it is already
    /// settled, so there is nothing left to cancel.
    pub fn rollback(&self) {
        let mut state = self.inner.state.lock();
        if !state.is_mergeable() {
            return;
        }
        *state = TransactionState::RolledBack;
        drop(state);
        self.resolve_persisted(Err(Error::RolledBack));
        self.resolve_synced(Err(Error::RolledBack));
    }

    pub async fn is_persisted(&self) -> Result<()> {
        await_settled(self.inner.persisted_rx.clone()).await
    }

    pub async fn is_synced(&self) -> Result<()> {
        await_settled(self.inner.synced_rx.clone()).await
    }
}

async fn await_settled(mut rx: watch::Receiver<Settled>) -> Result<()> {
    loop {
        if let Some(result) = rx.borrow().clone() {
            return result.map_err(|e| (*e).clone());
        }
        if rx.changed().await.is_err() {
            return Ok(());
        }
    }
}
