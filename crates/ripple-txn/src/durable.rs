// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mutation::Mutation;
use crate::transaction::{Transaction, TransactionId, TransactionState, TransactionStrategy};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A durable snapshot of a transaction's mutation set and state, the unit a
/// [`DurableTransactionStore`] actually persists. Unlike [`Transaction`]
/// itself it carries no completion signals — those only make sense for the
/// in-memory handle a caller is still awaiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub strategy: TransactionStrategy,
    pub state: TransactionState,
    pub mutations: Vec<MutationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MutationRecord {
    Insert { collection: String, key: ripple_type::EntityKey, value: ripple_type::Row },
    Update { collection: String, key: ripple_type::EntityKey, value: ripple_type::Row },
    Delete { collection: String, key: ripple_type::EntityKey },
}

impl From<&Mutation> for MutationRecord {
    fn from(mutation: &Mutation) -> Self {
        match mutation.clone() {
            Mutation::Insert { collection, key, value } => MutationRecord::Insert { collection, key, value },
            Mutation::Update { collection, key, value } => MutationRecord::Update { collection, key, value },
            Mutation::Delete { collection, key } => MutationRecord::Delete { collection, key },
        }
    }
}

impl From<MutationRecord> for Mutation {
    fn from(record: MutationRecord) -> Self {
        match record {
            MutationRecord::Insert { collection, key, value } => Mutation::Insert { collection, key, value },
            MutationRecord::Update { collection, key, value } => Mutation::Update { collection, key, value },
            MutationRecord::Delete { collection, key } => Mutation::Delete { collection, key },
        }
    }
}

impl TransactionRecord {
    pub fn from_transaction(tx: &Transaction) -> Self {
        TransactionRecord {
            id: tx.id,
            strategy: tx.strategy,
            state: tx.state(),
            mutations: tx.mutations().iter().map(MutationRecord::from).collect(),
        }
    }

    pub fn into_transaction(self) -> Transaction {
        let mutations = self.mutations.into_iter().map(Mutation::from).collect();
        let tx = Transaction::new(self.id, self.strategy, mutations);
        tx.set_state(self.state);
        tx
    }
}

/// Restart-durability for transactions still in flight when the process
/// went down, per spec §4.3: non-terminal transactions are re-queued on
/// startup, terminal ones are deleted once the durable store has recorded
/// them as such.
pub trait DurableTransactionStore: Send + Sync {
    fn get_transactions(&self) -> BoxFuture<'_, Result<Vec<TransactionRecord>>>;
    fn put_transaction(&self, record: TransactionRecord) -> BoxFuture<'_, Result<()>>;
    fn delete_transaction(&self, id: TransactionId) -> BoxFuture<'_, Result<()>>;
    fn clear_all(&self) -> BoxFuture<'_, Result<()>>;
}
