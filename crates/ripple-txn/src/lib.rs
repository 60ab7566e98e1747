// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! Transaction manager (spec §4.3): coalesces optimistic mutations that
//! touch the same entity into one logical transaction, orders persistence
//! for `Ordered`-strategy writes, and drives the persist/`awaitSync`
//! handshake behind a per-collection timeout.

mod durable;
mod error;
mod manager;
mod mutation;
mod transaction;

pub use durable::{BoxFuture, DurableTransactionStore, MutationRecord, TransactionRecord};
pub use error::{Error, Result, SharedError};
pub use manager::{apply_transaction, AwaitSyncFn, PersistFn, TransactionManager};
pub use mutation::Mutation;
pub use transaction::{Transaction, TransactionId, TransactionState, TransactionStrategy};
