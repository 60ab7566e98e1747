// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ripple_txn::Transaction;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The actual write a strategy is pacing. Produces a [`Transaction`] handle
/// synchronously (`applyTransaction` itself never blocks); completion is
/// observed later through the transaction's own `is_persisted`/`is_synced`.
pub type MutationFn = Arc<dyn Fn() -> Transaction + Send + Sync>;

/// Per-call knobs a strategy may read. Strategies that don't need a knob
/// simply ignore it — `Queue` reads `depends_on`, `DependencyQueue` reads
/// `keys`, the rest read neither.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub depends_on: Vec<Transaction>,
    pub keys: Vec<String>,
}

/// Every pacing strategy (spec §4.4) shares this contract: `execute` accepts
/// the mutation to pace and resolves once that pacing decides to actually
/// run it (which may merge with, delay, or coalesce other concurrent calls);
/// `cleanup` cancels any outstanding timers/queued work, e.g. on collection
/// teardown. Neither ever rejects on an internal bookkeeping path — failures
/// belong to the transaction's own `is_persisted` promise, not the
/// strategy's bookkeeping.
pub trait Strategy: Send + Sync {
    fn execute(&self, mutate: MutationFn, options: ExecuteOptions) -> BoxFuture<'static, Transaction>;

    fn cleanup(&self);
}
