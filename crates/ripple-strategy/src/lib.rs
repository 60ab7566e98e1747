// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! Mutation pacing strategies (spec §4.4): every collection write goes
//! through one of these before reaching [`ripple_txn::TransactionManager`].
//! All five share the same [`Strategy`] contract — `execute` paces a
//! mutation closure, `cleanup` cancels any outstanding timers or queued
//! work — and none of them ever reject on their own bookkeeping; failures
//! surface only through the resulting transaction's own completion signals.

mod batch;
mod debounce;
mod dependency_queue;
mod queue;
mod strategy;
mod throttle;
mod timing;

pub use batch::Batch;
pub use debounce::Debounce;
pub use dependency_queue::DependencyQueue;
pub use queue::{Queue, QueueEnd};
pub use strategy::{BoxFuture, ExecuteOptions, MutationFn, Strategy};
pub use throttle::Throttle;
