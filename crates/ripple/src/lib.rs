// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! Ripple: a client-side reactive in-memory database.
//!
//! This crate is a thin facade over the workspace's sub-crates, re-exporting
//! the surface an application embeds directly:
//!
//! - [`collection`] — keyed entity stores with layered optimistic state,
//!   sync ingestion and subscription fan-out.
//! - [`live`] — collections whose sync driver is a compiled query pipeline.
//! - [`query`] and [`ir`] — the relational query IR and its compiler.
//! - [`txn`] and [`strategy`] — the transaction manager and the mutation
//!   pacing strategies (`Debounce`, `Throttle`, `Queue`, `DependencyQueue`,
//!   `Batch`) that sit in front of it.
//! - [`dataflow`], [`registry`] and [`index`] — the incremental dataflow
//!   runtime, its operator/aggregate registry, and the equality/range
//!   indexes it can be backed by.
//! - [`types`] — the [`Value`]/[`Row`]/[`EntityKey`] model every other
//!   module builds on.
//!
//! Most applications only need the top-level re-exports below; the module
//! aliases exist for callers who prefer to spell out which layer a type
//! comes from.

pub use ripple_collection as collection;
pub use ripple_dataflow as dataflow;
pub use ripple_ir as ir;
pub use ripple_live as live;
pub use ripple_query as query;
pub use ripple_registry as registry;
pub use ripple_strategy as strategy;
pub use ripple_txn as txn;
pub use ripple_type as types;

#[doc(no_inline)]
pub use ripple_index as index;

pub use ripple_collection::{
    Change, ChangeType, Collection, CollectionBuilder, CollectionSettings, DuplicateInsertPolicy, SyncControls, SyncWrite,
};
pub use ripple_ir::{fns, QueryBuilder, Source};
pub use ripple_live::LiveQuery;
pub use ripple_query::CompiledPipeline;
pub use ripple_registry::{AggregateRegistry, OperatorRegistry};
pub use ripple_strategy::{Batch as BatchStrategy, Debounce, DependencyQueue, Queue, Strategy, Throttle};
pub use ripple_txn::{Transaction, TransactionManager};
pub use ripple_type::{EntityKey, Row, Value};
