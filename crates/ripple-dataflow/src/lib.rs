// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! The differential-dataflow runtime: a stream of keyed, signed-multiplicity
//! diffs flowing through a pipeline of incremental operators (`map`,
//! `filter`, `join`, `groupBy`, `orderBy`, `distinct`), per spec §4.9.
//!
//! `reduce` has no dedicated operator: it is `groupBy` called with an empty
//! set of grouping expressions, collapsing every row into one group. See
//! [`GroupBy`].

mod diff;
mod distinct;
mod group_by;
mod join;
mod operator;
mod order_by;
mod stateless;

pub use diff::{consolidate, Batch, Diff};
pub use distinct::Distinct;
pub use group_by::{AggregateFactory, GroupBy};
pub use join::{Join, JoinKind, JoinLeftMode, OnDemandLookup};
pub use operator::DataflowOperator;
pub use order_by::OrderBy;
pub use stateless::{Consolidate, Filter, Map, Tap};
