// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! The relational query IR and its chainable builder.
//!
//! A [`Query`] is a discriminated tree: `from`, zero or more `join`s, an
//! optional `where`/`having`, `groupBy`/`orderBy`/`limit`/`offset`, and a
//! `select` projection. It is built through [`QueryBuilder`] and compiled by
//! `ripple-query` into a dataflow pipeline; this crate has no knowledge of
//! execution.

mod builder;
mod error;
mod expr;
mod query;
mod select;

pub use builder::{fns, AliasRef, QueryBuilder, RefProxy};
pub use error::{Error, Result};
pub use expr::{Agg, BasicExpression, OrderByItem, OrderDirection};
pub use query::{FnPredicate, FnPredicateSlot, FnProjection, FnProjectionSlot, JoinClause, JoinType, Query, Source};
pub use select::SelectItem;
