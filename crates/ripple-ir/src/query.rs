// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use ripple_type::Row;

use crate::expr::{BasicExpression, OrderByItem};
use crate::select::SelectItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// Where a source's rows come from: a named collection, or a nested query
/// compiled as a subquery.
#[derive(Debug, Clone)]
pub enum Source {
    Collection(String),
    Query(Box<Query>),
}

/// A canonicalized join: `left` always refers to an alias already available
/// in the query built so far, `right` to the newly joined `alias`. The
/// builder performs this canonicalization at `join()` time so the compiler
/// never has to re-derive which side is which.
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub alias: String,
    pub source: Source,
    pub join_type: JoinType,
    pub left: BasicExpression,
    pub right: BasicExpression,
}

/// A predicate or projection expressed as a host callback rather than IR,
/// used by the `fn.where`/`fn.select`/`fn.having` escape hatches. These
/// disable optimization along their branch: the optimizer cannot see inside
/// an opaque closure to split, push down, or recombine it.
pub type FnPredicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;
pub type FnProjection = Arc<dyn Fn(&Row) -> Row + Send + Sync>;

#[derive(Clone)]
struct OpaqueFn<T>(T);

impl<T> Debug for OpaqueFn<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("<fn>")
    }
}

/// The relational query IR: a discriminated tree rooted at `from`, with
/// optional joins, filtering, grouping, ordering, pagination and
/// projection stages, compiled by `ripple-query` into a dataflow pipeline.
#[derive(Debug, Clone)]
pub struct Query {
    pub from_alias: String,
    pub from_source: Source,
    pub joins: Vec<JoinClause>,
    pub where_: Option<BasicExpression>,
    pub fn_where: Option<FnPredicateSlot>,
    pub group_by: Vec<BasicExpression>,
    pub having: Option<BasicExpression>,
    pub fn_having: Option<FnPredicateSlot>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub select: IndexMap<String, SelectItem>,
    pub fn_select: Option<FnProjectionSlot>,
    pub find_one: bool,
}

#[derive(Clone)]
pub struct FnPredicateSlot(OpaqueFn<FnPredicate>);

impl FnPredicateSlot {
    pub fn new(f: FnPredicate) -> Self {
        FnPredicateSlot(OpaqueFn(f))
    }

    pub fn call(&self, row: &Row) -> bool {
        (self.0 .0)(row)
    }
}

impl Debug for FnPredicateSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

#[derive(Clone)]
pub struct FnProjectionSlot(OpaqueFn<FnProjection>);

impl FnProjectionSlot {
    pub fn new(f: FnProjection) -> Self {
        FnProjectionSlot(OpaqueFn(f))
    }

    pub fn call(&self, row: &Row) -> Row {
        (self.0 .0)(row)
    }
}

impl Debug for FnProjectionSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Query {
    pub fn new(alias: impl Into<String>, source: Source) -> Self {
        Query {
            from_alias: alias.into(),
            from_source: source,
            joins: Vec::new(),
            where_: None,
            fn_where: None,
            group_by: Vec::new(),
            having: None,
            fn_having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            select: IndexMap::new(),
            fn_select: None,
            find_one: false,
        }
    }

    /// All aliases reachable at this query level: the `from` alias plus
    /// every joined alias, in join order.
    pub fn known_aliases(&self) -> Vec<&str> {
        let mut aliases = vec![self.from_alias.as_str()];
        aliases.extend(self.joins.iter().map(|j| j.alias.as_str()));
        aliases
    }

    pub fn uses_functional_escape_hatch(&self) -> bool {
        self.fn_where.is_some() || self.fn_having.is_some() || self.fn_select.is_some()
    }
}
