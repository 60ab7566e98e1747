// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! The three-pass WHERE optimizer (spec §4.11): split each top-level WHERE
//! into a conjunction, push single-alias clauses into their source's own
//! filter, then recombine whatever is left into one AND so the runtime sees
//! a single filter stage rather than N.

use indexmap::IndexMap;
use ripple_ir::{BasicExpression, JoinClause, JoinType, Query, Source};

/// The result of optimizing one query level: a per-alias pushed-down
/// predicate (already alias-stripped, ready to compile against that
/// source's own un-namespaced rows) and whatever multi-alias leftover
/// couldn't be pushed, combined into a single clause.
pub struct Optimized {
    pub pushed: IndexMap<String, BasicExpression>,
    pub remaining: Option<BasicExpression>,
}

pub fn optimize(query: &Query) -> Optimized {
    let Some(where_) = query.where_.clone() else {
        return Optimized { pushed: IndexMap::new(), remaining: None };
    };

    let clauses = where_.split_conjunction();
    let mut by_alias: IndexMap<String, Vec<BasicExpression>> = IndexMap::new();
    let mut leftover = Vec::new();

    for clause in clauses {
        match pushable_alias(query, &clause) {
            Some(alias) => by_alias.entry(alias.to_string()).or_default().push(clause),
            None => leftover.push(clause),
        }
    }

    let pushed = by_alias
        .into_iter()
        .filter_map(|(alias, clauses)| BasicExpression::combine_conjunction(clauses).map(|expr| (alias, expr)))
        .collect();

    Optimized { pushed, remaining: BasicExpression::combine_conjunction(leftover) }
}

/// The alias a clause can be pushed into, or `None` if it touches more than
/// one alias, is not expressible as a pure IR tree, or targets a subquery
/// whose own `groupBy`/`limit`/`offset` would change meaning under
/// pushdown.
fn pushable_alias<'a>(query: &'a Query, clause: &BasicExpression) -> Option<&'a str> {
    if !clause.is_convertible() {
        return None;
    }
    let alias = clause.single_alias()?;
    let source = source_for_alias(query, alias)?;
    if blocks_pushdown(source) {
        return None;
    }
    // Confirm `alias` actually names a known source at this query level
    // (single_alias only guarantees internal consistency of the clause).
    query.known_aliases().into_iter().find(|a| *a == alias)
}

fn source_for_alias<'a>(query: &'a Query, alias: &str) -> Option<&'a Source> {
    if alias == query.from_alias {
        return Some(&query.from_source);
    }
    query.joins.iter().find(|j| j.alias == alias).map(|j| &j.source)
}

fn blocks_pushdown(source: &Source) -> bool {
    match source {
        Source::Collection(_) => false,
        Source::Query(q) => !q.group_by.is_empty() || q.limit.is_some() || q.offset.is_some(),
    }
}

/// Which side of a join drives iteration and which is looked up on demand,
/// per spec §4.11. `full` joins and joins on computed expressions (or a
/// paginated subquery source) cannot be lazy and must materialize both
/// sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinLoadStrategy {
    Eager,
    /// The accumulated left side drives; the new (right) alias is looked up
    /// on demand.
    LazyRight,
    /// The new (right) alias drives; the accumulated left side is looked up
    /// on demand.
    LazyLeft,
}

pub fn select_join_strategy(clause: &JoinClause) -> JoinLoadStrategy {
    let plain_refs = matches!(clause.left, BasicExpression::Ref(_)) && matches!(clause.right, BasicExpression::Ref(_));
    let paginated_subquery = matches!(&clause.source, Source::Query(q) if q.limit.is_some() || q.offset.is_some());

    if !plain_refs || paginated_subquery || clause.join_type == JoinType::Full {
        return JoinLoadStrategy::Eager;
    }

    match clause.join_type {
        // The smaller collection should drive; actual cardinality is only
        // known once wired to live collections, so this is the structural
        // default until the runtime layer overrides it.
        JoinType::Inner => JoinLoadStrategy::LazyRight,
        JoinType::Left => JoinLoadStrategy::LazyRight,
        JoinType::Right => JoinLoadStrategy::LazyLeft,
        JoinType::Full => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_ir::{fns, QueryBuilder};

    #[test]
    fn pushes_single_alias_clauses_and_leaves_no_remainder() {
        // from C .where(gridId=x) .where(rowId=y) .where(side=z) — scenario S4.
        let builder = QueryBuilder::from("c", Source::Collection("cells".into()));
        let builder = builder
            .where_(|r| fns::eq(r.alias("c").field("gridId"), BasicExpression::val(1i64)))
            .where_(|r| fns::eq(r.alias("c").field("rowId"), BasicExpression::val(2i64)))
            .where_(|r| fns::eq(r.alias("c").field("side"), BasicExpression::val("left")));
        let query = builder.build();

        let optimized = optimize(&query);
        assert!(optimized.remaining.is_none(), "every clause touches only alias `c`, nothing should remain");
        assert_eq!(optimized.pushed.len(), 1);
        assert!(optimized.pushed.contains_key("c"));
    }

    #[test]
    fn cross_alias_clause_is_not_pushed() {
        let builder = QueryBuilder::from("posts", Source::Collection("posts".into()));
        let builder = builder
            .join("comments", Source::Collection("comments".into()), JoinType::Left, |r| {
                fns::eq(r.alias("comments").field("postId"), r.alias("posts").field("id"))
            })
            .unwrap();
        let builder = builder.where_(|r| {
            fns::eq(r.alias("posts").field("authorId"), r.alias("comments").field("authorId"))
        });
        let query = builder.build();

        let optimized = optimize(&query);
        assert!(optimized.pushed.is_empty());
        assert!(optimized.remaining.is_some());
    }

    #[test]
    fn full_join_is_never_lazy() {
        let clause = JoinClause {
            alias: "b".into(),
            source: Source::Collection("b".into()),
            join_type: JoinType::Full,
            left: BasicExpression::reference(["a", "id"]),
            right: BasicExpression::reference(["b", "id"]),
        };
        assert_eq!(select_join_strategy(&clause), JoinLoadStrategy::Eager);
    }

    #[test]
    fn inner_join_on_plain_refs_is_lazy() {
        let clause = JoinClause {
            alias: "b".into(),
            source: Source::Collection("b".into()),
            join_type: JoinType::Inner,
            left: BasicExpression::reference(["a", "id"]),
            right: BasicExpression::reference(["b", "aId"]),
        };
        assert_eq!(select_join_strategy(&clause), JoinLoadStrategy::LazyRight);
    }
}
