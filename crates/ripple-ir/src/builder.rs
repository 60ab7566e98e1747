// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::expr::{BasicExpression, OrderByItem, OrderDirection};
use crate::query::{FnPredicate, FnPredicateSlot, FnProjection, FnProjectionSlot, JoinClause, JoinType, Query, Source};
use crate::select::SelectItem;

/// A phantom-typed stand-in for the source language's dynamic `{alias: ref}`
/// proxy: each known alias yields an [`AliasRef`] whose `.field(name)`
/// method produces a `Ref` IR node, with no runtime reflection involved.
#[derive(Debug, Clone)]
pub struct RefProxy {
    aliases: Vec<String>,
}

impl RefProxy {
    fn new(aliases: Vec<String>) -> Self {
        RefProxy { aliases }
    }

    /// Yields a table-qualified expression builder for `alias`. Panics if
    /// `alias` is not yet available — this mirrors a compile-time guarantee
    /// in the source language's builder that is enforced dynamically here
    /// since the alias set is only known at `build()` time.
    pub fn alias(&self, alias: &str) -> AliasRef {
        assert!(
            self.aliases.iter().any(|a| a == alias),
            "alias `{alias}` is not available at this point in the query"
        );
        AliasRef { alias: alias.to_string() }
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
}

#[derive(Debug, Clone)]
pub struct AliasRef {
    alias: String,
}

impl AliasRef {
    pub fn field(&self, name: impl Into<String>) -> BasicExpression {
        BasicExpression::Ref(vec![self.alias.clone(), name.into()])
    }

    pub fn spread(&self) -> SelectItem {
        SelectItem::SpreadAlias(self.alias.clone())
    }
}

/// Free-function IR constructors mirroring the operator registry's
/// well-known names, for use inside `where`/`having`/`join` callbacks.
pub mod fns {
    use crate::expr::BasicExpression;

    pub fn eq(a: BasicExpression, b: BasicExpression) -> BasicExpression {
        BasicExpression::func("eq", vec![a, b])
    }

    pub fn and(a: BasicExpression, b: BasicExpression) -> BasicExpression {
        BasicExpression::func("and", vec![a, b])
    }

    pub fn or(a: BasicExpression, b: BasicExpression) -> BasicExpression {
        BasicExpression::func("or", vec![a, b])
    }

    pub fn gt(a: BasicExpression, b: BasicExpression) -> BasicExpression {
        BasicExpression::func("gt", vec![a, b])
    }
}

/// Chainable builder for [`Query`]. `from` establishes the root alias; every
/// subsequent stage either mutates the query in place or returns a `Result`
/// when the stage can fail to compile (joins, limit/offset without
/// `orderBy`).
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn from(alias: impl Into<String>, source: Source) -> Self {
        QueryBuilder { query: Query::new(alias, source) }
    }

    fn proxy(&self) -> RefProxy {
        RefProxy::new(self.query.known_aliases().into_iter().map(String::from).collect())
    }

    /// `join({alias: source}, onCallback, type)`. The callback's returned
    /// `eq(ref, ref)` expression is canonicalized so the left operand
    /// belongs to an already-available alias and the right to the newly
    /// joined one.
    pub fn join(
        mut self,
        alias: impl Into<String>,
        source: Source,
        join_type: JoinType,
        on: impl FnOnce(&RefProxy) -> BasicExpression,
    ) -> Result<Self> {
        let alias = alias.into();
        if self.query.known_aliases().iter().any(|a| *a == alias) {
            return Err(Error::DuplicateAlias(alias));
        }

        let mut proxy_aliases = self.query.known_aliases().into_iter().map(String::from).collect::<Vec<_>>();
        proxy_aliases.push(alias.clone());
        let proxy = RefProxy::new(proxy_aliases);
        let condition = on(&proxy);

        let known_before: std::collections::HashSet<&str> = self.query.known_aliases().into_iter().collect();
        let (left, right) = canonicalize_join(condition, &known_before, &alias)
            .ok_or_else(|| Error::InvalidJoinCondition(alias.clone()))?;

        self.query.joins.push(JoinClause { alias, source, join_type, left, right });
        Ok(self)
    }

    pub fn where_(mut self, cb: impl FnOnce(&RefProxy) -> BasicExpression) -> Self {
        let expr = cb(&self.proxy());
        self.query.where_ = match self.query.where_.take() {
            Some(existing) => Some(fns::and(existing, expr)),
            None => Some(expr),
        };
        self
    }

    /// Functional escape hatch: disables optimization along this branch.
    pub fn fn_where(mut self, f: FnPredicate) -> Self {
        self.query.fn_where = Some(FnPredicateSlot::new(f));
        self
    }

    pub fn group_by(mut self, cb: impl FnOnce(&RefProxy) -> Vec<BasicExpression>) -> Self {
        self.query.group_by = cb(&self.proxy());
        self
    }

    pub fn having(mut self, cb: impl FnOnce(&RefProxy) -> BasicExpression) -> Self {
        let expr = cb(&self.proxy());
        self.query.having = match self.query.having.take() {
            Some(existing) => Some(fns::and(existing, expr)),
            None => Some(expr),
        };
        self
    }

    pub fn fn_having(mut self, f: FnPredicate) -> Self {
        self.query.fn_having = Some(FnPredicateSlot::new(f));
        self
    }

    pub fn order_by(mut self, cb: impl FnOnce(&RefProxy) -> BasicExpression, direction: OrderDirection) -> Self {
        let expr = cb(&self.proxy());
        self.query.order_by.push(OrderByItem { expr, direction });
        self
    }

    pub fn limit(mut self, n: usize) -> Result<Self> {
        if self.query.order_by.is_empty() {
            return Err(Error::LimitWithoutOrderBy);
        }
        self.query.limit = Some(n);
        Ok(self)
    }

    pub fn offset(mut self, n: usize) -> Result<Self> {
        if self.query.order_by.is_empty() {
            return Err(Error::LimitWithoutOrderBy);
        }
        self.query.offset = Some(n);
        Ok(self)
    }

    pub fn select(mut self, cb: impl FnOnce(&RefProxy) -> IndexMap<String, SelectItem>) -> Self {
        self.query.select = cb(&self.proxy());
        self
    }

    pub fn fn_select(mut self, f: FnProjection) -> Self {
        self.query.fn_select = Some(FnProjectionSlot::new(f));
        self
    }

    pub fn find_one(mut self) -> Self {
        self.query.find_one = true;
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Canonicalizes a join's `on` expression: it must be `eq(a, b)` where each
/// of `a`, `b` references exactly one alias, one of which is already known
/// and the other is the alias newly being joined.
fn canonicalize_join(
    expr: BasicExpression,
    known: &std::collections::HashSet<&str>,
    new_alias: &str,
) -> Option<(BasicExpression, BasicExpression)> {
    let BasicExpression::Func(name, mut args) = expr else { return None };
    if name != "eq" || args.len() != 2 {
        return None;
    }
    let b = args.pop().unwrap();
    let a = args.pop().unwrap();

    let a_alias = a.single_alias()?;
    let b_alias = b.single_alias()?;

    if a_alias == new_alias && known.contains(b_alias) {
        Some((b, a))
    } else if b_alias == new_alias && known.contains(a_alias) {
        Some((a, b))
    } else {
        None
    }
}
