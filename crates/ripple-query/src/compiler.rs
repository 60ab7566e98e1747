// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! The query compiler (spec §4.10): turns a [`Query`] IR tree into a
//! [`CompiledPipeline`] of dataflow stages, following the eight-step order
//! spec.md lays out — optimize, wrap sources, filter, join, group, having,
//! order/paginate, project.

use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;
use ripple_compiler::{AggregateCompiler, ExpressionCompiler};
use ripple_dataflow::{Batch, Diff, GroupBy, Join as DataflowJoin, JoinKind, OnDemandLookup, OrderBy};
use ripple_index::Collation;
use ripple_ir::{BasicExpression, FnProjectionSlot, JoinType, OrderByItem, OrderDirection, Query, SelectItem, Source};
use ripple_registry::{AggregateRegistry, OperatorRegistry, RowEvaluator};
use ripple_type::{Row, Value};

use crate::error::{Error, Result};
use crate::optimizer::{optimize, select_join_strategy, JoinLoadStrategy};

type PredicateFn = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// Where a compiled source's rows come from. A subquery is compiled
/// recursively; driving its pipeline from the concrete collection it
/// eventually bottoms out at is the runtime wiring layer's job (spec's
/// `aliasToCollectionId`/`aliasRemapping` bookkeeping), not this crate's.
pub enum CompiledSource {
    Collection(String),
    Subquery(Box<CompiledPipeline>),
}

enum ProjectionField {
    Value(String, RowEvaluator),
    /// An aggregate's output is already present under this name in the row
    /// produced by the `groupBy` stage; just copy it across.
    Passthrough(String),
    Spread(String),
}

pub struct CompiledJoin {
    pub alias: String,
    pub kind: JoinKind,
    pub source: CompiledSource,
    pub load_strategy: JoinLoadStrategy,
    /// The bare field name a `LazyRight` join's right side can be looked up
    /// on (spec §4.11). `None` either because `load_strategy` isn't
    /// `LazyRight` or because the join key isn't a plain single-field
    /// reference the collection can index by, in which case this join
    /// stays eager regardless of what `load_strategy` recommends.
    pub lazy_right_field: Option<String>,
    predicate: Option<PredicateFn>,
    operator: DataflowJoin,
}

/// A query IR tree compiled into an executable pipeline of dataflow stages.
/// `feed` is the single entry point: it takes the alias a batch of diffs
/// originated from and returns the batch of diffs the whole pipeline emits.
pub struct CompiledPipeline {
    pub find_one: bool,
    pub alias_to_collection_id: IndexMap<String, String>,
    base_alias: String,
    base_source: CompiledSource,
    base_predicate: Option<PredicateFn>,
    joins: Vec<CompiledJoin>,
    remaining_where: Option<PredicateFn>,
    group_by: Option<GroupBy>,
    having: Option<PredicateFn>,
    order_by: Option<OrderBy>,
    select_fields: Vec<ProjectionField>,
    fn_select: Option<FnProjectionSlot>,
}

impl CompiledPipeline {
    pub fn compile(
        query: &Query,
        operators: Arc<OperatorRegistry>,
        aggregates: Arc<AggregateRegistry>,
    ) -> Result<Self> {
        let expr_compiler = ExpressionCompiler::new(operators.clone());
        let agg_compiler = AggregateCompiler::new(operators.clone(), aggregates.clone());
        let optimized = optimize(query);

        let base_predicate =
            compile_pushed_predicate(&expr_compiler, optimized.pushed.get(&query.from_alias), &query.from_alias)?;
        let base_source = compile_source(&query.from_source, operators.clone(), aggregates.clone())?;

        let mut joins = Vec::with_capacity(query.joins.len());
        for clause in &query.joins {
            let predicate = compile_pushed_predicate(&expr_compiler, optimized.pushed.get(&clause.alias), &clause.alias)?;
            let source = compile_source(&clause.source, operators.clone(), aggregates.clone())?;

            // `left` is already alias-qualified and, by the time it reaches any
            // join's `apply_left`, always running against an already-namespaced
            // row: the base alias is namespaced explicitly before the first
            // join, and every join after that produces a namespaced row itself.
            let right_key_expr = clause.right.strip_alias(&clause.alias).unwrap_or_else(|| clause.right.clone());

            let left_key = expr_compiler.compile(&clause.left, false)?;
            let right_key = expr_compiler.compile(&right_key_expr, false)?;
            let kind = join_kind(clause.join_type);

            let operator = DataflowJoin::chained(kind, left_key, clause.alias.clone(), right_key);
            let load_strategy = select_join_strategy(clause);
            let lazy_right_field = match (load_strategy, &right_key_expr) {
                (JoinLoadStrategy::LazyRight, BasicExpression::Ref(path)) if path.len() == 1 => {
                    Some(path[0].clone())
                }
                _ => None,
            };

            joins.push(CompiledJoin {
                alias: clause.alias.clone(),
                kind,
                source,
                load_strategy,
                lazy_right_field,
                predicate,
                operator,
            });
        }

        let remaining_where =
            optimized.remaining.as_ref().map(|expr| expr_compiler.compile_predicate(expr, false)).transpose()?;

        let has_aggregates = query.select.values().any(SelectItem::is_aggregate);
        let group_by = if !query.group_by.is_empty() || has_aggregates {
            Some(compile_group_by(query, &expr_compiler, &agg_compiler)?)
        } else {
            None
        };

        let having =
            query.having.as_ref().map(|expr| expr_compiler.compile_predicate(expr, false)).transpose()?;

        let order_by = if !query.order_by.is_empty() {
            let (extractor, collation) = compile_order_by(&query.order_by, &expr_compiler)?;
            Some(OrderBy::new(extractor, collation, query.offset.unwrap_or(0), query.limit))
        } else {
            None
        };

        let select_fields = compile_select(&query.select, &expr_compiler)?;

        let mut alias_to_collection_id = IndexMap::new();
        if let Some(id) = resolve_collection_id(&query.from_source) {
            alias_to_collection_id.insert(query.from_alias.clone(), id);
        }
        for clause in &query.joins {
            if let Some(id) = resolve_collection_id(&clause.source) {
                alias_to_collection_id.insert(clause.alias.clone(), id);
            }
        }

        Ok(CompiledPipeline {
            find_one: query.find_one,
            alias_to_collection_id,
            base_alias: query.from_alias.clone(),
            base_source,
            base_predicate,
            joins,
            remaining_where,
            group_by,
            having,
            order_by,
            select_fields,
            fn_select: query.fn_select.clone(),
        })
    }

    /// The field a caller driving `alias`'s subscription should look up on
    /// demand instead of feeding the collection's full current state
    /// eagerly, or `None` if `alias` isn't a lazily-loaded join side.
    pub fn lazy_right_field(&self, alias: &str) -> Option<&str> {
        self.joins.iter().find(|j| j.alias == alias).and_then(|j| j.lazy_right_field.as_deref())
    }

    /// Wires the lazy lookup for `alias` into its join operator. A no-op if
    /// `alias` doesn't name a join in this pipeline or has no
    /// [`Self::lazy_right_field`].
    pub fn set_on_demand_right(&mut self, alias: &str, lookup: OnDemandLookup) {
        if let Some(join) = self.joins.iter_mut().find(|j| j.alias == alias) {
            if join.lazy_right_field.is_some() {
                join.operator.set_on_demand_right(lookup);
            }
        }
    }

    /// Feeds a batch of diffs that originated from `alias`'s source through
    /// the pipeline, returning the diffs the pipeline emits downstream.
    pub fn feed(&mut self, alias: &str, batch: Batch) -> Result<Batch> {
        let mut current;
        if alias == self.base_alias {
            let filtered = filter_batch(&self.base_predicate, batch);
            current = namespace_batch(&self.base_alias, filtered);
            for join in &mut self.joins {
                current = join.operator.apply_left(current);
            }
        } else if let Some(pos) = self.joins.iter().position(|j| j.alias == alias) {
            let filtered = filter_batch(&self.joins[pos].predicate, batch);
            current = self.joins[pos].operator.apply_right(filtered);
            for join in &mut self.joins[pos + 1..] {
                current = join.operator.apply_left(current);
            }
        } else {
            return Err(Error::UnknownAlias(alias.to_string()));
        }

        Ok(self.apply_post_join_stages(current))
    }

    fn apply_post_join_stages(&mut self, batch: Batch) -> Batch {
        let mut current = filter_batch(&self.remaining_where, batch);
        if let Some(group_by) = &mut self.group_by {
            current = group_by.apply(current);
        }
        current = filter_batch(&self.having, current);
        if let Some(order_by) = &mut self.order_by {
            current = order_by.apply(current);
        }

        current
            .into_iter()
            .map(|diff| {
                let projected = match &self.fn_select {
                    Some(f) => f.call(&diff.value),
                    None => apply_select(&self.select_fields, &diff.value),
                };
                Diff::new(diff.key, projected, diff.multiplicity)
            })
            .collect()
    }
}

fn compile_source(
    source: &Source,
    operators: Arc<OperatorRegistry>,
    aggregates: Arc<AggregateRegistry>,
) -> Result<CompiledSource> {
    match source {
        Source::Collection(id) => Ok(CompiledSource::Collection(id.clone())),
        Source::Query(subquery) => {
            Ok(CompiledSource::Subquery(Box::new(CompiledPipeline::compile(subquery, operators, aggregates)?)))
        }
    }
}

/// The concrete collection id an alias's source ultimately reaches, if it
/// can be determined without resolving joins inside a nested subquery.
fn resolve_collection_id(source: &Source) -> Option<String> {
    match source {
        Source::Collection(id) => Some(id.clone()),
        Source::Query(q) => resolve_collection_id(&q.from_source),
    }
}

fn compile_pushed_predicate(
    compiler: &ExpressionCompiler,
    pushed: Option<&BasicExpression>,
    alias: &str,
) -> Result<Option<PredicateFn>> {
    let Some(expr) = pushed else { return Ok(None) };
    let stripped = expr.strip_alias(alias).unwrap_or_else(|| expr.clone());
    Ok(Some(compiler.compile_predicate(&stripped, false)?))
}

fn join_kind(join_type: JoinType) -> JoinKind {
    match join_type {
        JoinType::Inner => JoinKind::Inner,
        JoinType::Left => JoinKind::Left,
        JoinType::Right => JoinKind::Right,
        JoinType::Full => JoinKind::Full,
    }
}

fn filter_batch(predicate: &Option<PredicateFn>, batch: Batch) -> Batch {
    match predicate {
        Some(predicate) => batch.into_iter().filter(|diff| predicate(&diff.value)).collect(),
        None => batch,
    }
}

/// Wraps every row in `batch` under `alias`, matching what the first join
/// in a chain would otherwise do internally — done explicitly so a query
/// with no joins at all still produces the namespaced rows `select`/`where`
/// expect (spec step 2: "build namespaced source streams").
fn namespace_batch(alias: &str, batch: Batch) -> Batch {
    batch.into_iter().map(|diff| Diff::new(diff.key, namespace_row(alias, diff.value), diff.multiplicity)).collect()
}

fn namespace_row(alias: &str, row: Row) -> Row {
    let object: std::collections::BTreeMap<String, Value> =
        row.fields().map(|(k, v)| (k.clone(), v.clone())).collect();
    let mut namespaced = Row::new();
    namespaced.set(alias.to_string(), Value::Object(object));
    namespaced
}

fn compile_group_by(
    query: &Query,
    expr_compiler: &ExpressionCompiler,
    agg_compiler: &AggregateCompiler,
) -> Result<GroupBy> {
    let group_exprs =
        query.group_by.iter().map(|expr| expr_compiler.compile(expr, false)).collect::<ripple_registry::Result<Vec<_>>>()?;
    let mut group_by = GroupBy::new(group_exprs);

    for (name, item) in &query.select {
        if let SelectItem::Agg(agg) = item {
            let factory = agg_compiler.compile(agg)?;
            let extractor = match agg.args.first() {
                Some(expr) => expr_compiler.compile(expr, false)?,
                None => Arc::new(|_row: &Row| Value::Undefined),
            };
            group_by = group_by.with_aggregate(name.clone(), factory, extractor);
        }
    }

    Ok(group_by)
}

fn compile_order_by(order_by: &[OrderByItem], compiler: &ExpressionCompiler) -> Result<(RowEvaluator, Collation)> {
    let mut extractors = Vec::with_capacity(order_by.len());
    let mut directions = Vec::with_capacity(order_by.len());
    for item in order_by {
        extractors.push(compiler.compile(&item.expr, false)?);
        directions.push(item.direction);
    }

    let extractor: RowEvaluator = Arc::new(move |row: &Row| Value::Array(extractors.iter().map(|e| e(row)).collect()));
    let collation = Collation::new(move |a, b| match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                let ord = x.cmp(y);
                let ord = if directions[i] == OrderDirection::Desc { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
        _ => a.cmp(b),
    });

    Ok((extractor, collation))
}

fn compile_select(select: &IndexMap<String, SelectItem>, compiler: &ExpressionCompiler) -> Result<Vec<ProjectionField>> {
    let mut fields = Vec::with_capacity(select.len());
    for (name, item) in select {
        let field = match item {
            SelectItem::Expr(expr) => ProjectionField::Value(name.clone(), compiler.compile(expr, false)?),
            SelectItem::Agg(_) => ProjectionField::Passthrough(name.clone()),
            SelectItem::SpreadAlias(alias) => ProjectionField::Spread(alias.clone()),
        };
        fields.push(field);
    }
    Ok(fields)
}

/// With no `select`/`fnSelect` given, the projection is the identity —
/// mirroring a bare `select *`.
fn apply_select(fields: &[ProjectionField], row: &Row) -> Row {
    if fields.is_empty() {
        return row.clone();
    }
    let mut out = Row::new();
    for field in fields {
        match field {
            ProjectionField::Value(name, evaluator) => out.set(name.clone(), evaluator(row)),
            ProjectionField::Passthrough(name) => out.set(name.clone(), row.get(name).clone()),
            ProjectionField::Spread(alias) => {
                if let Value::Object(nested) = row.get(alias) {
                    for (k, v) in nested {
                        out.set(k.clone(), v.clone());
                    }
                }
            }
        }
    }
    out
}
