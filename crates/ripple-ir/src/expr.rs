// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use ripple_type::Value;

/// A scalar expression over a namespaced row, resolved at compile time
/// against the operator registry.
///
/// Mirrors the discriminated tree from the query IR: a constant, a path
/// reference into a row, or a named function call whose arguments are
/// themselves expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum BasicExpression {
    Val(Value),
    /// A path into a (possibly alias-qualified) row, e.g. `["user", "id"]`.
    Ref(Vec<String>),
    Func(String, Vec<BasicExpression>),
}

impl BasicExpression {
    pub fn val(value: impl Into<Value>) -> Self {
        BasicExpression::Val(value.into())
    }

    pub fn reference(path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        BasicExpression::Ref(path.into_iter().map(Into::into).collect())
    }

    pub fn func(name: impl Into<String>, args: Vec<BasicExpression>) -> Self {
        BasicExpression::Func(name.into(), args)
    }

    /// The table alias every leaf `Ref` in this expression agrees on, or
    /// `None` if the expression references zero or more than one alias.
    /// Used by the join builder to canonicalize `on` conditions and by the
    /// optimizer to decide which source a WHERE clause can push into.
    pub fn single_alias(&self) -> Option<&str> {
        match self {
            BasicExpression::Val(_) => None,
            BasicExpression::Ref(path) => path.first().map(String::as_str),
            BasicExpression::Func(_, args) => {
                let mut found: Option<&str> = None;
                for arg in args {
                    match arg.single_alias() {
                        Some(alias) => match found {
                            None => found = Some(alias),
                            Some(existing) if existing == alias => {}
                            Some(_) => return None,
                        },
                        None => {}
                    }
                }
                found
            }
        }
    }

    /// Strips the leading alias segment from every `Ref` in this expression,
    /// producing the equivalent expression against a single, un-namespaced
    /// collection row. Used when pushing a query-level WHERE predicate down
    /// into a single collection's own filter (`["user","id"] -> ["id"]`).
    pub fn strip_alias(&self, alias: &str) -> Option<BasicExpression> {
        match self {
            BasicExpression::Val(v) => Some(BasicExpression::Val(v.clone())),
            BasicExpression::Ref(path) => {
                if path.first().map(String::as_str) == Some(alias) {
                    Some(BasicExpression::Ref(path[1..].to_vec()))
                } else {
                    None
                }
            }
            BasicExpression::Func(name, args) => {
                let mut stripped = Vec::with_capacity(args.len());
                for arg in args {
                    stripped.push(arg.strip_alias(alias)?);
                }
                Some(BasicExpression::Func(name.clone(), stripped))
            }
        }
    }

    /// True iff this expression is a pure tree of `Val | Ref | Func` nodes —
    /// i.e. convertible to a collection filter, as opposed to a functional
    /// escape-hatch predicate.
    pub fn is_convertible(&self) -> bool {
        match self {
            BasicExpression::Val(_) | BasicExpression::Ref(_) => true,
            BasicExpression::Func(_, args) => args.iter().all(BasicExpression::is_convertible),
        }
    }

    /// Decomposes a top-level conjunction into its conjuncts, splitting at
    /// `AND` roots. A non-`AND` expression yields a single-element vector.
    pub fn split_conjunction(self) -> Vec<BasicExpression> {
        match self {
            BasicExpression::Func(name, mut args) if name == "and" && args.len() == 2 => {
                let right = args.pop().unwrap();
                let left = args.pop().unwrap();
                let mut clauses = left.split_conjunction();
                clauses.extend(right.split_conjunction());
                clauses
            }
            other => vec![other],
        }
    }

    /// Re-conjoins a list of clauses into a single `AND` tree, the inverse of
    /// [`split_conjunction`](Self::split_conjunction). Returns `None` for an
    /// empty input.
    pub fn combine_conjunction(mut clauses: Vec<BasicExpression>) -> Option<BasicExpression> {
        let mut combined = clauses.pop()?;
        while let Some(clause) = clauses.pop() {
            combined = BasicExpression::func("and", vec![clause, combined]);
        }
        Some(combined)
    }
}

/// An aggregate call, resolved against the aggregate registry at compile
/// time (`count`, `sum`, `min`, `max`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Agg {
    pub name: String,
    pub args: Vec<BasicExpression>,
}

impl Agg {
    pub fn new(name: impl Into<String>, args: Vec<BasicExpression>) -> Self {
        Agg { name: name.into(), args }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: BasicExpression,
    pub direction: OrderDirection,
}
