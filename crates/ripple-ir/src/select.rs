// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use crate::expr::{Agg, BasicExpression};

/// One entry of a `select` map.
///
/// A spread of an alias's ref (`select(p => ({ ...p.user }))`) is recorded
/// as `SpreadAlias` rather than a magic reserved-key string, per the
/// "spread sentinel" design note: the compiler expands it to all fields of
/// that alias's row at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Expr(BasicExpression),
    Agg(Agg),
    SpreadAlias(String),
}

impl SelectItem {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, SelectItem::Agg(_))
    }
}
