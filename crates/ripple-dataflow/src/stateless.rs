// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use ripple_registry::RowEvaluator;
use ripple_type::Row;

use crate::diff::{consolidate, Batch, Diff};
use crate::operator::DataflowOperator;

/// Transforms each diff's value through `project`, preserving key and
/// multiplicity.
pub struct Map {
    project: Box<dyn Fn(&Row) -> Row + Send>,
}

impl Map {
    pub fn new(project: impl Fn(&Row) -> Row + Send + 'static) -> Self {
        Map { project: Box::new(project) }
    }
}

impl DataflowOperator for Map {
    fn apply(&mut self, input: Batch) -> Batch {
        input.into_iter().map(|d| Diff::new(d.key, (self.project)(&d.value), d.multiplicity)).collect()
    }
}

/// Retains only diffs whose value satisfies a compiled predicate.
pub struct Filter {
    predicate: RowEvaluator,
}

impl Filter {
    pub fn new(predicate: RowEvaluator) -> Self {
        Filter { predicate }
    }
}

impl DataflowOperator for Filter {
    fn apply(&mut self, input: Batch) -> Batch {
        input.into_iter().filter(|d| (self.predicate)(&d.value).as_bool().unwrap_or(false)).collect()
    }
}

/// Passes every diff through unchanged while invoking a side effect per
/// diff. Used by the lazy join loader (§4.12) to drive on-demand `syncMore`
/// calls as the active side of a join yields keys, without altering the
/// stream itself.
pub struct Tap {
    on_diff: Box<dyn FnMut(&Diff) + Send>,
}

impl Tap {
    pub fn new(on_diff: impl FnMut(&Diff) + Send + 'static) -> Self {
        Tap { on_diff: Box::new(on_diff) }
    }
}

impl DataflowOperator for Tap {
    fn apply(&mut self, input: Batch) -> Batch {
        for diff in &input {
            (self.on_diff)(diff);
        }
        input
    }
}

/// Wraps the free [`consolidate`] function as a pipeline stage.
pub struct Consolidate;

impl DataflowOperator for Consolidate {
    fn apply(&mut self, input: Batch) -> Batch {
        consolidate(input)
    }
}
