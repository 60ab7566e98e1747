// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use crate::diff::Batch;

/// A stage of the differential-dataflow pipeline: consumes one batch of
/// diffs and produces the batch of diffs it causes downstream.
///
/// Stateless operators (`map`, `filter`, `tap`) ignore `&mut self`; stateful
/// ones (`join`, `group_by`, `order_by`, `distinct`) maintain an arrangement
/// across calls, mirroring the "dataflow operators own their arrangements"
/// resource-ownership rule.
pub trait DataflowOperator: Send {
    fn apply(&mut self, input: Batch) -> Batch;
}
