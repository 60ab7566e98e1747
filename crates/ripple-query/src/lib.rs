// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

//! Compiles a [`ripple_ir::Query`] into an executable dataflow pipeline.
//!
//! The compiler follows the eight-step order described by spec §4.10:
//! optimize the WHERE tree, namespace each source's rows under its alias,
//! apply per-source filters, chain joins, group, filter by `having`, order
//! and paginate, and finally project through `select`/`fnSelect`. See
//! [`CompiledPipeline`] for the runtime entry point and [`optimizer`] for
//! the WHERE-pushdown and join load-strategy passes that precede it.

mod compiler;
mod error;
mod optimizer;

pub use compiler::{CompiledJoin, CompiledPipeline, CompiledSource};
pub use error::{Error, Result};
pub use optimizer::{optimize, select_join_strategy, JoinLoadStrategy, Optimized};
