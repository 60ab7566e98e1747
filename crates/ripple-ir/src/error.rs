// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A `join(...)`'s `on` callback did not return an `eq(ref, ref)` call
    /// whose two sides each reference exactly one table alias.
    #[error("invalid join condition for alias `{0}`")]
    InvalidJoinCondition(String),

    #[error("limit/offset require an orderBy clause")]
    LimitWithoutOrderBy,

    #[error("alias `{0}` is already in use in this query")]
    DuplicateAlias(String),

    #[error("unknown alias `{0}` referenced in select")]
    UnknownAlias(String),
}

pub type Result<T> = std::result::Result<T, Error>;
