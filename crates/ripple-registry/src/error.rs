// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("unsupported aggregate function `{0}`")]
    UnsupportedAggregateFunction(String),
}

pub type Result<T> = std::result::Result<T, Error>;
