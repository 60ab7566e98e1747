// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use crate::value::ValueKind;
use thiserror::Error;

use crate::ordered_float::OrderedFloatError;

/// Errors raised while constructing or converting core value types.
///
/// Higher-level crates (`ripple-collection`, `ripple-query`, ...) wrap this
/// error into their own taxonomy rather than re-exporting it directly.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("value is NaN and cannot be used as a float")]
    NotAnOrderedFloat(#[from] OrderedFloatError),

    #[error("entity key must be a string or an integer, got {0}")]
    InvalidKeyType(ValueKind),
}

pub type Result<T> = std::result::Result<T, Error>;
