// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] ripple_query::Error),

    #[error(transparent)]
    Collection(#[from] ripple_collection::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
