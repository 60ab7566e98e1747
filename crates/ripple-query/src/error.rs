// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown source alias `{0}`")]
    UnknownAlias(String),
    #[error(transparent)]
    Ir(#[from] ripple_ir::Error),
    #[error(transparent)]
    Eval(#[from] ripple_registry::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
