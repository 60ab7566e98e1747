// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error("persist failed: {0}")]
    Persist(String),

    #[error("sync operation timed out after 2 seconds")]
    SyncTimedOut,

    #[error("sync failed: {0}")]
    Sync(String),

    #[error("transaction rolled back")]
    RolledBack,
}

pub type Result<T> = std::result::Result<T, Error>;

/// The `isPersisted`/`isSynced` promises resolve with a shared, cloneable
/// error since every caller holding the same merged transaction id needs to
/// observe the same outcome.
pub type SharedError = Arc<Error>;
