// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use ripple_type::EntityKey;
use thiserror::Error;

/// Stable error taxonomy (spec §6). Every id names one misuse or one fatal
/// runtime condition; nothing here is swallowed the way strategy bookkeeping
/// is — these always surface to the caller.
#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error("collection requires a config object")]
    CollectionRequiresConfig,

    #[error("collection config requires `getKey`")]
    CollectionRequiresGetKey,

    #[error("collection config requires a `sync` config")]
    CollectionRequiresSyncConfig,

    #[error("invalid `sync` config: {0}")]
    InvalidSyncConfig(String),

    #[error("`sync.sync` must be a function")]
    InvalidSyncFunction,

    #[error("`getKey` must be a function")]
    InvalidGetKey,

    #[error("invalid callback option `{0}`")]
    InvalidCallbackOption(String),

    #[error("option `{option}` expected {expected}, got {got}")]
    InvalidOptionType { option: String, expected: String, got: String },

    #[error("unknown collection config key(s) {keys:?}, suggestions: {suggestions:?}")]
    UnknownCollectionConfig { keys: Vec<String>, suggestions: Vec<String> },

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("unsupported aggregate function `{0}`")]
    UnsupportedAggregateFunction(String),

    #[error("unsupported join type")]
    UnsupportedJoinType,

    #[error("unsupported join source type")]
    UnsupportedJoinSourceType,

    #[error("invalid join condition: {0}")]
    InvalidJoinCondition(String),

    #[error("collection input not found")]
    CollectionInputNotFound,

    #[error("join collection not found")]
    JoinCollectionNotFound,

    #[error("duplicate key on sync insert: {0}")]
    DuplicateKeySync(EntityKey),

    #[error("active subscriber count went negative")]
    NegativeActiveSubscribers,

    #[error(transparent)]
    Transaction(#[from] ripple_txn::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
