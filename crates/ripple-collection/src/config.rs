// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::time::Duration;

use crate::error::{Error, Result};

/// The recognized top-level config keys (spec §6), used only to validate a
/// host-supplied bag of keys before a [`CollectionConfig`] is constructed —
/// `CollectionConfig` itself is built by application code directly, the
/// validation step exists for hosts that assemble config from a loosely
/// typed map (e.g. deserialized from JSON) and want the typo-suggestion
/// error instead of a silent unknown-key no-op.
pub const RECOGNIZED_KEYS: &[&str] = &[
    "id",
    "schema",
    "getKey",
    "sync",
    "gcTime",
    "startSync",
    "autoIndex",
    "compare",
    "syncMode",
    "defaultStringCollation",
    "onInsert",
    "onUpdate",
    "onDelete",
    "utils",
    "singleResult",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoIndex {
    Off,
    Eager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Eager,
    OnDemand,
}

/// Validates an arbitrary set of config keys a host collected from an
/// untyped source, returning `UnknownCollectionConfig` with edit-distance
/// (Damerau-Levenshtein, distance <= 3) suggestions for anything not in
/// [`RECOGNIZED_KEYS`].
pub fn validate_keys(keys: &[String]) -> Result<()> {
    let unknown: Vec<String> = keys.iter().filter(|k| !RECOGNIZED_KEYS.contains(&k.as_str())).cloned().collect();
    if unknown.is_empty() {
        return Ok(());
    }

    let suggestions = unknown.iter().filter_map(|key| suggest(key)).collect();
    Err(Error::UnknownCollectionConfig { keys: unknown, suggestions })
}

fn suggest(key: &str) -> Option<String> {
    RECOGNIZED_KEYS
        .iter()
        .map(|candidate| (*candidate, strsim::damerau_levenshtein(key, candidate)))
        .filter(|(_, distance)| *distance <= 3)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate.to_string())
}

/// Collection-wide settings beyond the collaborators (`getKey`, `sync`,
/// strategy) that are passed in directly as typed values rather than
/// through the untyped-key validation path.
#[derive(Debug, Clone)]
pub struct CollectionSettings {
    pub gc_time: Duration,
    pub start_sync: bool,
    pub auto_index: AutoIndex,
    pub sync_mode: SyncMode,
    pub single_result: bool,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        CollectionSettings {
            gc_time: Duration::from_secs(300),
            start_sync: true,
            auto_index: AutoIndex::Off,
            sync_mode: SyncMode::Eager,
            single_result: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_close_to_a_real_one_gets_suggested() {
        let err = validate_keys(&["gcTim".to_string()]).unwrap_err();
        match err {
            Error::UnknownCollectionConfig { suggestions, .. } => assert_eq!(suggestions, vec!["gcTime".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unrelated_key_gets_no_suggestion() {
        let err = validate_keys(&["zzzzzzzzzz".to_string()]).unwrap_err();
        match err {
            Error::UnknownCollectionConfig { suggestions, .. } => assert!(suggestions.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn recognized_keys_pass() {
        assert!(validate_keys(&["getKey".to_string(), "sync".to_string()]).is_ok());
    }
}
