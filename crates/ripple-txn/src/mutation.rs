// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use ripple_type::{EntityKey, Row};

/// A single optimistic write against one collection entity, per spec §3's
/// change-message shape (`insert`/`update`/`delete` each carry the key they
/// touch so the manager can detect overlap between transactions).
#[derive(Debug, Clone)]
pub enum Mutation {
    Insert { collection: String, key: EntityKey, value: Row },
    Update { collection: String, key: EntityKey, value: Row },
    Delete { collection: String, key: EntityKey },
}

impl Mutation {
    pub fn collection(&self) -> &str {
        match self {
            Mutation::Insert { collection, .. } => collection,
            Mutation::Update { collection, .. } => collection,
            Mutation::Delete { collection, .. } => collection,
        }
    }

    pub fn key(&self) -> &EntityKey {
        match self {
            Mutation::Insert { key, .. } => key,
            Mutation::Update { key, .. } => key,
            Mutation::Delete { key, .. } => key,
        }
    }

    /// The `(collection, key)` pair that identifies what this mutation
    /// overlaps with; two mutations touching the same pair across different
    /// transactions are what triggers a merge.
    pub fn target(&self) -> (String, EntityKey) {
        (self.collection().to_string(), self.key().clone())
    }
}
