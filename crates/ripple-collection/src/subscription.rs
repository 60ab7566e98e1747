// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ripple_type::{EntityKey, Row};

use crate::change::{Change, ChangeType};

pub type ChangeCallback = Arc<dyn Fn(&[Change]) + Send + Sync>;
pub type RowFilter = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Ready,
    LoadingMore,
}

pub type SubscriptionId = u64;

fn next_subscription_id() -> SubscriptionId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Per-subscriber record (spec §3/§4.2). `sent_keys` is what makes the
/// "insert-until-first-surfaced" rewrite possible: an `update`/`delete` for
/// a key this subscriber never saw is either dropped (delete) or rewritten
/// to an `insert` (update), since from this subscriber's point of view the
/// key doesn't exist yet.
pub struct Subscription {
    pub id: SubscriptionId,
    filter: Option<RowFilter>,
    callback: ChangeCallback,
    sent_keys: Mutex<HashSet<EntityKey>>,
    status: Mutex<SubscriptionStatus>,
}

impl Subscription {
    pub fn new(filter: Option<RowFilter>, callback: ChangeCallback) -> Arc<Self> {
        Arc::new(Subscription {
            id: next_subscription_id(),
            filter,
            callback,
            sent_keys: Mutex::new(HashSet::new()),
            status: Mutex::new(SubscriptionStatus::Ready),
        })
    }

    pub fn status(&self) -> SubscriptionStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: SubscriptionStatus) {
        *self.status.lock() = status;
    }

    pub fn filter(&self) -> Option<RowFilter> {
        self.filter.clone()
    }

    /// Marks `key` as already visible to this subscriber without emitting
    /// anything, so a later genuine update for it is projected as an update
    /// rather than rewritten into a fresh insert (used when a key was
    /// surfaced through a side channel other than a change batch or
    /// snapshot — an on-demand join lookup, for instance).
    pub fn mark_sent(&self, key: &EntityKey) {
        self.sent_keys.lock().insert(key.clone());
    }

    fn passes_filter(&self, row: &Row) -> bool {
        self.filter.as_ref().map_or(true, |f| f(row))
    }

    /// Rewrites a batch of changes for this subscriber's view: changes that
    /// fail the filter (and weren't already sent) are dropped; a matching
    /// insert marks the key sent; an update/delete for a never-sent key
    /// becomes an insert/no-op respectively.
    pub fn project(&self, changes: &[Change]) -> Vec<Change> {
        let mut sent_keys = self.sent_keys.lock();
        let mut out = Vec::with_capacity(changes.len());

        for change in changes {
            let matches = self.passes_filter(&change.value);
            let already_sent = sent_keys.contains(&change.key);

            match change.kind {
                ChangeType::Insert => {
                    if matches {
                        sent_keys.insert(change.key.clone());
                        out.push(change.clone());
                    }
                }
                ChangeType::Update => {
                    if !already_sent {
                        if matches {
                            sent_keys.insert(change.key.clone());
                            out.push(Change::insert(change.key.clone(), change.value.clone()));
                        }
                    } else if matches {
                        out.push(change.clone());
                    } else {
                        sent_keys.remove(&change.key);
                        out.push(Change::delete(change.key.clone(), change.previous_value.clone().unwrap_or_default()));
                    }
                }
                ChangeType::Delete => {
                    if already_sent {
                        sent_keys.remove(&change.key);
                        out.push(change.clone());
                    }
                }
            }
        }

        out
    }

    pub fn emit(&self, changes: &[Change]) {
        let projected = self.project(changes);
        if !projected.is_empty() {
            (self.callback)(&projected);
        }
    }

    /// A snapshot of already-visible rows, emitted as inserts and marking
    /// every included key sent (spec §4.2: "snapshots are produced as
    /// insert events").
    pub fn emit_snapshot(&self, rows: &[(EntityKey, Row)]) {
        let mut sent_keys = self.sent_keys.lock();
        let inserts: Vec<Change> = rows
            .iter()
            .filter(|(_, row)| self.passes_filter(row))
            .map(|(key, row)| {
                sent_keys.insert(key.clone());
                Change::insert(key.clone(), row.clone())
            })
            .collect();
        drop(sent_keys);
        if !inserts.is_empty() {
            (self.callback)(&inserts);
        }
    }

    pub fn sent_keys_snapshot(&self) -> HashSet<EntityKey> {
        self.sent_keys.lock().clone()
    }
}
