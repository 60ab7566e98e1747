// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use ripple_index::{Collation, RangeIndex};
use ripple_strategy::{ExecuteOptions, MutationFn, Strategy};
use ripple_txn::{
    apply_transaction as txn_apply_transaction, AwaitSyncFn, Mutation as TxnMutation, PersistFn, Transaction,
    TransactionManager, TransactionStrategy,
};
use ripple_type::{EntityKey, Row, Value};
use tokio::sync::Notify;
use tracing::{error, warn};

use crate::change::Change;
use crate::config::{CollectionSettings, SyncMode};
use crate::error::{Error, Result};
use crate::indexing::FieldIndexes;
use crate::state::{LayeredState, OptimisticMutation};
use crate::subscription::{ChangeCallback, RowFilter, Subscription, SubscriptionStatus};
use crate::sync::{OnSyncWhilePersisting, SyncFn, SyncWhilePersistingInfo, SyncWrite};

pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
pub type GetKeyFn = Arc<dyn Fn(&Row) -> EntityKey + Send + Sync>;

/// An ordering expression for [`Collection::request_limited_snapshot`] —
/// structurally identical to `ripple_registry::RowEvaluator`, redeclared
/// here so this crate doesn't need a dependency on the expression
/// compiler just to describe "sort by this".
pub type OrderBy = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// What a [`SyncMoreFn`] is handed for one on-demand load request (spec
/// §4.1's `syncMore({where?, limit?, orderBy?})`).
#[derive(Clone)]
pub struct SyncMoreRequest {
    pub filter: Option<RowFilter>,
    pub limit: Option<usize>,
    pub order_by: Option<OrderBy>,
    pub collation: Collation,
}

/// The on-demand counterpart to [`SyncFn`]: pulls additional rows matching
/// `request` into the collection via the handed-back [`SyncControls`],
/// rather than loading every key up front.
pub type SyncMoreFn = Arc<dyn Fn(SyncMoreRequest, SyncControls) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateInsertPolicy {
    Fatal,
    CoerceToUpdate,
}

#[derive(Clone)]
enum CollectionStatus {
    Idle,
    Ready,
    CleanedUp,
    Errored(Arc<Error>),
}

struct PendingBatch {
    writes: Vec<SyncWrite>,
    truncate: bool,
}

/// Builder validating the collaborators spec §4.1 requires eagerly at
/// construction: `getKey` and `sync.sync` are mandatory, everything else
/// has a documented default.
pub struct CollectionBuilder {
    id: Option<String>,
    get_key: Option<GetKeyFn>,
    sync: Option<SyncFn>,
    on_sync_while_persisting: Option<OnSyncWhilePersisting>,
    settings: CollectionSettings,
    persist: Option<PersistFn>,
    await_sync: Option<AwaitSyncFn>,
    sync_more: Option<SyncMoreFn>,
    strategy: Option<Arc<dyn Strategy>>,
    manager: Option<Arc<TransactionManager>>,
    duplicate_insert_policy: DuplicateInsertPolicy,
}

impl CollectionBuilder {
    pub fn new() -> Self {
        CollectionBuilder {
            id: None,
            get_key: None,
            sync: None,
            on_sync_while_persisting: None,
            settings: CollectionSettings::default(),
            persist: None,
            await_sync: None,
            sync_more: None,
            strategy: None,
            manager: None,
            duplicate_insert_policy: DuplicateInsertPolicy::Fatal,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn get_key(mut self, get_key: GetKeyFn) -> Self {
        self.get_key = Some(get_key);
        self
    }

    pub fn sync(mut self, sync: SyncFn) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn on_sync_while_persisting(mut self, f: OnSyncWhilePersisting) -> Self {
        self.on_sync_while_persisting = Some(f);
        self
    }

    pub fn settings(mut self, settings: CollectionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn persist(mut self, persist: PersistFn) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn await_sync(mut self, await_sync: AwaitSyncFn) -> Self {
        self.await_sync = Some(await_sync);
        self
    }

    /// Configures the `syncMore` driver an on-demand-mode (§4.1's
    /// `syncMode = on-demand`) collection calls to pull additional rows.
    /// Unused by an eager-mode collection, whose full key set is already
    /// resident.
    pub fn sync_more(mut self, sync_more: SyncMoreFn) -> Self {
        self.sync_more = Some(sync_more);
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn transaction_manager(mut self, manager: Arc<TransactionManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Converts duplicate-synced-insert-for-an-existing-key from fatal to a
    /// silent update — the live-query collection flavor (spec §4.12) sets
    /// this.
    pub fn duplicate_insert_policy(mut self, policy: DuplicateInsertPolicy) -> Self {
        self.duplicate_insert_policy = policy;
        self
    }

    pub fn build(self) -> Result<Collection> {
        let get_key = self.get_key.ok_or(Error::CollectionRequiresGetKey)?;
        let sync = self.sync.ok_or(Error::CollectionRequiresSyncConfig)?;

        let field_indexes = FieldIndexes::new(self.settings.auto_index);
        let inner = Arc::new(CollectionInner {
            id: self.id.unwrap_or_default(),
            get_key,
            sync,
            on_sync_while_persisting: self.on_sync_while_persisting,
            settings: self.settings,
            persist: self.persist.unwrap_or_else(|| Arc::new(|_tx| Box::pin(async { Ok(()) }))),
            await_sync: self.await_sync,
            sync_more: self.sync_more,
            strategy: self.strategy,
            manager: self.manager.unwrap_or_else(|| Arc::new(TransactionManager::new())),
            duplicate_insert_policy: self.duplicate_insert_policy,
            field_indexes,
            state: Mutex::new(LayeredState::new()),
            subscriptions: Mutex::new(Vec::new()),
            pending_batch: Mutex::new(None),
            deferred: Mutex::new(VecDeque::new()),
            active_transactions: Mutex::new(HashMap::new()),
            status: Mutex::new(CollectionStatus::Idle),
            ready_notify: Notify::new(),
            active_subscribers: AtomicI64::new(0),
            sync_started: AtomicBool::new(false),
        });

        Ok(Collection { inner })
    }
}

impl Default for CollectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct CollectionInner {
    id: String,
    get_key: GetKeyFn,
    sync: SyncFn,
    on_sync_while_persisting: Option<OnSyncWhilePersisting>,
    settings: CollectionSettings,
    persist: PersistFn,
    await_sync: Option<AwaitSyncFn>,
    sync_more: Option<SyncMoreFn>,
    strategy: Option<Arc<dyn Strategy>>,
    manager: Arc<TransactionManager>,
    duplicate_insert_policy: DuplicateInsertPolicy,
    field_indexes: FieldIndexes,
    state: Mutex<LayeredState>,
    subscriptions: Mutex<Vec<Arc<Subscription>>>,
    pending_batch: Mutex<Option<PendingBatch>>,
    deferred: Mutex<VecDeque<PendingBatch>>,
    active_transactions: Mutex<HashMap<ripple_txn::TransactionId, Transaction>>,
    status: Mutex<CollectionStatus>,
    ready_notify: Notify,
    active_subscribers: AtomicI64,
    sync_started: AtomicBool,
}

impl CollectionInner {
    fn dispatch(&self, changes: &[Change]) {
        if changes.is_empty() {
            return;
        }
        for subscription in self.subscriptions.lock().iter() {
            subscription.emit(changes);
        }
    }

    fn mark_ready(&self) {
        *self.status.lock() = CollectionStatus::Ready;
        self.ready_notify.notify_waiters();
    }

    fn apply_batch(&self, batch: PendingBatch) -> Result<()> {
        {
            let state = self.state.lock();
            if !batch.truncate {
                for write in &batch.writes {
                    if write.kind != crate::change::ChangeType::Insert {
                        continue;
                    }
                    let Some(existing) = state.synced_get(&write.key) else { continue };
                    if write.value.as_ref() == Some(existing) {
                        continue;
                    }
                    if self.duplicate_insert_policy == DuplicateInsertPolicy::Fatal {
                        return Err(Error::DuplicateKeySync(write.key.clone()));
                    }
                }
            }
        }

        let mut state = self.state.lock();
        let writes = batch.writes.into_iter().map(|w| (w.key, w.value)).collect();
        state.apply_sync_commit(writes, batch.truncate);
        let changes = state.recompute();
        drop(state);
        self.field_indexes.apply_changes(&changes);
        self.dispatch(&changes);
        Ok(())
    }

    fn commit_batch(&self) {
        let batch = self.pending_batch.lock().take();
        let Some(batch) = batch else { return };

        let persisting: Vec<Transaction> = self.active_transactions.lock().values().cloned().collect();
        let should_defer = if persisting.is_empty() {
            false
        } else {
            let info = SyncWhilePersistingInfo {
                pending_sync_keys: batch.writes.iter().map(|w| w.key.clone()).collect(),
                persisting_keys: persisting.iter().flat_map(|tx| tx.keys()).map(|(_, k)| k).collect(),
                conflicting_keys: Vec::new(),
                persisting_transaction_count: persisting.len(),
                is_truncate: batch.truncate,
            };
            !self.on_sync_while_persisting.as_ref().is_some_and(|f| f(&info))
        };

        if should_defer {
            self.deferred.lock().push_back(batch);
            return;
        }

        if let Err(err) = self.apply_batch(batch) {
            error!(collection = %self.id, error = %err, "sync batch discarded");
            *self.status.lock() = CollectionStatus::Errored(Arc::new(err));
        }
    }

    fn drain_deferred_if_idle(&self) {
        if !self.active_transactions.lock().is_empty() {
            return;
        }
        loop {
            let next = self.deferred.lock().pop_front();
            let Some(batch) = next else { break };
            if let Err(err) = self.apply_batch(batch) {
                error!(collection = %self.id, error = %err, "deferred sync batch discarded");
                *self.status.lock() = CollectionStatus::Errored(Arc::new(err));
                break;
            }
        }
    }
}

/// Registers a freshly created transaction's mutations on the optimistic
/// overlay and spawns the task that folds it back out once settled. A free
/// function (rather than a method) because it needs to clone the `Arc` to
/// hand an owned copy to `tokio::spawn` — `&Arc<Self>` isn't a stable
/// receiver type.
fn track_settlement(inner: &Arc<CollectionInner>, tx: Transaction) {
    let mut mutations = IndexMap::new();
    for mutation in tx.mutations() {
        let value = match &mutation {
            TxnMutation::Insert { value, .. } | TxnMutation::Update { value, .. } => Some(value.clone()),
            TxnMutation::Delete { .. } => None,
        };
        mutations.insert(mutation.key().clone(), OptimisticMutation { value });
    }

    {
        let mut state = inner.state.lock();
        state.push_optimistic(tx.id, mutations);
        let changes = state.recompute();
        drop(state);
        inner.field_indexes.apply_changes(&changes);
        inner.dispatch(&changes);
    }
    inner.active_transactions.lock().insert(tx.id, tx.clone());

    let inner = inner.clone();
    tokio::spawn(async move {
        let _ = tx.is_persisted().await;
        inner.active_transactions.lock().remove(&tx.id);
        {
            let mut state = inner.state.lock();
            state.settle_optimistic(tx.id);
            let changes = state.recompute();
            drop(state);
            inner.field_indexes.apply_changes(&changes);
            inner.dispatch(&changes);
        }
        inner.drain_deferred_if_idle();
    });
}

fn restart_gc_timer(inner: &Arc<CollectionInner>) {
    let gc_time = inner.settings.gc_time;
    let inner = inner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(gc_time).await;
        if inner.active_subscribers.load(Ordering::SeqCst) <= 0 && inner.active_transactions.lock().is_empty() {
            *inner.status.lock() = CollectionStatus::CleanedUp;
            inner.subscriptions.lock().clear();
        }
    });
}

/// A keyed entity store with layered optimistic state (spec §4.1). Cheaply
/// cloneable: every clone shares the same underlying state and
/// subscriptions.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

/// The handle a [`SyncFn`] drives to feed data into its collection.
#[derive(Clone)]
pub struct SyncControls {
    inner: Arc<CollectionInner>,
}

impl SyncControls {
    pub fn begin(&self) {
        *self.inner.pending_batch.lock() = Some(PendingBatch { writes: Vec::new(), truncate: false });
    }

    pub fn write(&self, write: SyncWrite) {
        if let Some(batch) = self.inner.pending_batch.lock().as_mut() {
            batch.writes.push(write);
        } else {
            warn!(collection = %self.inner.id, "write() called outside a begin()/commit() batch");
        }
    }

    pub fn truncate(&self) {
        if let Some(batch) = self.inner.pending_batch.lock().as_mut() {
            batch.truncate = true;
        }
    }

    pub fn commit(&self) {
        self.inner.commit_batch();
    }

    pub fn mark_ready(&self) {
        self.inner.mark_ready();
    }
}

impl Collection {
    pub fn builder() -> CollectionBuilder {
        CollectionBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn get(&self, key: &EntityKey) -> Option<Row> {
        self.inner.state.lock().visible_get(key).cloned()
    }

    pub fn has(&self, key: &EntityKey) -> bool {
        self.inner.state.lock().visible_get(key).is_some()
    }

    pub fn size(&self) -> usize {
        self.inner.state.lock().visible().len()
    }

    pub fn values(&self) -> Vec<Row> {
        self.inner.state.lock().visible().values().cloned().collect()
    }

    pub fn to_array(&self) -> Vec<(EntityKey, Row)> {
        self.inner.state.lock().visible().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn insert(&self, value: Row) -> BoxFuture<'static, Transaction> {
        let key = (self.inner.get_key)(&value);
        self.mutate(vec![TxnMutation::Insert { collection: self.inner.id.clone(), key, value }], ExecuteOptions::default())
    }

    pub fn update(&self, key: EntityKey, mutator: impl FnOnce(&Row) -> Row) -> BoxFuture<'static, Transaction> {
        let current = self.get(&key).unwrap_or_default();
        let value = mutator(&current);
        self.mutate(vec![TxnMutation::Update { collection: self.inner.id.clone(), key, value }], ExecuteOptions::default())
    }

    pub fn delete(&self, key: EntityKey) -> BoxFuture<'static, Transaction> {
        self.mutate(vec![TxnMutation::Delete { collection: self.inner.id.clone(), key }], ExecuteOptions::default())
    }

    fn mutate(&self, mutations: Vec<TxnMutation>, options: ExecuteOptions) -> BoxFuture<'static, Transaction> {
        let inner = self.inner.clone();
        let mutate_fn: MutationFn = Arc::new(move || {
            txn_apply_transaction(
                &inner.manager,
                mutations.clone(),
                TransactionStrategy::Ordered,
                inner.persist.clone(),
                inner.await_sync.clone(),
            )
        });

        match self.inner.strategy.clone() {
            Some(strategy) => {
                let inner = self.inner.clone();
                Box::pin(async move {
                    let tx = strategy.execute(mutate_fn, options).await;
                    track_settlement(&inner, tx.clone());
                    tx
                })
            }
            None => {
                let tx = mutate_fn();
                track_settlement(&self.inner, tx.clone());
                Box::pin(async move { tx })
            }
        }
    }

    pub fn subscribe_changes(&self, callback: ChangeCallback, filter: Option<RowFilter>, include_initial_state: bool) -> Arc<Subscription> {
        let subscription = Subscription::new(filter, callback);
        self.inner.subscriptions.lock().push(subscription.clone());
        self.inner.active_subscribers.fetch_add(1, Ordering::SeqCst);

        if include_initial_state {
            let rows = self.to_array();
            subscription.emit_snapshot(&rows);
        }

        subscription
    }

    /// Declares interest in an equality index over `field` (spec §4.1's
    /// auto-indexing), backfilling it from the current visible state. A
    /// no-op when `autoIndex = off`.
    pub fn index_field(&self, field: &str) {
        self.inner.field_indexes.ensure_field(field, self.to_array().into_iter());
    }

    /// Looks up rows by an indexed field's value, using the index built by
    /// [`Collection::index_field`] when present, otherwise falling back to
    /// a full scan.
    pub fn lookup_by_field(&self, field: &str, value: &Value) -> Vec<(EntityKey, Row)> {
        match self.inner.field_indexes.lookup(field, value) {
            Some(keys) => keys.into_iter().filter_map(|key| self.get(&key).map(|row| (key, row))).collect(),
            None => self.to_array().into_iter().filter(|(_, row)| row.get(field) == value).collect(),
        }
    }

    /// Requests the sync layer load more matching data on demand (spec
    /// §4.1's `syncMore`). A no-op when no [`SyncMoreFn`] is configured —
    /// an eager-mode collection already has its full key set resident.
    pub fn sync_more(&self, request: SyncMoreRequest) -> BoxFuture<'static, ()> {
        match self.inner.sync_more.clone() {
            Some(sync_more) => sync_more(request, self.sync_controls()),
            None => Box::pin(async {}),
        }
    }

    /// Streams the next `limit` rows beyond `min_value` (exclusive) under
    /// `order_by`, subject to `subscription`'s filter and already-sent keys
    /// (spec §4.2's `requestLimitedSnapshot`). Flips `subscription` to
    /// `loadingMore` while an on-demand collection's sync layer fetches any
    /// rows not yet resident, then emits the page as a snapshot.
    pub async fn request_limited_snapshot(
        &self,
        subscription: &Arc<Subscription>,
        order_by: OrderBy,
        collation: Collation,
        limit: usize,
        min_value: Option<Value>,
    ) {
        subscription.set_status(SubscriptionStatus::LoadingMore);

        if self.inner.settings.sync_mode == SyncMode::OnDemand {
            self.sync_more(SyncMoreRequest {
                filter: subscription.filter(),
                limit: Some(limit),
                order_by: Some(order_by.clone()),
                collation: collation.clone(),
            })
            .await;
        }

        let mut index = RangeIndex::new(order_by, collation);
        for (key, row) in self.to_array() {
            index.insert(key, &row);
        }

        let sent = subscription.sent_keys_snapshot();
        let page_keys = index.take(limit, min_value.as_ref(), |key| !sent.contains(key));
        let rows: Vec<(EntityKey, Row)> =
            page_keys.into_iter().filter_map(|key| self.get(&key).map(|row| (key, row))).collect();
        subscription.emit_snapshot(&rows);

        subscription.set_status(SubscriptionStatus::Ready);
    }

    pub fn unsubscribe(&self, subscription: &Arc<Subscription>) -> Result<()> {
        self.inner.subscriptions.lock().retain(|s| s.id != subscription.id);
        let previous = self.inner.active_subscribers.fetch_sub(1, Ordering::SeqCst);
        if previous <= 0 {
            return Err(Error::NegativeActiveSubscribers);
        }
        if previous == 1 {
            restart_gc_timer(&self.inner);
        }
        Ok(())
    }

    /// The current visible state expressed as the insert changes that would
    /// reconstruct it from empty (spec §6's `currentStateAsChanges`).
    pub fn current_state_as_changes(&self) -> Vec<Change> {
        self.to_array().into_iter().map(|(key, value)| Change::insert(key, value)).collect()
    }

    pub fn sync_controls(&self) -> SyncControls {
        SyncControls { inner: self.inner.clone() }
    }

    /// Invokes the sync driver if it hasn't run yet. Idempotent — safe to
    /// call from both `preload()` and a collection flavor (e.g. a live
    /// query) that needs its `SyncControls` handle before anyone subscribes.
    pub fn ensure_sync_started(&self) {
        if self.inner.sync_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let controls = self.sync_controls();
        (self.inner.sync)(controls);
    }

    pub async fn state_when_ready(&self) {
        loop {
            if matches!(&*self.inner.status.lock(), CollectionStatus::Ready) {
                return;
            }
            self.inner.ready_notify.notified().await;
        }
    }

    pub async fn preload(&self) {
        if self.inner.settings.start_sync {
            self.ensure_sync_started();
        }
        self.state_when_ready().await;
    }

    pub fn cleanup(&self) {
        self.inner.subscriptions.lock().clear();
        self.inner.active_subscribers.store(0, Ordering::SeqCst);
    }

    pub fn is_errored(&self) -> Option<Arc<Error>> {
        match &*self.inner.status.lock() {
            CollectionStatus::Errored(err) => Some(err.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_key() -> GetKeyFn {
        Arc::new(|row: &Row| EntityKey::from_value(row.get("id")).expect("rows under test always carry an id"))
    }

    fn noop_sync() -> SyncFn {
        Arc::new(|_controls| {})
    }

    fn row(id: i64, name: &str) -> Row {
        let mut row = Row::new();
        row.set("id", Value::Int(id));
        row.set("name", Value::from(name));
        row
    }

    #[tokio::test]
    async fn insert_is_visible_immediately_as_an_optimistic_overlay() {
        let collection =
            Collection::builder().id("users").get_key(get_key()).sync(noop_sync()).build().unwrap();

        collection.insert(row(1, "alice")).await;
        assert_eq!(collection.size(), 1);
        assert!(collection.has(&EntityKey::from(1i64)));
    }

    #[tokio::test]
    async fn sync_batch_surfaces_as_insert_to_a_subscriber() {
        let collection =
            Collection::builder().id("users").get_key(get_key()).sync(noop_sync()).build().unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_for_cb = received.clone();
        collection.subscribe_changes(Arc::new(move |changes: &[Change]| received_for_cb.lock().extend_from_slice(changes)), None, false);

        let controls = collection.sync_controls();
        controls.begin();
        controls.write(SyncWrite::insert(EntityKey::from(1i64), row(1, "alice")));
        controls.commit();
        controls.mark_ready();

        assert_eq!(received.lock().len(), 1);
        assert_eq!(received.lock()[0].kind, crate::change::ChangeType::Insert);
    }

    #[tokio::test]
    async fn duplicate_synced_insert_for_existing_key_is_fatal_by_default() {
        let collection =
            Collection::builder().id("users").get_key(get_key()).sync(noop_sync()).build().unwrap();

        let controls = collection.sync_controls();
        controls.begin();
        controls.write(SyncWrite::insert(EntityKey::from(1i64), row(1, "alice")));
        controls.commit();

        controls.begin();
        controls.write(SyncWrite::insert(EntityKey::from(1i64), row(1, "bob")));
        controls.commit();

        assert!(collection.is_errored().is_some());
    }

    #[tokio::test]
    async fn snapshot_subscriber_only_sees_rows_that_pass_its_filter() {
        let collection =
            Collection::builder().id("users").get_key(get_key()).sync(noop_sync()).build().unwrap();

        collection.insert(row(1, "alice")).await;
        collection.insert(row(2, "bob")).await;

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_for_cb = received.clone();
        let filter: RowFilter = Arc::new(|row: &Row| row.get("name") == &Value::from("alice"));
        collection.subscribe_changes(Arc::new(move |changes: &[Change]| received_for_cb.lock().extend_from_slice(changes)), Some(filter), true);

        assert_eq!(received.lock().len(), 1);
        assert_eq!(received.lock()[0].key, EntityKey::from(1i64));
    }

    #[tokio::test]
    async fn lookup_by_field_uses_the_index_once_declared() {
        let collection = Collection::builder()
            .id("users")
            .get_key(get_key())
            .sync(noop_sync())
            .settings(CollectionSettings { auto_index: crate::config::AutoIndex::Eager, ..Default::default() })
            .build()
            .unwrap();

        collection.insert(row(1, "alice")).await;
        collection.insert(row(2, "bob")).await;
        collection.index_field("name");

        collection.insert(row(3, "carol")).await;

        let matches = collection.lookup_by_field("name", &Value::from("carol"));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, EntityKey::from(3i64));
    }

    #[tokio::test]
    async fn request_limited_snapshot_pages_by_order_and_skips_already_sent_keys() {
        let collection =
            Collection::builder().id("users").get_key(get_key()).sync(noop_sync()).build().unwrap();

        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol"), (4, "dave")] {
            collection.insert(row(id, name)).await;
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_for_cb = received.clone();
        let subscription = collection.subscribe_changes(
            Arc::new(move |changes: &[Change]| received_for_cb.lock().extend_from_slice(changes)),
            None,
            false,
        );

        let order_by: OrderBy = Arc::new(|row: &Row| row.get("id").clone());
        collection
            .request_limited_snapshot(&subscription, order_by.clone(), Collation::natural(), 2, None)
            .await;
        assert_eq!(subscription.status(), SubscriptionStatus::Ready);
        assert_eq!(received.lock().len(), 2);
        assert_eq!(received.lock()[0].key, EntityKey::from(1i64));
        assert_eq!(received.lock()[1].key, EntityKey::from(2i64));

        collection
            .request_limited_snapshot(&subscription, order_by, Collation::natural(), 2, Some(Value::Int(2)))
            .await;
        assert_eq!(received.lock().len(), 4, "second page picks up after the first, not re-sending it");
        assert_eq!(received.lock()[2].key, EntityKey::from(3i64));
        assert_eq!(received.lock()[3].key, EntityKey::from(4i64));
    }
}
