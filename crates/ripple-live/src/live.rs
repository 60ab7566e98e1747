// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ripple_collection::{Change, ChangeType, Collection, DuplicateInsertPolicy, GetKeyFn, Subscription, SyncControls, SyncFn, SyncWrite};
use ripple_dataflow::{consolidate, Batch, Diff, OnDemandLookup};
use ripple_ir::Query;
use ripple_query::CompiledPipeline;
use ripple_registry::{AggregateRegistry, OperatorRegistry};
use ripple_type::Value;

use crate::error::{Error, Result};

/// A collection whose sync driver is a compiled query pipeline (spec §4.12):
/// it mirrors every change its sources emit into its own synced state
/// through the pipeline, rather than through an externally-driven sync
/// function.
pub struct LiveQuery {
    collection: Collection,
    loading_subset: Arc<AtomicBool>,
    subscriptions: Vec<(Collection, Arc<Subscription>)>,
}

impl LiveQuery {
    /// `sources` maps each alias the query references to the collection it
    /// reads from. Every source is subscribed immediately and its
    /// subsequent changes keep flowing through for as long as the live
    /// query lives. A source driving a join eagerly also feeds its current
    /// rows through as an initial insert batch; a join's lazy side (spec
    /// §4.11) instead only resolves rows the driving side's batch actually
    /// asks for, through an on-demand lookup.
    pub fn new(
        query: &Query,
        operators: Arc<OperatorRegistry>,
        aggregates: Arc<AggregateRegistry>,
        sources: Vec<(String, Collection)>,
        get_key: GetKeyFn,
    ) -> Result<Self> {
        let pipeline = Arc::new(Mutex::new(CompiledPipeline::compile(query, operators, aggregates)?));
        let loading_subset = Arc::new(AtomicBool::new(true));

        let controls_slot: Arc<Mutex<Option<SyncControls>>> = Arc::new(Mutex::new(None));
        let slot_for_sync = controls_slot.clone();
        let sync: SyncFn = Arc::new(move |controls: SyncControls| {
            *slot_for_sync.lock() = Some(controls);
        });

        let collection = Collection::builder()
            .get_key(get_key)
            .sync(sync)
            // aggregate recomputation arrives as retract+insert of the same
            // key; tolerate it as an update instead of the fatal duplicate a
            // regular collection would raise (spec §4.12).
            .duplicate_insert_policy(DuplicateInsertPolicy::CoerceToUpdate)
            .build()?;

        collection.ensure_sync_started();
        let controls = controls_slot.lock().clone().expect("sync driver always registers controls synchronously");

        // a join's lazy side doesn't need its whole current state fed
        // through the pipeline up front (spec §4.11): its lookup must be
        // wired before any driving source's initial batch is fed, so every
        // left row the driving side produces can already resolve it on
        // demand instead of falling through to an unmatched placeholder.
        let mut subscriptions = Vec::with_capacity(sources.len());
        let mut eager = Vec::with_capacity(sources.len());
        for (alias, source) in sources {
            let lazy_field = pipeline.lock().lazy_right_field(&alias).map(str::to_string);
            let callback = feed_callback(alias.clone(), pipeline.clone(), controls.clone());

            match lazy_field {
                Some(field) => {
                    let subscription = source.subscribe_changes(callback, None, false);
                    pipeline.lock().set_on_demand_right(&alias, on_demand_lookup(source.clone(), subscription.clone(), field));
                    subscriptions.push((source, subscription));
                }
                None => eager.push((source, callback)),
            }
        }
        for (source, callback) in eager {
            let subscription = source.subscribe_changes(callback, None, true);
            subscriptions.push((source, subscription));
        }

        controls.mark_ready();
        loading_subset.store(false, Ordering::SeqCst);

        Ok(LiveQuery { collection, loading_subset, subscriptions })
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// True only while the initial pass over every source's current rows is
    /// still in flight; never flips back to true for later on-demand loads
    /// (spec §4.12's stale-while-revalidate semantics for `useLiveSuspenseQuery`).
    pub fn is_loading_subset(&self) -> bool {
        self.loading_subset.load(Ordering::SeqCst)
    }

    /// Detaches from every source and tears down the derived collection.
    pub fn stop(&self) {
        for (source, subscription) in &self.subscriptions {
            let _ = source.unsubscribe(subscription);
        }
        self.collection.cleanup();
    }
}

/// Builds the closure a join's lazy right side resolves through: a lookup
/// by `field` against `source`'s current state, marking every row it
/// surfaces as already sent on `subscription` so a later update to one of
/// these rows is projected as an update rather than re-inserted.
fn on_demand_lookup(source: Collection, subscription: Arc<Subscription>, field: String) -> OnDemandLookup {
    Arc::new(move |value: &Value| {
        let rows = source.lookup_by_field(&field, value);
        for (key, _) in &rows {
            subscription.mark_sent(key);
        }
        rows
    })
}

fn feed_callback(alias: String, pipeline: Arc<Mutex<CompiledPipeline>>, controls: SyncControls) -> ripple_collection::ChangeCallback {
    Arc::new(move |changes: &[Change]| {
        let batch: Batch = changes.iter().flat_map(change_to_diffs).collect();
        if batch.is_empty() {
            return;
        }

        let fed = {
            let mut pipeline = pipeline.lock();
            pipeline.feed(&alias, batch)
        };

        match fed {
            Ok(output) => apply_output(&controls, output),
            Err(err) => tracing::error!(alias = %alias, error = %err, "live query pipeline feed failed"),
        }
    })
}

fn change_to_diffs(change: &Change) -> Vec<Diff> {
    match change.kind {
        ChangeType::Insert => vec![Diff::insert(change.key.clone(), change.value.clone())],
        ChangeType::Delete => vec![Diff::retract(change.key.clone(), change.value.clone())],
        ChangeType::Update => {
            let mut diffs = Vec::with_capacity(2);
            if let Some(previous) = &change.previous_value {
                diffs.push(Diff::retract(change.key.clone(), previous.clone()));
            }
            diffs.push(Diff::insert(change.key.clone(), change.value.clone()));
            diffs
        }
    }
}

fn apply_output(controls: &SyncControls, output: Batch) {
    let output = consolidate(output);
    if output.is_empty() {
        return;
    }

    controls.begin();
    for diff in output {
        match diff.multiplicity.cmp(&0) {
            std::cmp::Ordering::Greater => controls.write(SyncWrite::insert(diff.key, diff.value)),
            std::cmp::Ordering::Less => controls.write(SyncWrite::delete(diff.key)),
            std::cmp::Ordering::Equal => {}
        }
    }
    controls.commit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use ripple_ir::{fns, BasicExpression, JoinType, QueryBuilder, Source};
    use ripple_type::{EntityKey, Row, Value};

    fn registries() -> (Arc<OperatorRegistry>, Arc<AggregateRegistry>) {
        (Arc::new(OperatorRegistry::new()), Arc::new(AggregateRegistry::new()))
    }

    fn row(id: i64, published: bool) -> Row {
        let mut row = Row::new();
        row.set("id", Value::Int(id));
        row.set("published", Value::Bool(published));
        row
    }

    fn get_key() -> GetKeyFn {
        Arc::new(|row: &Row| EntityKey::from_value(row.get("id")).expect("test rows always carry an id"))
    }

    fn comment_row(id: i64, post_id: i64) -> Row {
        let mut row = Row::new();
        row.set("id", Value::Int(id));
        row.set("postId", Value::Int(post_id));
        row
    }

    fn noop_sync() -> SyncFn {
        Arc::new(|controls: SyncControls| controls.mark_ready())
    }

    #[tokio::test]
    async fn inner_join_resolves_a_preexisting_right_row_through_the_on_demand_lookup() {
        let posts = Collection::builder().id("posts").get_key(get_key()).sync(noop_sync()).build().unwrap();
        let comments = Collection::builder().id("comments").get_key(get_key()).sync(noop_sync()).build().unwrap();

        // both rows already exist before the live query is even constructed;
        // the right side (`c`) is never eagerly subscribed, so this match
        // can only happen through the lazy on-demand lookup.
        posts.insert(row(1, true)).await;
        comments.insert(comment_row(10, 1)).await;

        let query = QueryBuilder::from("p", Source::Collection("posts".into()))
            .join("c", Source::Collection("comments".into()), JoinType::Inner, |r| {
                fns::eq(r.alias("c").field("postId"), r.alias("p").field("id"))
            })
            .unwrap()
            .select(|r| IndexMap::from([("post".to_string(), r.alias("p").spread()), ("comment".to_string(), r.alias("c").spread())]))
            .build();

        let (operators, aggregates) = registries();
        let live = LiveQuery::new(
            &query,
            operators,
            aggregates,
            vec![("p".to_string(), posts.clone()), ("c".to_string(), comments.clone())],
            get_key(),
        )
        .unwrap();

        assert_eq!(live.collection().size(), 1, "the preexisting comment should resolve via the on-demand lookup");

        comments.insert(comment_row(11, 1)).await;
        assert_eq!(live.collection().size(), 2, "a later comment still joins through the live subscription");
    }

    #[tokio::test]
    async fn live_query_mirrors_matching_rows_from_its_source() {
        let posts = Collection::builder().id("posts").get_key(get_key()).sync(noop_sync()).build().unwrap();

        let query = QueryBuilder::from("p", Source::Collection("posts".into()))
            .where_(|r| fns::eq(r.alias("p").field("published"), BasicExpression::val(true)))
            .select(|r| IndexMap::from([("row".to_string(), r.alias("p").spread())]))
            .build();

        let (operators, aggregates) = registries();
        let live = LiveQuery::new(&query, operators, aggregates, vec![("p".to_string(), posts.clone())], get_key()).unwrap();

        posts.insert(row(1, true)).await;
        posts.insert(row(2, false)).await;

        assert_eq!(live.collection().size(), 1);
        assert!(live.collection().has(&EntityKey::from(1i64)));
        assert!(!live.is_loading_subset());
    }

    #[tokio::test]
    async fn deleting_the_source_row_removes_it_from_the_live_view() {
        let posts = Collection::builder().id("posts").get_key(get_key()).sync(noop_sync()).build().unwrap();
        let query = QueryBuilder::from("p", Source::Collection("posts".into()))
            .select(|r| IndexMap::from([("row".to_string(), r.alias("p").spread())]))
            .build();

        let (operators, aggregates) = registries();
        let live = LiveQuery::new(&query, operators, aggregates, vec![("p".to_string(), posts.clone())], get_key()).unwrap();

        posts.insert(row(1, true)).await;
        assert!(live.collection().has(&EntityKey::from(1i64)));

        posts.delete(EntityKey::from(1i64)).await;
        assert!(!live.collection().has(&EntityKey::from(1i64)));
    }
}
