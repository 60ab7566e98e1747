// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ripple_txn::Transaction;

use crate::strategy::{BoxFuture, ExecuteOptions, MutationFn, Strategy};

struct Inner {
    wait: Option<Duration>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Keyed parallelism (spec §4.4): mutations whose `keys` are disjoint run
/// concurrently; any overlap serializes the later call behind whichever
/// in-flight call currently holds that key. With no keys given, every call
/// is disjoint from every other and runs immediately.
pub struct DependencyQueue(Arc<Inner>);

impl DependencyQueue {
    pub fn new(wait: Option<Duration>) -> Self {
        DependencyQueue(Arc::new(Inner { wait, locks: Mutex::new(HashMap::new()) }))
    }
}

impl Strategy for DependencyQueue {
    fn execute(&self, mutate: MutationFn, options: ExecuteOptions) -> BoxFuture<'static, Transaction> {
        let inner = self.0.clone();
        let mut keys = options.keys;
        keys.sort();
        keys.dedup();

        Box::pin(async move {
            let per_key_locks: Vec<Arc<tokio::sync::Mutex<()>>> = {
                let mut locks = inner.locks.lock();
                keys.iter().map(|key| locks.entry(key.clone()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()).collect()
            };

            // Keys are pre-sorted, so every caller acquires shared keys in
            // the same order and concurrent overlapping calls can't deadlock.
            let mut guards = Vec::with_capacity(per_key_locks.len());
            for lock in per_key_locks {
                guards.push(lock.lock_owned().await);
            }

            let tx = mutate();
            if let Some(wait) = inner.wait {
                tokio::time::sleep(wait).await;
            }
            drop(guards);
            tx
        })
    }

    fn cleanup(&self) {
        self.0.locks.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn timed_mutate(started_at: Arc<Mutex<Vec<(String, Instant)>>>, label: &str) -> MutationFn {
        let label = label.to_string();
        Arc::new(move || {
            started_at.lock().push((label.clone(), Instant::now()));
            std::thread::sleep(Duration::from_millis(1));
            Transaction::new(uuid::Uuid::new_v4(), ripple_txn::TransactionStrategy::Parallel, vec![])
        })
    }

    #[tokio::test]
    async fn disjoint_keys_run_without_waiting_on_each_other() {
        let dq = DependencyQueue::new(Some(Duration::from_millis(30)));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let a = dq.execute(
            timed_mutate(starts.clone(), "a"),
            ExecuteOptions { depends_on: vec![], keys: vec!["row-1".into()] },
        );
        let b = dq.execute(
            timed_mutate(starts.clone(), "b"),
            ExecuteOptions { depends_on: vec![], keys: vec!["row-2".into()] },
        );

        let started = Instant::now();
        tokio::join!(a, b);
        // both held their own 30ms wait but ran concurrently, not serially.
        assert!(started.elapsed() < Duration::from_millis(55));
        assert_eq!(starts.lock().len(), 2);
    }

    #[tokio::test]
    async fn overlapping_keys_serialize() {
        let dq = DependencyQueue::new(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let make = |n: usize| {
            let calls = calls.clone();
            let order = order.clone();
            let opts = ExecuteOptions { depends_on: vec![], keys: vec!["shared".into()] };
            (
                Arc::new(move || {
                    order.lock().push(n);
                    calls.fetch_add(1, Ordering::SeqCst);
                    Transaction::new(uuid::Uuid::new_v4(), ripple_txn::TransactionStrategy::Parallel, vec![])
                }) as MutationFn,
                opts,
            )
        };

        let (m1, o1) = make(1);
        let (m2, o2) = make(2);
        let a = dq.execute(m1, o1);
        let b = dq.execute(m2, o2);
        tokio::join!(a, b);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(order.lock().len(), 2);
    }
}
