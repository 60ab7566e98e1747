// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ripple_txn::Transaction;
use tokio::sync::oneshot;

use crate::strategy::{BoxFuture, ExecuteOptions, MutationFn, Strategy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueEnd {
    Front,
    Back,
}

struct QueueItem {
    mutate: MutationFn,
    depends_on: Vec<Transaction>,
    sender: oneshot::Sender<Transaction>,
}

struct State {
    items: VecDeque<QueueItem>,
    worker_running: bool,
}

struct Inner {
    wait: Option<Duration>,
    max_size: Option<usize>,
    add_items_to: QueueEnd,
    get_items_from: QueueEnd,
    state: Mutex<State>,
}

/// Serial FIFO/LIFO queue over mutations, each optionally waiting on other
/// transactions' persistence before it runs (spec §4.4's `dependsOn`).
/// `max_size` bounds queue depth; once full, the oldest queued item (the one
/// furthest from `add_items_to`) is dropped to make room for the new one.
pub struct Queue(Arc<Inner>);

impl Queue {
    pub fn new(wait: Option<Duration>, max_size: Option<usize>, add_items_to: QueueEnd, get_items_from: QueueEnd) -> Self {
        Queue(Arc::new(Inner {
            wait,
            max_size,
            add_items_to,
            get_items_from,
            state: Mutex::new(State { items: VecDeque::new(), worker_running: false }),
        }))
    }
}

impl Strategy for Queue {
    fn execute(&self, mutate: MutationFn, options: ExecuteOptions) -> BoxFuture<'static, Transaction> {
        let inner = self.0.clone();
        let (sender, receiver) = oneshot::channel();
        let item = QueueItem { mutate, depends_on: options.depends_on, sender };

        let mut should_spawn_worker = false;
        {
            let mut state = inner.state.lock();
            match inner.add_items_to {
                QueueEnd::Back => state.items.push_back(item),
                QueueEnd::Front => state.items.push_front(item),
            }
            if let Some(max_size) = inner.max_size {
                while state.items.len() > max_size {
                    match inner.get_items_from {
                        // Drop the item furthest from where new ones enter.
                        QueueEnd::Back => state.items.pop_front(),
                        QueueEnd::Front => state.items.pop_back(),
                    };
                }
            }
            if !state.worker_running {
                state.worker_running = true;
                should_spawn_worker = true;
            }
        }

        if should_spawn_worker {
            spawn_worker(inner);
        }

        Box::pin(async move { receiver.await.expect("queue worker always resolves or is dropped with the item") })
    }

    fn cleanup(&self) {
        self.0.state.lock().items.clear();
    }
}

fn spawn_worker(inner: Arc<Inner>) {
    tokio::spawn(async move {
        loop {
            let item = {
                let mut state = inner.state.lock();
                let popped = match inner.get_items_from {
                    QueueEnd::Front => state.items.pop_front(),
                    QueueEnd::Back => state.items.pop_back(),
                };
                if popped.is_none() {
                    state.worker_running = false;
                }
                popped
            };

            let Some(item) = item else { break };

            for dependency in &item.depends_on {
                // A dependency failing never aborts this queue; it just
                // means this item runs against whatever state resulted.
                let _ = dependency.is_persisted().await;
            }

            let tx = (item.mutate)();
            let _ = item.sender.send(tx.clone());
            // strict serialization (spec §4.4): the next item must not start
            // until this one's transaction has actually persisted.
            let _ = tx.is_persisted().await;

            if let Some(wait) = inner.wait {
                tokio::time::sleep(wait).await;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resolves `is_persisted` immediately once run, so the queue worker's
    /// own serialization await doesn't stall these tests forever.
    fn recording_mutate(order: Arc<Mutex<Vec<usize>>>, id: usize) -> MutationFn {
        Arc::new(move || {
            order.lock().push(id);
            let tx = Transaction::new(uuid::Uuid::new_v4(), ripple_txn::TransactionStrategy::Parallel, vec![]);
            tx.resolve_persisted(Ok(()));
            tx
        })
    }

    #[tokio::test]
    async fn fifo_queue_runs_items_in_arrival_order() {
        let queue = Queue::new(None, None, QueueEnd::Back, QueueEnd::Front);
        let order = Arc::new(Mutex::new(Vec::new()));

        let a = queue.execute(recording_mutate(order.clone(), 1), ExecuteOptions::default());
        let b = queue.execute(recording_mutate(order.clone(), 2), ExecuteOptions::default());
        tokio::join!(a, b);

        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn queue_does_not_dequeue_next_item_before_current_one_persists() {
        let queue = Queue::new(None, None, QueueEnd::Back, QueueEnd::Front);
        let order = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(tokio::sync::Notify::new());

        let gated_mutate: MutationFn = {
            let order = order.clone();
            let gate = gate.clone();
            Arc::new(move || {
                order.lock().push(1);
                let tx = Transaction::new(uuid::Uuid::new_v4(), ripple_txn::TransactionStrategy::Parallel, vec![]);
                let tx_for_resolve = tx.clone();
                let gate = gate.clone();
                tokio::spawn(async move {
                    gate.notified().await;
                    tx_for_resolve.resolve_persisted(Ok(()));
                });
                tx
            })
        };

        let a = queue.execute(gated_mutate, ExecuteOptions::default());
        let b = queue.execute(recording_mutate(order.clone(), 2), ExecuteOptions::default());

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(*order.lock(), vec![1], "second item must still be waiting on the first's persistence");

        gate.notify_one();
        tokio::join!(a, b);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn item_waits_for_its_dependency_to_persist_first() {
        let queue = Queue::new(None, None, QueueEnd::Back, QueueEnd::Front);
        let order = Arc::new(Mutex::new(Vec::new()));

        let dependency = Transaction::new(uuid::Uuid::new_v4(), ripple_txn::TransactionStrategy::Parallel, vec![]);
        let dependency_for_resolve = dependency.clone();
        let order_for_dep = order.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            order_for_dep.lock().push(0);
            dependency_for_resolve.resolve_persisted(Ok(()));
        });

        let options = ExecuteOptions { depends_on: vec![dependency], keys: vec![] };
        queue.execute(recording_mutate(order.clone(), 1), options).await;

        assert_eq!(*order.lock(), vec![0, 1], "the dependent item must not run before its dependency persists");
    }
}
