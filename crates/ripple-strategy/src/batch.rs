// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ripple_txn::Transaction;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::strategy::{BoxFuture, ExecuteOptions, MutationFn, Strategy};

struct PendingItem {
    mutate: MutationFn,
    sender: oneshot::Sender<Transaction>,
}

struct State {
    items: Vec<PendingItem>,
    deadline: Option<Instant>,
    generation: u64,
}

type ShouldExecute = Arc<dyn Fn(usize) -> bool + Send + Sync>;

struct Inner {
    max_size: Option<usize>,
    wait: Option<Duration>,
    should_execute: Option<ShouldExecute>,
    state: Mutex<State>,
}

/// Buffers calls and runs them together once a batch boundary is reached —
/// `max_size` items accumulated, `wait` elapsed since the first item in the
/// batch, or `should_execute` says to flush now (spec §4.4). Each buffered
/// mutation still runs (and resolves) independently; batching controls only
/// *when* they fire together, not merging them into one transaction.
pub struct Batch(Arc<Inner>);

impl Batch {
    pub fn new(max_size: Option<usize>, wait: Option<Duration>, should_execute: Option<ShouldExecute>) -> Self {
        Batch(Arc::new(Inner {
            max_size,
            wait,
            should_execute,
            state: Mutex::new(State { items: Vec::new(), deadline: None, generation: 0 }),
        }))
    }
}

impl Strategy for Batch {
    fn execute(&self, mutate: MutationFn, _options: ExecuteOptions) -> BoxFuture<'static, Transaction> {
        let inner = self.0.clone();
        let (sender, receiver) = oneshot::channel();

        let mut flush_now = false;
        {
            let mut state = inner.state.lock();
            state.items.push(PendingItem { mutate, sender });

            if state.items.len() == 1 {
                let deadline = inner.wait.map(|w| Instant::now() + w);
                state.deadline = deadline;
                state.generation += 1;
                if let Some(deadline) = deadline {
                    spawn_deadline_flush(inner.clone(), deadline, state.generation);
                }
            }

            let count = state.items.len();
            if inner.max_size.is_some_and(|max| count >= max) {
                flush_now = true;
            } else if let Some(should_execute) = &inner.should_execute {
                if should_execute(count) {
                    flush_now = true;
                }
            }
        }

        if flush_now {
            flush(&inner);
        }

        Box::pin(async move { receiver.await.expect("batch always flushes its pending items") })
    }

    fn cleanup(&self) {
        self.0.state.lock().items.clear();
    }
}

fn spawn_deadline_flush(inner: Arc<Inner>, deadline: Instant, generation: u64) {
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        let still_current = inner.state.lock().generation == generation;
        if still_current {
            flush(&inner);
        }
    });
}

fn flush(inner: &Arc<Inner>) {
    let items = {
        let mut state = inner.state.lock();
        state.deadline = None;
        std::mem::take(&mut state.items)
    };
    for item in items {
        let tx = (item.mutate)();
        let _ = item.sender.send(tx);
    }
}
