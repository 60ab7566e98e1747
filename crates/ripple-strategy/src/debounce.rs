// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ripple_txn::Transaction;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::strategy::{BoxFuture, ExecuteOptions, MutationFn, Strategy};
use crate::timing::wait_for_window_result;

enum WindowState {
    Idle,
    Active { deadline: Instant, latest_mutate: MutationFn, leading_tx: Option<Transaction>, sender: watch::Sender<Option<Transaction>> },
}

struct Inner {
    wait: Duration,
    leading: bool,
    trailing: bool,
    state: Mutex<WindowState>,
}

/// Collapses a burst of calls arriving within `wait` of each other into a
/// single invocation (spec §4.4). `leading` fires on the first call of a
/// burst; `trailing` fires once the burst has been quiet for `wait`. When
/// neither edge is requested, trailing still fires — a debounce that never
/// executes its mutation isn't a useful default.
pub struct Debounce(Arc<Inner>);

impl Debounce {
    pub fn new(wait: Duration, leading: bool, trailing: bool) -> Self {
        Debounce(Arc::new(Inner { wait, leading, trailing: trailing || !leading, state: Mutex::new(WindowState::Idle) }))
    }
}

impl Strategy for Debounce {
    fn execute(&self, mutate: MutationFn, _options: ExecuteOptions) -> BoxFuture<'static, Transaction> {
        let inner = self.0.clone();
        let deadline = Instant::now() + inner.wait;
        let mut state = inner.state.lock();

        let (rx, leading_tx) = match &mut *state {
            WindowState::Idle => {
                let leading_tx = if inner.leading { Some(mutate()) } else { None };
                let (sender, rx) = watch::channel(None);
                *state = WindowState::Active { deadline, latest_mutate: mutate, leading_tx: leading_tx.clone(), sender };
                drop(state);
                spawn_window(inner.clone(), deadline);
                (rx, leading_tx)
            }
            WindowState::Active { deadline: d, latest_mutate, leading_tx, sender } => {
                *d = deadline;
                *latest_mutate = mutate;
                let rx = sender.subscribe();
                let leading_tx = leading_tx.clone();
                drop(state);
                (rx, leading_tx)
            }
        };

        let trailing = self.0.trailing;
        Box::pin(async move { wait_for_window_result(rx, leading_tx, trailing).await })
    }

    fn cleanup(&self) {
        // rolls back a not-yet-persisting leading transaction rather than
        // leaving it to land after the window it belonged to is gone.
        if let WindowState::Active { leading_tx: Some(leading_tx), .. } =
            std::mem::replace(&mut *self.0.state.lock(), WindowState::Idle)
        {
            leading_tx.rollback();
        }
    }
}

fn spawn_window(inner: Arc<Inner>, mut deadline: Instant) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep_until(deadline).await;
            let extended = {
                let state = inner.state.lock();
                match &*state {
                    WindowState::Active { deadline: d, .. } if *d > deadline => Some(*d),
                    WindowState::Active { .. } => None,
                    WindowState::Idle => return,
                }
            };
            match extended {
                Some(new_deadline) => deadline = new_deadline,
                None => break,
            }
        }

        let (latest_mutate, leading_tx, sender) = {
            let mut state = inner.state.lock();
            match std::mem::replace(&mut *state, WindowState::Idle) {
                WindowState::Active { latest_mutate, leading_tx, sender, .. } => (latest_mutate, leading_tx, sender),
                WindowState::Idle => return,
            }
        };

        let final_tx = if inner.trailing {
            let final_tx = latest_mutate();
            // the trailing call supersedes whatever the leading call already
            // produced for this window (spec §4.4): roll that one back
            // rather than letting both land.
            if let Some(leading_tx) = leading_tx {
                leading_tx.rollback();
            }
            final_tx
        } else {
            leading_tx.expect("leading produced a transaction")
        };
        let _ = sender.send(Some(final_tx));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_mutate(counter: Arc<AtomicUsize>) -> MutationFn {
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Transaction::new(uuid::Uuid::new_v4(), ripple_txn::TransactionStrategy::Parallel, vec![])
        })
    }

    #[tokio::test]
    async fn trailing_only_collapses_a_burst_into_one_call() {
        let debounce = Debounce::new(Duration::from_millis(20), false, true);
        let calls = Arc::new(AtomicUsize::new(0));

        let a = debounce.execute(counting_mutate(calls.clone()), ExecuteOptions::default());
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = debounce.execute(counting_mutate(calls.clone()), ExecuteOptions::default());

        let (tx_a, tx_b) = tokio::join!(a, b);
        assert_eq!(tx_a.id, tx_b.id, "both calls in the burst resolve to the same executed transaction");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "only the trailing call should actually run the mutation");
    }

    #[tokio::test]
    async fn leading_only_runs_immediately_and_ignores_later_calls_in_the_window() {
        let debounce = Debounce::new(Duration::from_millis(20), true, false);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = debounce.execute(counting_mutate(calls.clone()), ExecuteOptions::default()).await;
        let second = debounce.execute(counting_mutate(calls.clone()), ExecuteOptions::default()).await;

        assert_eq!(first.id, second.id);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    fn capturing_mutate(store: Arc<Mutex<Vec<Transaction>>>) -> MutationFn {
        Arc::new(move || {
            let tx = Transaction::new(uuid::Uuid::new_v4(), ripple_txn::TransactionStrategy::Parallel, vec![]);
            store.lock().push(tx.clone());
            tx
        })
    }

    #[tokio::test]
    async fn leading_and_trailing_rolls_back_the_leading_transaction_once_trailing_fires() {
        let debounce = Debounce::new(Duration::from_millis(10), true, true);
        let created = Arc::new(Mutex::new(Vec::new()));

        let leading_call = debounce.execute(capturing_mutate(created.clone()), ExecuteOptions::default());
        tokio::time::sleep(Duration::from_millis(2)).await;
        let trailing_call = debounce.execute(capturing_mutate(created.clone()), ExecuteOptions::default());

        let (leading_result, trailing_result) = tokio::join!(leading_call, trailing_call);
        assert_eq!(leading_result.id, trailing_result.id, "both calls resolve to the trailing transaction");

        let created = created.lock();
        assert_eq!(created.len(), 2, "leading runs immediately, trailing runs once the window fires");
        assert_eq!(created[1].id, leading_result.id, "the returned transaction is the trailing one");
        assert_eq!(
            created[0].state(),
            ripple_txn::TransactionState::RolledBack,
            "the superseded leading transaction must be rolled back, not left dangling"
        );
        assert!(created[0].is_persisted().await.is_err());
    }

    #[tokio::test]
    async fn cleanup_rolls_back_an_in_flight_leading_transaction() {
        let debounce = Debounce::new(Duration::from_millis(50), true, false);
        let calls = Arc::new(AtomicUsize::new(0));

        let leading = debounce.execute(counting_mutate(calls.clone()), ExecuteOptions::default()).await;
        assert_eq!(leading.state(), ripple_txn::TransactionState::Pending);

        debounce.cleanup();

        assert_eq!(leading.state(), ripple_txn::TransactionState::RolledBack);
        assert!(leading.is_persisted().await.is_err());
    }
}
