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

enum CoolState {
    Idle,
    Cooling { deadline: Instant, trailing_mutate: Option<MutationFn>, leading_tx: Option<Transaction>, sender: watch::Sender<Option<Transaction>> },
}

struct Inner {
    wait: Duration,
    leading: bool,
    trailing: bool,
    state: Mutex<CoolState>,
}

/// Runs the mutation at most once per `wait` window (spec §4.4). `leading`
/// fires on the call that opens a cooldown window; `trailing`, if any calls
/// land during the cooldown, fires once more with the latest of them right
/// as the window ends.
pub struct Throttle(Arc<Inner>);

impl Throttle {
    pub fn new(wait: Duration, leading: bool, trailing: bool) -> Self {
        Throttle(Arc::new(Inner { wait, leading, trailing, state: Mutex::new(CoolState::Idle) }))
    }
}

impl Strategy for Throttle {
    fn execute(&self, mutate: MutationFn, _options: ExecuteOptions) -> BoxFuture<'static, Transaction> {
        let inner = self.0.clone();
        let mut state = inner.state.lock();

        let (rx, leading_tx, needs_trailing) = match &mut *state {
            CoolState::Idle => {
                let deadline = Instant::now() + inner.wait;
                let leading_tx = if inner.leading { Some(mutate()) } else { None };
                let (sender, rx) = watch::channel(None);
                *state = CoolState::Cooling { deadline, trailing_mutate: None, leading_tx: leading_tx.clone(), sender };
                drop(state);
                spawn_cooldown(inner.clone(), deadline);
                (rx, leading_tx, false)
            }
            CoolState::Cooling { trailing_mutate, leading_tx, sender, .. } => {
                *trailing_mutate = Some(mutate);
                let rx = sender.subscribe();
                let leading_tx = leading_tx.clone();
                drop(state);
                (rx, leading_tx, inner.trailing)
            }
        };

        Box::pin(async move { wait_for_window_result(rx, leading_tx, needs_trailing).await })
    }

    fn cleanup(&self) {
        *self.0.state.lock() = CoolState::Idle;
    }
}

fn spawn_cooldown(inner: Arc<Inner>, deadline: Instant) {
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;

        let (trailing_mutate, sender) = {
            let mut state = inner.state.lock();
            match std::mem::replace(&mut *state, CoolState::Idle) {
                CoolState::Cooling { trailing_mutate, sender, .. } => (trailing_mutate, sender),
                CoolState::Idle => return,
            }
        };

        if inner.trailing {
            if let Some(mutate) = trailing_mutate {
                let _ = sender.send(Some(mutate()));
                return;
            }
        }
        // No trailing call: drop `sender` unsent, which unblocks any waiter
        // expecting the trailing result back onto its captured leading_tx.
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_mutate(counter: Arc<AtomicUsize>) -> MutationFn {
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Transaction::new(uuid::Uuid::new_v4(), ripple_txn::TransactionStrategy::Parallel, vec![])
        })
    }

    #[tokio::test]
    async fn calls_within_cooldown_collapse_to_leading_and_trailing() {
        let throttle = Throttle::new(Duration::from_millis(20), true, true);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = throttle.execute(counting_mutate(calls.clone()), ExecuteOptions::default());
        let second = throttle.execute(counting_mutate(calls.clone()), ExecuteOptions::default());
        let (tx_first, tx_second) = tokio::join!(first, second);

        assert_eq!(calls.load(Ordering::SeqCst), 2, "one leading call plus one trailing call");
        assert_ne!(tx_first.id, tx_second.id);
    }

    #[tokio::test]
    async fn leading_only_drops_calls_made_during_cooldown() {
        let throttle = Throttle::new(Duration::from_millis(20), true, false);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = throttle.execute(counting_mutate(calls.clone()), ExecuteOptions::default()).await;
        let second = throttle.execute(counting_mutate(calls.clone()), ExecuteOptions::default()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.id, second.id);
    }
}
