// Copyright (c) 2026 Ripple Contributors
// This file is licensed under the AGPL-3.0-or-later

use ripple_txn::Transaction;
use tokio::sync::watch;

/// Shared by [`crate::Debounce`] and [`crate::Throttle`]: a caller that
/// doesn't need the trailing result (leading-only pacing) gets its leading
/// transaction back immediately; everyone else waits on the window's shared
/// channel, which resolves once, or never if the window is cancelled by
/// `cleanup` (in which case falling back to the leading transaction, if any,
/// is the least surprising outcome).
pub async fn wait_for_window_result(
    mut rx: watch::Receiver<Option<Transaction>>,
    leading_tx: Option<Transaction>,
    needs_trailing: bool,
) -> Transaction {
    if !needs_trailing {
        if let Some(tx) = leading_tx {
            return tx;
        }
    }

    loop {
        if let Some(tx) = rx.borrow().clone() {
            return tx;
        }
        if rx.changed().await.is_err() {
            if let Some(tx) = leading_tx {
                return tx;
            }
            // Cancelled with nothing ever having run; park forever rather
            // than fabricate a transaction — cleanup() is a teardown path,
            // not one callers are expected to still be awaiting.
            std::future::pending::<()>().await;
            unreachable!()
        }
    }
}
