/*
 * Copyright 2017-2023 Ben Ashford
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! A one-bit, level-triggered notifier.
//!
//! Each IO loop waits on one of these and follows the pattern: `wait`, `clear`, drain the
//! queue fully, repeat.  A `set` racing the drain is never lost: the flag stays raised, so
//! the next `wait` returns immediately and the loop performs one (possibly empty) extra
//! drain.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct Flag {
    raised: AtomicBool,
    notify: Notify,
}

impl Flag {
    pub(crate) fn new() -> Self {
        Flag::default()
    }

    /// Raise the flag, waking the waiter if there is one.  Idempotent.
    pub(crate) fn set(&self) {
        self.raised.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Lower the flag.  Done by the waiting loop on entering its drain phase.
    pub(crate) fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Wait until the flag is raised.  Returns immediately if it already is.
    ///
    /// Intended for a single waiting task per flag.  The `Notified` future is created
    /// before the flag is checked, so a `set` in between cannot be missed: it either
    /// flips the flag we are about to read, or stores a wakeup permit.
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.raised.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::Flag;

    #[tokio::test]
    async fn set_before_wait_returns_immediately() {
        let flag = Flag::new();
        flag.set();
        flag.wait().await;
    }

    #[tokio::test]
    async fn set_wakes_a_parked_waiter() {
        let flag = Arc::new(Flag::new());
        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.wait().await })
        };
        tokio::task::yield_now().await;
        flag.set();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("Waiter should have been woken")
            .unwrap();
    }

    #[tokio::test]
    async fn cleared_flag_parks_the_waiter() {
        let flag = Flag::new();
        flag.set();
        flag.wait().await;
        flag.clear();
        let parked = tokio::time::timeout(Duration::from_millis(50), flag.wait()).await;
        assert!(parked.is_err());
    }

    #[tokio::test]
    async fn set_during_drain_is_not_lost() {
        let flag = Flag::new();
        flag.set();
        flag.wait().await;
        flag.clear();
        // Work arriving after the clear, while the loop is still draining
        flag.set();
        tokio::time::timeout(Duration::from_secs(1), flag.wait())
            .await
            .expect("Flag raised during the drain should satisfy the next wait");
    }
}
