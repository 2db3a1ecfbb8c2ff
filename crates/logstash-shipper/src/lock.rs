// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mutual exclusion over the frame store, with a "draining" flag producers wait on.
//!
//! Producers append only while `draining == false`. A producer that finds the store full
//! releases it with `draining = true` and waits; the next drain copies the store out and
//! releases with `draining = false`, which wakes every waiting producer. All state changes
//! happen under the mutex and are announced through the condition variable.

use crate::store::{DrainSnapshot, FrameStore};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct StoreState {
    store: FrameStore,
    draining: bool,
}

#[derive(Debug)]
pub(crate) struct StoreLock {
    state: Mutex<StoreState>,
    changed: Condvar,
    capacity: usize,
}

impl StoreLock {
    pub(crate) fn new(store: FrameStore) -> Self {
        Self {
            capacity: store.capacity(),
            state: Mutex::new(StoreState {
                store,
                draining: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn readable_bytes(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .store
            .readable_bytes()
    }

    /// Locks regardless of the draining flag. Only the drain path uses this.
    pub(crate) fn lock(&self) -> StoreGuard<'_> {
        StoreGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
            changed: &self.changed,
        }
    }

    /// Locks once no drain is pending, giving up after `timeout`.
    pub(crate) fn lock_when_idle(&self, timeout: Duration) -> Option<StoreGuard<'_>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (state, wait) = self
            .changed
            .wait_timeout_while(state, timeout, |state| state.draining)
            .unwrap_or_else(PoisonError::into_inner);
        if wait.timed_out() && state.draining {
            return None;
        }
        Some(StoreGuard {
            state,
            changed: &self.changed,
        })
    }

    /// Copies the unread frames out, empties the store and clears the draining flag.
    pub(crate) fn drain(&self) -> DrainSnapshot {
        let mut guard = self.lock();
        let snapshot = guard.store_mut().drain();
        guard.release(false);
        snapshot
    }
}

/// Exclusive access to the store. Dropping the guard unlocks and wakes waiters.
pub(crate) struct StoreGuard<'a> {
    state: MutexGuard<'a, StoreState>,
    changed: &'a Condvar,
}

impl StoreGuard<'_> {
    pub(crate) fn store(&self) -> &FrameStore {
        &self.state.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut FrameStore {
        &mut self.state.store
    }

    #[cfg(test)]
    pub(crate) fn is_draining(&self) -> bool {
        self.state.draining
    }

    /// Unlocks, leaving the draining flag set to `draining`.
    pub(crate) fn release(mut self, draining: bool) {
        self.state.draining = draining;
    }
}

impl Drop for StoreGuard<'_> {
    fn drop(&mut self) {
        self.changed.notify_all();
    }
}
