// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic flush timer that producers can fire early.
//!
//! Exactly one timer task is armed at a time. Rescheduling aborts the armed task and arms a
//! new one, so an early flush also restarts the period. A task is only aborted while it
//! waits for its tick or for a byte reservation; draining the store has no await point.

use crate::uploader::BatchUploader;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) struct FlushScheduler {
    runtime: Handle,
    interval: Duration,
    uploader: Arc<BatchUploader>,
    task: Mutex<Option<JoinHandle<()>>>,
    stopped: CancellationToken,
}

impl FlushScheduler {
    pub(crate) fn new(runtime: Handle, interval: Duration, uploader: Arc<BatchUploader>) -> Self {
        Self {
            runtime,
            interval,
            uploader,
            task: Mutex::new(None),
            stopped: CancellationToken::new(),
        }
    }

    /// Arms the timer so the first flush happens after `initial_delay` and then every
    /// interval. Callable from any thread, with or without a runtime context.
    pub(crate) fn schedule(&self, initial_delay: Duration) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if self.stopped.is_cancelled() {
            return;
        }
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let uploader = Arc::clone(&self.uploader);
        let stopped = self.stopped.clone();
        let period = self.interval;
        *task = Some(self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = stopped.cancelled() => break,
                    _ = ticker.tick() => {
                        uploader.flush().await;
                    }
                }
            }
            debug!("Flush timer stopped");
        }));
    }

    /// Disarms the timer for good; later calls to [`schedule`](Self::schedule) are ignored.
    pub(crate) fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        self.stopped.cancel();
        if let Some(task) = task.take() {
            task.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
