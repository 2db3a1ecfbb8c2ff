// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ceiling on bytes held by drains whose requests are still in flight.
//!
//! Permits are bytes. A drain reserves the store capacity before it copies the store out
//! and keeps the reservation until every request of that drain completed. While the
//! ceiling is reached the store is not drained, so producers that fill it wait on the
//! store lock and eventually drop their entries.
//!
//! Clones share one ceiling, so several shippers can be bounded together.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct OutstandingBytes {
    permits: Arc<Semaphore>,
    ceiling: usize,
}

impl OutstandingBytes {
    /// `ceiling` must not exceed `u32::MAX`; the configuration validates this.
    #[must_use]
    pub fn new(ceiling: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(ceiling)),
            ceiling,
        }
    }

    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Bytes currently reserved by in-flight drains.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.ceiling - self.permits.available_permits()
    }

    /// Waits until `bytes` fit under the ceiling and reserves them.
    pub async fn reserve(&self, bytes: usize) -> Result<OwnedSemaphorePermit, AcquireError> {
        let bytes = u32::try_from(bytes.min(self.ceiling)).unwrap_or(u32::MAX);
        Arc::clone(&self.permits).acquire_many_owned(bytes).await
    }

    /// Fails pending and future reservations of every clone. Shippers never close a
    /// ceiling themselves; whoever shares one decides when it is done.
    pub fn close(&self) {
        self.permits.close();
    }
}
