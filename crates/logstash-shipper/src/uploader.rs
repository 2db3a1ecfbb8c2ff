// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Drains the store and dispatches every frame as its own request.
//!
//! A flush copies the whole store out in one step, so producers are blocked only for the
//! copy and never for network I/O. The requests of one drain run concurrently; failures
//! are reported to the diagnostics sink and the frame is dropped. There is no retry and
//! completion order is not submission order.

use crate::backpressure::OutstandingBytes;
use crate::diagnostics::DiagnosticsSink;
use crate::errors::{EntrySummary, ShipperError, TransportError};
use crate::lock::StoreLock;
use crate::transport::Transport;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

pub(crate) struct BatchUploader {
    store: Arc<StoreLock>,
    transport: Arc<dyn Transport>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    outstanding: Option<OutstandingBytes>,
    in_flight: TaskTracker,
    cancel: CancellationToken,
}

impl BatchUploader {
    pub(crate) fn new(
        store: Arc<StoreLock>,
        transport: Arc<dyn Transport>,
        diagnostics: Arc<dyn DiagnosticsSink>,
        outstanding: Option<OutstandingBytes>,
    ) -> Self {
        Self {
            store,
            transport,
            diagnostics,
            outstanding,
            in_flight: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Drains the store and dispatches its frames. Returns the number of frames handed to
    /// the transport; does nothing when the store is empty.
    pub(crate) async fn flush(&self) -> usize {
        if self.store.readable_bytes() == 0 {
            return 0;
        }

        let permit = match &self.outstanding {
            Some(outstanding) => match outstanding.reserve(self.store.capacity()).await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    debug!("Outstanding byte ceiling closed, skipping flush");
                    return 0;
                }
            },
            None => None,
        };

        let snapshot = self.store.drain();
        if snapshot.is_empty() {
            return 0;
        }
        let frames: Vec<Bytes> = snapshot.frames().collect();
        let count = frames.len();
        debug!("Flushing {count} frames, {} bytes", snapshot.len());

        let transport = Arc::clone(&self.transport);
        let diagnostics = Arc::clone(&self.diagnostics);
        let cancel = self.cancel.clone();
        self.in_flight.spawn(async move {
            // Held until every request of this drain completed.
            let _permit = permit;
            let destination = transport.destination();

            let mut requests = JoinSet::new();
            for frame in frames {
                let transport = Arc::clone(&transport);
                let cancel = cancel.clone();
                requests.spawn(async move {
                    let result = tokio::select! {
                        biased;
                        () = cancel.cancelled() => Err(TransportError::Cancelled),
                        result = transport.send(frame.clone()) => result,
                    };
                    (frame, result)
                });
            }

            while let Some(joined) = requests.join_next().await {
                let (entry, source) = match joined {
                    Ok((_, Ok(()))) => continue,
                    Ok((frame, Err(source))) => (EntrySummary::from_payload(&frame), source),
                    Err(e) => (None, TransportError::Request(Box::new(e))),
                };
                diagnostics.report(&ShipperError::Delivery {
                    destination: destination.clone(),
                    entry,
                    source,
                });
            }
        });

        count
    }

    /// Lets in-flight requests finish for up to `grace`, then cancels the rest.
    pub(crate) async fn close(&self, grace: Duration) {
        self.in_flight.close();
        if tokio::time::timeout(grace, self.in_flight.wait())
            .await
            .is_err()
        {
            warn!(
                "{} drains still in flight after {grace:?}, cancelling",
                self.in_flight.len()
            );
            self.cancel.cancel();
            self.in_flight.wait().await;
        }
    }

    /// Cancels in-flight requests without waiting for them.
    pub(crate) fn abort(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub(crate) async fn wait_idle(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }
}
