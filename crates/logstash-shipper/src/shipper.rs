// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The log handler producers write to.
//!
//! [`Shipper::record`] encodes a record and appends it to a bounded in-memory store; a timer
//! drains the store every upload interval and posts each entry to the collector. Recording
//! never returns an error and never waits on the network: dropped entries and failed
//! deliveries go to the [`DiagnosticsSink`].
//!
//! Entries are drained in the order they were recorded, but each one is posted as an
//! independent request. The collector may receive them in any order, and a failed request
//! loses its entry without affecting the others.
//!
//! `record` blocks the calling thread for at most the lock timeout per wait, and waits
//! again after forcing a drain of a full store. Async code should record from a blocking
//! context such as [`tokio::task::spawn_blocking`].

use crate::backpressure::OutstandingBytes;
use crate::config::ShipperConfig;
use crate::constants::{DEFAULT_SHUTDOWN_GRACE, MAX_DRAIN_ROUNDS};
use crate::diagnostics::{DiagnosticsSink, TracingDiagnostics};
use crate::entry::{EntryEncoder, JsonEncoder, LogEntry, LogLevel, Metadata, MetadataValue, Record};
use crate::errors::{EntrySummary, ShipperError};
use crate::lock::StoreLock;
use crate::scheduler::FlushScheduler;
use crate::store::{FrameStore, LENGTH_PREFIX_SIZE};
use crate::transport::{HttpTransport, Transport};
use crate::uploader::BatchUploader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Collaborators a [`Shipper`] is assembled from.
pub struct ShipperComponents {
    pub config: ShipperConfig,
    pub diagnostics: Arc<dyn DiagnosticsSink>,
    pub transport: Arc<dyn Transport>,
    pub encoder: Arc<dyn EntryEncoder>,
    /// Runtime the flush timer and the requests run on
    pub runtime: Handle,
    /// Ceiling shared with other shippers. When `None`, one is created from
    /// `config.maximum_total_log_storage_size`.
    pub outstanding: Option<OutstandingBytes>,
}

struct Inner {
    label: String,
    store: Arc<StoreLock>,
    uploader: Arc<BatchUploader>,
    scheduler: FlushScheduler,
    encoder: Arc<dyn EntryEncoder>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    lock_timeout: Duration,
    shut_down: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.scheduler.stop();
        self.uploader.abort();
    }
}

/// Handle to one log store and its upload pipeline. Clones share the pipeline but carry
/// their own metadata and minimum level.
#[derive(Clone)]
pub struct Shipper {
    inner: Arc<Inner>,
    metadata: Metadata,
    log_level: LogLevel,
}

impl std::fmt::Debug for Shipper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shipper")
            .field("label", &self.inner.label)
            .field("capacity", &self.inner.store.capacity())
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl Shipper {
    /// Builds a shipper posting JSON entries over HTTP, reporting through `tracing`.
    /// Must be called within a tokio runtime.
    pub fn new(config: ShipperConfig) -> Result<Self, ShipperError> {
        let diagnostics = Arc::new(TracingDiagnostics::new(config.label.clone()));
        Self::with_diagnostics(config, diagnostics)
    }

    pub fn with_diagnostics(
        config: ShipperConfig,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self, ShipperError> {
        Self::over_http(config, diagnostics, None)
    }

    /// Like [`with_diagnostics`](Self::with_diagnostics), but drains count against
    /// `outstanding`, a ceiling shared by every shipper built with it. The configured
    /// `maximum_total_log_storage_size` is not used.
    pub fn with_shared_ceiling(
        config: ShipperConfig,
        diagnostics: Arc<dyn DiagnosticsSink>,
        outstanding: OutstandingBytes,
    ) -> Result<Self, ShipperError> {
        Self::over_http(config, diagnostics, Some(outstanding))
    }

    fn over_http(
        config: ShipperConfig,
        diagnostics: Arc<dyn DiagnosticsSink>,
        outstanding: Option<OutstandingBytes>,
    ) -> Result<Self, ShipperError> {
        if diagnostics.ships_to_collector() {
            return Err(ShipperError::RecursiveDiagnosticsBackend);
        }
        config.validate()?;
        let runtime = Handle::try_current()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::from_components(ShipperComponents {
            config,
            diagnostics,
            transport,
            encoder: Arc::new(JsonEncoder),
            runtime,
            outstanding,
        })
    }

    pub fn from_components(components: ShipperComponents) -> Result<Self, ShipperError> {
        let ShipperComponents {
            config,
            diagnostics,
            transport,
            encoder,
            runtime,
            outstanding,
        } = components;

        if diagnostics.ships_to_collector() {
            return Err(ShipperError::RecursiveDiagnosticsBackend);
        }
        config.validate()?;

        let store = Arc::new(StoreLock::new(FrameStore::new(config.log_storage_size)));
        let outstanding = match outstanding {
            Some(shared) => {
                let capacity = store.capacity();
                if shared.ceiling() < 2 * capacity {
                    return Err(ShipperError::InvalidConfig(format!(
                        "shared ceiling of {} bytes is too low, it needs to be at least twice the store capacity of {capacity} bytes",
                        shared.ceiling()
                    )));
                }
                Some(shared)
            }
            None => config
                .maximum_total_log_storage_size
                .map(OutstandingBytes::new),
        };
        let uploader = Arc::new(BatchUploader::new(
            Arc::clone(&store),
            transport,
            Arc::clone(&diagnostics),
            outstanding,
        ));
        let scheduler = FlushScheduler::new(runtime, config.upload_interval, Arc::clone(&uploader));
        scheduler.schedule(config.upload_interval);

        debug!(
            "Shipper {} started with a store of {} bytes, uploading every {:?}",
            config.label,
            store.capacity(),
            config.upload_interval
        );

        Ok(Self {
            inner: Arc::new(Inner {
                label: config.label,
                store,
                uploader,
                scheduler,
                encoder,
                diagnostics,
                lock_timeout: config.lock_timeout,
                shut_down: AtomicBool::new(false),
            }),
            metadata: Metadata::new(),
            log_level: config.log_level,
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Store capacity in bytes, after rounding.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.store.capacity()
    }

    /// Bytes recorded but not yet drained.
    #[must_use]
    pub fn readable_bytes(&self) -> usize {
        self.inner.store.readable_bytes()
    }

    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// A handle on the same pipeline that adds `key` to the metadata of every record.
    #[must_use]
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        let mut shipper = self.clone();
        shipper.metadata.insert(key.into(), value.into());
        shipper
    }

    /// Records one entry. Failures are reported to the diagnostics sink and the entry is
    /// dropped.
    pub fn record(&self, record: Record) {
        if let Err(err) = self.try_record(record) {
            self.inner.diagnostics.report(&err);
        }
    }

    fn try_record(&self, record: Record) -> Result<(), ShipperError> {
        let summary = || EntrySummary::new(record.level, record.message.as_str());

        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(ShipperError::ShutDown { entry: summary() });
        }

        let mut metadata = self.metadata.clone();
        metadata.extend(record.metadata.clone());
        if let Some(location) = &record.location {
            metadata.insert("location".to_string(), location.to_string().into());
        }
        let entry = LogEntry {
            timestamp: record.timestamp,
            loglevel: record.level,
            message: &record.message,
            metadata: &metadata,
        };
        let payload = self
            .inner
            .encoder
            .encode(&entry)
            .map_err(|source| ShipperError::Encoding {
                entry: summary(),
                source,
            })?;

        let capacity = self.inner.store.capacity();
        let frame_size = LENGTH_PREFIX_SIZE + payload.len();
        if frame_size > capacity {
            return Err(ShipperError::EntryTooLarge {
                size: frame_size,
                capacity,
                entry: summary(),
            });
        }

        let timeout = self.inner.lock_timeout;
        let lock_timeout = || ShipperError::LockTimeout {
            timeout,
            entry: summary(),
        };

        // `shutdown` raises the flag before its final drain takes the store, so a producer
        // holding the store either sees the flag or appends before that drain.
        let shut_down = || {
            self.inner
                .shut_down
                .load(Ordering::Acquire)
                .then(|| ShipperError::ShutDown { entry: summary() })
        };

        let mut guard = self
            .inner
            .store
            .lock_when_idle(timeout)
            .ok_or_else(lock_timeout)?;
        let mut rounds = 0;
        loop {
            if let Some(err) = shut_down() {
                return Err(err);
            }
            if guard.store().fits(payload.len()) {
                break;
            }
            if rounds == MAX_DRAIN_ROUNDS {
                return Err(lock_timeout());
            }
            rounds += 1;
            self.inner.scheduler.schedule(Duration::ZERO);
            guard.release(true);
            guard = self
                .inner
                .store
                .lock_when_idle(timeout)
                .ok_or_else(lock_timeout)?;
        }

        guard
            .store_mut()
            .append(&payload)
            .map_err(|_| lock_timeout())?;
        guard.release(false);
        Ok(())
    }

    /// Flushes now instead of at the next tick, and restarts the upload period.
    pub fn trigger_flush(&self) {
        self.inner.scheduler.schedule(Duration::ZERO);
    }

    /// Stops the timer, uploads what is left in the store and waits up to `grace` for
    /// requests in flight. Records made afterwards are dropped.
    pub async fn shutdown(&self, grace: Duration) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.scheduler.stop();
        let frames = self.inner.uploader.flush().await;
        debug!(
            "Shipper {} shutting down, {frames} frames in final flush",
            self.inner.label
        );
        self.inner.uploader.close(grace).await;
    }

    /// [`shutdown`](Self::shutdown) with the default grace period.
    pub async fn close(&self) {
        self.shutdown(DEFAULT_SHUTDOWN_GRACE).await;
    }
}

/// Reports become warning entries of this shipper. A shipper used this way can only serve
/// code outside the shipping pipeline; another shipper refuses it as its sink.
impl DiagnosticsSink for Shipper {
    fn report(&self, error: &ShipperError) {
        self.record(Record::new(LogLevel::Warning, error.to_string()));
    }

    fn ships_to_collector(&self) -> bool {
        true
    }
}
