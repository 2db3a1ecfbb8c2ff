// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(clippy::unwrap_used)]

use crate::diagnostics::DiagnosticsSink;
use crate::entry::{EntryEncoder, LogEntry};
use crate::errors::{BoxError, ShipperError, TransportError};
use crate::transport::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<Bytes>>,
    attempts: AtomicUsize,
    fail_with: Option<u16>,
    delay: Duration,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn bodies(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    /// `message` field of every delivered body, in delivery order.
    pub(crate) fn messages(&self) -> Vec<String> {
        self.bodies()
            .iter()
            .map(|body| {
                let value: serde_json::Value = serde_json::from_slice(body).unwrap();
                value["message"].as_str().unwrap().to_string()
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, body: Bytes) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(status) = self.fail_with {
            return Err(TransportError::Status(status));
        }
        self.sent.lock().unwrap().push(body);
        Ok(())
    }

    fn destination(&self) -> String {
        "recording".to_string()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingDiagnostics {
    reports: Mutex<Vec<String>>,
}

impl RecordingDiagnostics {
    pub(crate) fn reports(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }
}

impl DiagnosticsSink for RecordingDiagnostics {
    fn report(&self, error: &ShipperError) {
        self.reports.lock().unwrap().push(error.to_string());
    }
}

/// Encodes level and message as JSON padded with trailing spaces to exactly `size` bytes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedSizeEncoder {
    pub(crate) size: usize,
}

impl EntryEncoder for FixedSizeEncoder {
    fn encode(&self, entry: &LogEntry<'_>) -> Result<Vec<u8>, BoxError> {
        let mut payload = serde_json::to_vec(&serde_json::json!({
            "loglevel": entry.loglevel,
            "message": entry.message,
        }))?;
        if payload.len() > self.size {
            return Err(format!("{} bytes do not fit in {}", payload.len(), self.size).into());
        }
        payload.resize(self.size, b' ');
        Ok(payload)
    }
}

/// Always fails, like a serializer given a value it cannot represent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FailingEncoder;

impl EntryEncoder for FailingEncoder {
    fn encode(&self, _entry: &LogEntry<'_>) -> Result<Vec<u8>, BoxError> {
        Err("unsupported value".into())
    }
}
