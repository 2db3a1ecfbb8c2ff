// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::entry::LogLevel;
use std::fmt;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Level and message of the entry a failure is about, carried so diagnostics can name the
/// entry without logging it through the shipper again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub level: LogLevel,
    pub message: String,
}

impl EntrySummary {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Best-effort recovery of level and message from an encoded JSON payload.
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        #[derive(serde::Deserialize)]
        struct Summary {
            loglevel: LogLevel,
            message: String,
        }

        serde_json::from_slice::<Summary>(payload)
            .ok()
            .map(|s| Self::new(s.loglevel, s.message))
    }
}

impl fmt::Display for EntrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} entry {:?}", self.level, self.message)
    }
}

fn parenthesized(entry: &Option<EntrySummary>) -> String {
    entry
        .as_ref()
        .map(|entry| format!(" ({entry})"))
        .unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[source] BoxError),

    #[error("collector answered with status {0}")]
    Status(u16),

    #[error("request cancelled during shutdown")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
#[error("frame of {frame_size} bytes does not fit, {available} of {capacity} bytes available")]
pub struct StoreFull {
    pub frame_size: usize,
    pub available: usize,
    pub capacity: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error("failed to encode {entry}: {source}")]
    Encoding {
        entry: EntrySummary,
        #[source]
        source: BoxError,
    },

    #[error("store lock not acquired within {timeout:?}, dropped {entry}")]
    LockTimeout {
        timeout: Duration,
        entry: EntrySummary,
    },

    #[error("entry of {size} bytes is larger than the store capacity of {capacity} bytes, dropped {entry}")]
    EntryTooLarge {
        size: usize,
        capacity: usize,
        entry: EntrySummary,
    },

    #[error("error during sending logs to {destination}{}: {source}", parenthesized(.entry))]
    Delivery {
        destination: String,
        entry: Option<EntrySummary>,
        #[source]
        source: TransportError,
    },

    #[error("shipper is shut down, dropped {entry}")]
    ShutDown { entry: EntrySummary },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("diagnostics sink ships to a log collector, which recurses on every internal failure")]
    RecursiveDiagnosticsBackend,

    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("a global logger is already installed: {0}")]
    LoggerAlreadyInstalled(#[from] log::SetLoggerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ShipperError::InvalidConfig("port must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: port must be greater than 0"
        );
    }

    #[test]
    fn test_entry_too_large_names_sizes_and_entry() {
        let error = ShipperError::EntryTooLarge {
            size: 1504,
            capacity: 1024,
            entry: EntrySummary::new(LogLevel::Error, "boom"),
        };
        let text = error.to_string();
        assert!(text.contains("1504"));
        assert!(text.contains("1024"));
        assert!(text.contains("error entry \"boom\""));
    }

    #[test]
    fn test_delivery_with_and_without_entry() {
        let with_entry = ShipperError::Delivery {
            destination: "127.0.0.1:31311".to_string(),
            entry: Some(EntrySummary::new(LogLevel::Info, "hello")),
            source: TransportError::Status(503),
        };
        assert_eq!(
            with_entry.to_string(),
            "error during sending logs to 127.0.0.1:31311 (info entry \"hello\"): collector answered with status 503"
        );

        let without_entry = ShipperError::Delivery {
            destination: "127.0.0.1:31311".to_string(),
            entry: None,
            source: TransportError::Cancelled,
        };
        assert_eq!(
            without_entry.to_string(),
            "error during sending logs to 127.0.0.1:31311: request cancelled during shutdown"
        );
    }

    #[test]
    fn test_summary_from_payload() {
        let payload =
            br#"{"timestamp":"2021-07-15T10:00:00.000Z","loglevel":"warning","message":"disk","metadata":{}}"#;
        assert_eq!(
            EntrySummary::from_payload(payload),
            Some(EntrySummary::new(LogLevel::Warning, "disk"))
        );
        assert_eq!(EntrySummary::from_payload(b"not json"), None);
    }
}
