// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Integration with the `log` facade.
//!
//! A [`Shipper`] is a [`log::Log`]: key-values of a `log` record become metadata and the
//! call site becomes the `location` metadata. Records emitted by the shipper's own HTTP
//! stack are never shipped, since shipping them would produce more of them.

use crate::entry::{Location, LogLevel, Metadata, Record};
use crate::errors::ShipperError;
use crate::shipper::Shipper;
use log::kv::{Error as KvError, Key, Value, VisitSource};
use log::LevelFilter;
use std::path::{Component, Path};
use tracing::debug;

const IGNORED_TARGETS: [&str; 5] = ["reqwest", "hyper", "h2", "rustls", "logstash_shipper"];

fn is_ignored_target(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target
            .strip_prefix(ignored)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

#[must_use]
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::Trace,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Info | LogLevel::Notice => LevelFilter::Info,
        LogLevel::Warning => LevelFilter::Warn,
        LogLevel::Error | LogLevel::Critical => LevelFilter::Error,
    }
}

/// Part of a source path after its last `src` directory, or the whole path without one.
fn concise_path(file: &str) -> String {
    let components: Vec<Component<'_>> = Path::new(file).components().collect();
    match components
        .iter()
        .rposition(|component| component.as_os_str() == "src")
    {
        Some(src) if src + 1 < components.len() => components[src + 1..]
            .iter()
            .collect::<std::path::PathBuf>()
            .to_string_lossy()
            .into_owned(),
        _ => file.to_string(),
    }
}

struct MetadataCollector<'a>(&'a mut Metadata);

impl<'kvs> VisitSource<'kvs> for MetadataCollector<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), KvError> {
        self.0.insert(key.to_string(), value.to_string().into());
        Ok(())
    }
}

impl log::Log for Shipper {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        LogLevel::from(metadata.level()) >= self.log_level() && !is_ignored_target(metadata.target())
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut metadata = Metadata::new();
        if let Err(e) = record
            .key_values()
            .visit(&mut MetadataCollector(&mut metadata))
        {
            debug!("Dropping key-values of a log record: {e}");
        }

        let mut entry = Record::new(LogLevel::from(record.level()), record.args().to_string());
        entry.metadata = metadata;
        if let (Some(file), Some(line)) = (record.file(), record.line()) {
            entry = entry.with_location(Location {
                file: concise_path(file),
                module: record.module_path().unwrap_or_default().to_string(),
                line,
            });
        }
        self.record(entry);
    }

    fn flush(&self) {
        self.trigger_flush();
    }
}

/// Registers `shipper` as the process-wide `log` logger. Can only succeed once per process.
pub fn install(shipper: &Shipper) -> Result<(), ShipperError> {
    log::set_boxed_logger(Box::new(shipper.clone()))?;
    log::set_max_level(level_filter(shipper.log_level()));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ShipperConfig;
    use crate::entry::JsonEncoder;
    use crate::shipper::ShipperComponents;
    use crate::test_support::{RecordingDiagnostics, RecordingTransport};
    use log::Log;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn shipper(transport: Arc<RecordingTransport>) -> Shipper {
        Shipper::from_components(ShipperComponents {
            config: ShipperConfig {
                log_storage_size: 4096,
                maximum_total_log_storage_size: None,
                upload_interval: Duration::from_secs(60),
                log_level: LogLevel::Info,
                ..Default::default()
            },
            diagnostics: Arc::new(RecordingDiagnostics::default()),
            transport,
            encoder: Arc::new(JsonEncoder),
            runtime: Handle::current(),
            outstanding: None,
        })
        .unwrap()
    }

    #[test]
    fn test_ignored_targets() {
        assert!(is_ignored_target("hyper"));
        assert!(is_ignored_target("hyper::proto::h1"));
        assert!(is_ignored_target("logstash_shipper::uploader"));
        assert!(!is_ignored_target("hyperion"));
        assert!(!is_ignored_target("my_app::http"));
    }

    #[test]
    fn test_concise_path() {
        assert_eq!(concise_path("crates/app/src/auth/login.rs"), "auth/login.rs");
        assert_eq!(concise_path("src/main.rs"), "main.rs");
        assert_eq!(concise_path("src/bin/src/tool.rs"), "tool.rs");
        assert_eq!(concise_path("build.rs"), "build.rs");
        assert_eq!(concise_path("/tmp/src"), "/tmp/src");
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(LogLevel::Notice), LevelFilter::Info);
        assert_eq!(level_filter(LogLevel::Critical), LevelFilter::Error);
        assert_eq!(level_filter(LogLevel::Warning), LevelFilter::Warn);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enabled_respects_level_and_target() {
        let shipper = shipper(Arc::new(RecordingTransport::new()));
        let info = log::Metadata::builder()
            .level(log::Level::Info)
            .target("app")
            .build();
        let debug = log::Metadata::builder()
            .level(log::Level::Debug)
            .target("app")
            .build();
        let own = log::Metadata::builder()
            .level(log::Level::Error)
            .target("reqwest::connect")
            .build();

        assert!(shipper.enabled(&info));
        assert!(!shipper.enabled(&debug));
        assert!(!shipper.enabled(&own));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_log_record_becomes_entry() {
        let transport = Arc::new(RecordingTransport::new());
        let shipper = shipper(transport.clone());

        let kvs: &[(&str, &str)] = &[("user", "alice"), ("attempt", "2")];
        let logger = shipper.clone();
        tokio::task::spawn_blocking(move || {
            logger.log(
                &log::Record::builder()
                    .level(log::Level::Warn)
                    .target("app::auth")
                    .args(format_args!("login failed"))
                    .file(Some("src/auth.rs"))
                    .module_path(Some("app::auth"))
                    .line(Some(12))
                    .key_values(&kvs)
                    .build(),
            );
        })
        .await
        .unwrap();
        shipper.shutdown(Duration::from_secs(1)).await;

        let body: serde_json::Value = serde_json::from_slice(&transport.bodies()[0]).unwrap();
        assert_eq!(body["loglevel"], "warning");
        assert_eq!(body["message"], "login failed");
        assert_eq!(body["metadata"]["user"], "alice");
        assert_eq!(body["metadata"]["attempt"], "2");
        assert_eq!(body["metadata"]["location"], "auth.rs ▶ app::auth ▶ 12");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_install_only_once() {
        let shipper = shipper(Arc::new(RecordingTransport::new()));
        assert!(install(&shipper).is_ok());
        assert_eq!(log::max_level(), LevelFilter::Info);
        assert!(matches!(
            install(&shipper),
            Err(ShipperError::LoggerAlreadyInstalled(_))
        ));
        shipper.shutdown(Duration::from_millis(100)).await;
    }
}
