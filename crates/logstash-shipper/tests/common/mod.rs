// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use logstash_shipper::{DiagnosticsSink, ShipperConfig, ShipperError};
use mockito::ServerGuard;
use std::sync::Mutex;
use tokio::time::{sleep, timeout, Duration};

/// Configuration pointing at a mock collector, with a short upload interval.
pub fn collector_config(server: &ServerGuard) -> ShipperConfig {
    let address = server.socket_address();
    ShipperConfig {
        label: "integration".to_string(),
        host: address.ip().to_string(),
        port: address.port(),
        upload_interval: Duration::from_millis(100),
        log_storage_size: 4096,
        maximum_total_log_storage_size: Some(16384),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub struct CapturingDiagnostics {
    reports: Mutex<Vec<String>>,
}

impl CapturingDiagnostics {
    pub fn reports(&self) -> Vec<String> {
        self.reports
            .lock()
            .expect("diagnostics mutex poisoned")
            .clone()
    }
}

impl DiagnosticsSink for CapturingDiagnostics {
    fn report(&self, error: &ShipperError) {
        self.reports
            .lock()
            .expect("diagnostics mutex poisoned")
            .push(error.to_string());
    }
}

/// Polls `condition` every 20ms, panicking after `limit`.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let poll = async {
        while !condition() {
            sleep(Duration::from_millis(20)).await;
        }
    };
    if timeout(limit, poll).await.is_err() {
        panic!("condition not met within {limit:?}");
    }
}
