// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP plumbing towards the collector.
//!
//! Every frame is posted on its own to `/` of the collector. Connections are kept alive
//! across flushes: the `Keep-Alive` header asks the collector to hold an idle connection
//! for at least three upload intervals, and never for less than thirty seconds.

use crate::config::ShipperConfig;
use crate::constants::{KEEP_ALIVE_MAX_REQUESTS, MIN_KEEP_ALIVE_TIMEOUT_SECS};
use crate::errors::ShipperError;
use core::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONNECTION, CONTENT_TYPE};
use reqwest::Url;

/// `host:port` of the collector, used to name it in diagnostics.
#[must_use]
pub fn destination(config: &ShipperConfig) -> String {
    format!("{}:{}", bracketed_host(&config.host), config.port)
}

fn bracketed_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// URL every frame is posted to.
pub fn collector_url(config: &ShipperConfig) -> Result<Url, ShipperError> {
    let scheme = if config.use_tls { "https" } else { "http" };
    let raw = format!("{scheme}://{}/", destination(config));
    Url::parse(&raw)
        .map_err(|e| ShipperError::InvalidConfig(format!("invalid collector URL '{raw}': {e}")))
}

/// Idle timeout, in seconds, announced in the `Keep-Alive` header.
#[must_use]
pub fn keep_alive_timeout(upload_interval: Duration) -> u64 {
    let three_intervals = upload_interval.as_secs_f64() * 3.0;
    // Saturating float to int conversion.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let secs = three_intervals.ceil() as u64;
    secs.max(MIN_KEEP_ALIVE_TIMEOUT_SECS)
}

pub fn collector_headers(config: &ShipperConfig) -> Result<HeaderMap, ShipperError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    let keep_alive = format!(
        "timeout={}, max={KEEP_ALIVE_MAX_REQUESTS}",
        keep_alive_timeout(config.upload_interval)
    );
    headers.insert(
        "Keep-Alive",
        HeaderValue::from_str(&keep_alive)
            .map_err(|e| ShipperError::InvalidConfig(format!("invalid Keep-Alive header: {e}")))?,
    );

    if let Some(authorization) = &config.authorization {
        let mut value = HeaderValue::from_str(&authorization.header_value()).map_err(|_| {
            ShipperError::InvalidConfig(
                "authorization token contains characters not allowed in a header".to_string(),
            )
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

/// Builds the client shared by every request of one shipper.
pub fn build_client(config: &ShipperConfig) -> Result<reqwest::Client, ShipperError> {
    let idle = Duration::from_secs(keep_alive_timeout(config.upload_interval));
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(idle))
        // Detect collectors that vanished without closing the connection
        .tcp_keepalive(Some(Duration::from_secs(120)))
        .http1_only()
        .build()
        .map_err(ShipperError::HttpClient)
}
