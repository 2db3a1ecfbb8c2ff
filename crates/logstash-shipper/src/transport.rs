// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::ShipperConfig;
use crate::errors::{ShipperError, TransportError};
use crate::http;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Url;
use tracing::debug;

/// Delivers one frame payload to the collector.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, body: Bytes) -> Result<(), TransportError>;

    /// Where payloads go, for diagnostics.
    fn destination(&self) -> String;
}

/// Posts each payload as the body of its own request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
    destination: String,
}

impl HttpTransport {
    pub fn new(config: &ShipperConfig) -> Result<Self, ShipperError> {
        Ok(Self {
            client: http::build_client(config)?,
            url: http::collector_url(config)?,
            headers: http::collector_headers(config)?,
            destination: http::destination(config),
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Bytes) -> Result<(), TransportError> {
        let len = body.len();
        let resp = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Request(Box::new(e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        debug!("Sent {len} bytes to {}, status {status}", self.destination);
        Ok(())
    }

    fn destination(&self) -> String {
        self.destination.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config_for(server: &mockito::ServerGuard) -> ShipperConfig {
        let address = server.socket_address();
        ShipperConfig {
            host: address.ip().to_string(),
            port: address.port(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_posts_payload_with_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .match_header("connection", "keep-alive")
            .match_header("keep-alive", "timeout=30, max=120")
            .match_body(Matcher::Exact(r#"{"message":"hi"}"#.to_string()))
            .with_status(200)
            .create_async()
            .await;

        let transport = HttpTransport::new(&config_for(&server)).unwrap();
        transport
            .send(Bytes::from_static(br#"{"message":"hi"}"#))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .create_async()
            .await;

        let transport = HttpTransport::new(&config_for(&server)).unwrap();
        let result = transport.send(Bytes::from_static(b"{}")).await;

        assert!(matches!(result, Err(TransportError::Status(503))));
    }

    #[tokio::test]
    async fn test_accepts_any_2xx() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(202)
            .create_async()
            .await;

        let transport = HttpTransport::new(&config_for(&server)).unwrap();
        assert!(transport.send(Bytes::from_static(b"{}")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_collector() {
        // Port 9 (discard) is closed on test hosts.
        let config = ShipperConfig {
            port: 9,
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let result = transport.send(Bytes::from_static(b"{}")).await;

        assert!(matches!(result, Err(TransportError::Request(_))));
        assert_eq!(transport.destination(), "127.0.0.1:9");
    }
}
