// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_HOST, DEFAULT_LABEL, DEFAULT_LOCK_TIMEOUT, DEFAULT_LOG_STORAGE_SIZE,
    DEFAULT_MAXIMUM_TOTAL_LOG_STORAGE_SIZE, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_UPLOAD_INTERVAL, MAXIMUM_LOG_STORAGE_SIZE,
};
use crate::entry::LogLevel;
use crate::errors::ShipperError;
use crate::store::store_capacity;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationKind {
    Basic,
    Bearer,
}

/// Value of the `Authorization` header sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Authorization {
    pub kind: AuthorizationKind,
    pub token: String,
}

impl Authorization {
    #[must_use]
    pub fn header_value(&self) -> String {
        let scheme = match self.kind {
            AuthorizationKind::Basic => "Basic",
            AuthorizationKind::Bearer => "Bearer",
        };
        format!("{scheme} {}", self.token)
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl FromStr for Authorization {
    type Err = ShipperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, token) = s.trim().split_once(' ').ok_or_else(|| {
            ShipperError::InvalidConfig(
                "authorization must look like '<Basic|Bearer> <token>'".to_string(),
            )
        })?;
        let kind = match scheme.to_lowercase().as_str() {
            "basic" => AuthorizationKind::Basic,
            "bearer" => AuthorizationKind::Bearer,
            other => {
                return Err(ShipperError::InvalidConfig(format!(
                    "unsupported authorization scheme '{other}'"
                )))
            }
        };
        Ok(Self {
            kind,
            token: token.trim().to_string(),
        })
    }
}

/// Configuration of one [`Shipper`](crate::shipper::Shipper).
#[derive(Debug, Clone)]
pub struct ShipperConfig {
    /// Name of the shipper, attached to its diagnostics
    pub label: String,
    /// Collector host
    pub host: String,
    /// Collector port
    pub port: u16,
    /// Use https towards the collector
    pub use_tls: bool,
    /// Time between two timer-driven flushes
    pub upload_interval: Duration,
    /// Minimum store size in bytes, rounded up to a power of two
    pub log_storage_size: usize,
    /// Ceiling on bytes held by drains still in flight, disabled when `None`
    pub maximum_total_log_storage_size: Option<usize>,
    /// How long a producer waits for the store before dropping its entry
    pub lock_timeout: Duration,
    /// Timeout of a single request to the collector
    pub request_timeout: Duration,
    /// Minimum level accepted through the `log` facade
    pub log_level: LogLevel,
    pub authorization: Option<Authorization>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            use_tls: false,
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
            log_storage_size: DEFAULT_LOG_STORAGE_SIZE,
            maximum_total_log_storage_size: Some(DEFAULT_MAXIMUM_TOTAL_LOG_STORAGE_SIZE),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_level: LogLevel::Info,
            authorization: None,
        }
    }
}

/// Parses `name` when it is set. A set but unparsable value is an error, never a fallback.
fn env_parse<T: FromStr>(name: &str, expected: &str) -> Result<Option<T>, ShipperError> {
    match env::var(name) {
        Ok(val) => val.trim().parse::<T>().map(Some).map_err(|_| {
            ShipperError::InvalidConfig(format!("{name} is not {expected}: '{val}'"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_millis(name: &str) -> Result<Option<Duration>, ShipperError> {
    Ok(env_parse::<u64>(name, "a number of milliseconds")?.map(Duration::from_millis))
}

fn env_flag(name: &str) -> Result<Option<bool>, ShipperError> {
    match env::var(name) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(ShipperError::InvalidConfig(format!(
                "{name} is not a boolean: '{val}'"
            ))),
        },
        Err(_) => Ok(None),
    }
}

impl ShipperConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ShipperError> {
        let defaults = Self::default();

        let label = env::var("LOGSTASH_LABEL").unwrap_or(defaults.label);
        let host = env::var("LOGSTASH_HOST").unwrap_or(defaults.host);
        let port = env_parse::<u16>("LOGSTASH_PORT", "a port number")?.unwrap_or(defaults.port);
        let use_tls = env_flag("LOGSTASH_USE_TLS")?.unwrap_or(defaults.use_tls);
        let upload_interval =
            env_millis("LOGSTASH_UPLOAD_INTERVAL_MS")?.unwrap_or(defaults.upload_interval);
        let log_storage_size = env_parse::<usize>("LOGSTASH_LOG_STORAGE_SIZE", "a byte count")?
            .unwrap_or(defaults.log_storage_size);
        let maximum_total_log_storage_size = match env::var("LOGSTASH_MAX_TOTAL_LOG_STORAGE_SIZE")
        {
            Ok(val) => match val.trim().to_lowercase().as_str() {
                "" | "0" | "none" => None,
                size => Some(size.parse::<usize>().map_err(|_| {
                    ShipperError::InvalidConfig(format!(
                        "LOGSTASH_MAX_TOTAL_LOG_STORAGE_SIZE is not a byte count: '{size}'"
                    ))
                })?),
            },
            Err(_) => defaults.maximum_total_log_storage_size,
        };
        let lock_timeout = env_millis("LOGSTASH_LOCK_TIMEOUT_MS")?.unwrap_or(defaults.lock_timeout);
        let request_timeout =
            env_millis("LOGSTASH_REQUEST_TIMEOUT_MS")?.unwrap_or(defaults.request_timeout);
        let log_level = match env::var("LOGSTASH_MIN_LEVEL") {
            Ok(val) => val.parse::<LogLevel>().map_err(ShipperError::InvalidConfig)?,
            Err(_) => defaults.log_level,
        };
        let authorization = env::var("LOGSTASH_AUTHORIZATION")
            .ok()
            .map(|val| val.parse::<Authorization>())
            .transpose()?;

        let config = Self {
            label,
            host,
            port,
            use_tls,
            upload_interval,
            log_storage_size,
            maximum_total_log_storage_size,
            lock_timeout,
            request_timeout,
            log_level,
            authorization,
        };

        config.validate()?;
        Ok(config)
    }

    /// Capacity the store is allocated with.
    #[must_use]
    pub fn store_capacity(&self) -> usize {
        store_capacity(self.log_storage_size)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ShipperError> {
        if self.host.trim().is_empty() {
            return Err(ShipperError::InvalidConfig(
                "collector host cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ShipperError::InvalidConfig(
                "collector port must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("upload interval", self.upload_interval),
            ("lock timeout", self.lock_timeout),
            ("request timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(ShipperError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.log_storage_size == 0 || self.log_storage_size > MAXIMUM_LOG_STORAGE_SIZE {
            return Err(ShipperError::InvalidConfig(format!(
                "log storage size must be between 1 and {MAXIMUM_LOG_STORAGE_SIZE} bytes, got {}",
                self.log_storage_size
            )));
        }

        if let Some(maximum) = self.maximum_total_log_storage_size {
            let capacity = self.store_capacity();
            if maximum < 2 * capacity {
                return Err(ShipperError::InvalidConfig(format!(
                    "maximum total log storage size of {maximum} bytes is too low, it needs to be at least twice the store capacity of {capacity} bytes"
                )));
            }
            if u32::try_from(maximum).is_err() {
                return Err(ShipperError::InvalidConfig(format!(
                    "maximum total log storage size of {maximum} bytes exceeds {} bytes",
                    u32::MAX
                )));
            }
        }

        crate::http::collector_url(self).map(|_| ())
    }
}
