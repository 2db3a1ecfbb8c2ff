// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

pub const DEFAULT_LABEL: &str = "logstash";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 31311;

pub const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(3);

/// Rounded up to a power of two when the store is allocated.
pub const DEFAULT_LOG_STORAGE_SIZE: usize = 524_288;
pub const DEFAULT_MAXIMUM_TOTAL_LOG_STORAGE_SIZE: usize = 4_194_304;

/// Largest store the 4-byte length prefix and the byte semaphore can address.
pub const MAXIMUM_LOG_STORAGE_SIZE: usize = 1 << 31;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Drain-and-wait rounds a producer goes through before giving up on a full store.
pub const MAX_DRAIN_ROUNDS: usize = 3;

pub const MIN_KEEP_ALIVE_TIMEOUT_SECS: u64 = 30;
pub const KEEP_ALIVE_MAX_REQUESTS: u32 = 120;

/// Time in-flight requests get to finish during shutdown before they are cancelled.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
