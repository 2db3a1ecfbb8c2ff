// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Logstash Shipper
//!
//! Buffered, non-blocking shipping of log entries to a Logstash HTTP input.
//!
//! Producers hand records to a [`Shipper`]. Each record is encoded as JSON and appended as a
//! length-prefixed frame to a fixed-capacity in-memory store. Every upload interval, or as
//! soon as a producer finds the store full, the store is drained in one copy and each entry
//! is posted to the collector as its own request.
//!
//! Recording never fails from the producer's point of view: entries that cannot be stored
//! or delivered are dropped and reported to a [`DiagnosticsSink`]. Delivery order at the
//! collector is not guaranteed.
//!
//! ```rust,ignore
//! use logstash_shipper::{LogLevel, Record, Shipper, ShipperConfig};
//!
//! let shipper = Shipper::new(ShipperConfig::from_env()?)?;
//! shipper.record(Record::new(LogLevel::Info, "service started").with_metadata("port", "8080"));
//! logstash_shipper::facade::install(&shipper)?;
//! log::warn!(user = "alice"; "login failed");
//! shipper.close().await;
//! ```

#![deny(clippy::all)]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]

pub mod backpressure;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod entry;
pub mod errors;
pub mod facade;
pub mod http;
pub mod shipper;
pub mod store;
pub mod transport;

mod lock;
mod scheduler;
mod uploader;

#[cfg(test)]
mod test_support;

pub use backpressure::OutstandingBytes;
pub use config::{Authorization, AuthorizationKind, ShipperConfig};
pub use diagnostics::{DiagnosticsSink, TracingDiagnostics};
pub use entry::{
    EntryEncoder, JsonEncoder, Location, LogEntry, LogLevel, Metadata, MetadataValue, Record,
};
pub use errors::{ShipperError, TransportError};
pub use shipper::{Shipper, ShipperComponents};
pub use transport::{HttpTransport, Transport};
