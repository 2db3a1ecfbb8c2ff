// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Side channel for the shipper's own failures.
//!
//! Dropped entries and failed deliveries are reported here instead of to the producer. A
//! sink must not feed the shipping pipeline itself: a failing collector would then produce
//! a report per failure, each of which fails again.

use crate::errors::ShipperError;
use tracing::{debug, error, warn};

pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, error: &ShipperError);

    /// True when reports end up as entries shipped to a log collector. Such a sink is
    /// refused when a shipper is built.
    fn ships_to_collector(&self) -> bool {
        false
    }
}

/// Reports through `tracing`, tagged with the shipper label.
#[derive(Debug, Clone)]
pub struct TracingDiagnostics {
    label: String,
}

impl TracingDiagnostics {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for TracingDiagnostics {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_LABEL)
    }
}

impl DiagnosticsSink for TracingDiagnostics {
    fn report(&self, err: &ShipperError) {
        let label = self.label.as_str();
        match err {
            ShipperError::Delivery { .. } | ShipperError::LockTimeout { .. } => {
                warn!(label, "{err}");
            }
            ShipperError::ShutDown { .. } => debug!(label, "{err}"),
            _ => error!(label, "{err}"),
        }
    }
}
