// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod input;
mod logger;

use std::{env, process};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use logstash_shipper::{http, LogLevel, Shipper, ShipperConfig};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOGSTASH_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    // The collector client's own stack stays quiet; its failures surface as diagnostics.
    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{log_level}");
    let filter = match EnvFilter::try_new(&env_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("{} | ERROR | could not parse log level '{log_level}': {e}", logger::PREFIX);
            process::exit(2);
        }
    };

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(logger::Formatter)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("{} | ERROR | setting default subscriber failed: {e}", logger::PREFIX);
        process::exit(2);
    }

    debug!("Logging subsystem enabled");

    let config = match ShipperConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };
    let collector = http::destination(&config);

    let shipper = match Shipper::new(config) {
        Ok(shipper) => shipper,
        Err(e) => {
            error!("Unable to start shipping logs: {e}");
            process::exit(1);
        }
    };

    info!("Shipping stdin to {collector}");

    let mut lines = BufReader::new(io::stdin()).lines();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut shipped: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(record) = input::parse_line(&line, LogLevel::Info) {
                        // Recording may wait on the store lock.
                        tokio::task::block_in_place(|| shipper.record(record));
                        shipped += 1;
                    }
                }
                Ok(None) => {
                    debug!("End of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {e}");
                    break;
                }
            }
        }
    }

    shipper.close().await;
    info!("Recorded {shipped} lines, shipper closed");
}
