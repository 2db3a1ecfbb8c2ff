// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use logstash_shipper::{LogLevel, Metadata, Record};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StructuredLine {
    #[serde(default)]
    level: Option<String>,
    message: String,
    #[serde(default)]
    metadata: Metadata,
}

/// Turns one stdin line into a record.
///
/// A JSON object with a `message` and optional `level` and `metadata` is shipped as such.
/// Anything else, including JSON with an unknown level, is shipped verbatim at
/// `default_level`. Blank lines are skipped.
pub fn parse_line(line: &str, default_level: LogLevel) -> Option<Record> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    if line.trim_start().starts_with('{') {
        if let Ok(structured) = serde_json::from_str::<StructuredLine>(line) {
            let level = match structured.level.as_deref() {
                None => Some(default_level),
                Some(level) => level.parse::<LogLevel>().ok(),
            };
            if let Some(level) = level {
                let mut record = Record::new(level, structured.message);
                record.metadata = structured.metadata;
                return Some(record);
            }
        }
    }

    Some(Record::new(default_level, line))
}
