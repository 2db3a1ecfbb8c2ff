// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line format of the pipe's own logs:
//!
//! ```text
//! LOGSTASH_PIPE | LEVEL | module | [outer>inner | ]message fields
//! ```
//!
//! `module` is the last segment of the event target. Span fields are left out, only the
//! names of the enclosing spans are kept.

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext,
};
use tracing_subscriber::registry::LookupSpan;

pub const PREFIX: &str = "LOGSTASH_PIPE";

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(
            writer,
            "{PREFIX} | {} | {} | ",
            metadata.level(),
            short_target(metadata.target())
        )?;

        if let Some(scope) = ctx.event_scope() {
            let path: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            write!(writer, "{} | ", path.join(">"))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::{info_span, warn};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(emit: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_short_target() {
        assert_eq!(short_target("logstash_pipe::input"), "input");
        assert_eq!(short_target("logstash_pipe"), "logstash_pipe");
    }

    #[test]
    fn test_event_outside_spans() {
        let output = capture(|| warn!(target: "logstash_pipe::input", "skipping line"));
        assert_eq!(output, "LOGSTASH_PIPE | WARN | input | skipping line\n");
    }

    #[test]
    fn test_span_names_without_fields() {
        let output = capture(|| {
            let _read = info_span!("read", fd = 0).entered();
            let _line = info_span!("line", number = 7).entered();
            warn!(target: "logstash_pipe::input", attempt = 2, "skipping line");
        });
        assert_eq!(
            output,
            "LOGSTASH_PIPE | WARN | input | read>line | skipping line attempt=2\n"
        );
    }
}
