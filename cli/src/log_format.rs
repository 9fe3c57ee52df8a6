//! Plain-text event formatter that tags each line with its span ids and session context.
//!
//! Sessions run inside a `session` span carrying `mode`, `client` and `task_id`, so every line
//! a session logs can be traced back to one client of one transport.

use std::fmt;

use tracing_core::Subscriber;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

/// Output: `TIMESTAMP trace_id=X span_id=Y [session{mode=.. client=..}] LEVEL target: fields`.
///
/// Events outside any span get no id prefix and no context.
pub struct TextWithSpanIds {
    timer: SystemTime,
    with_target: bool,
}

impl Default for TextWithSpanIds {
    fn default() -> Self {
        Self {
            timer: SystemTime,
            with_target: true,
        }
    }
}

impl TextWithSpanIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the module path from each line.
    pub fn with_target(mut self, on: bool) -> Self {
        self.with_target = on;
        self
    }
}

impl<S, N> FormatEvent<S, N> for TextWithSpanIds
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing_core::Event<'_>,
    ) -> fmt::Result {
        self.timer.format_time(&mut writer)?;
        if let Some(span) = ctx.parent_span() {
            let span_id = span.id().into_u64();
            let trace_id = span
                .scope()
                .from_root()
                .next()
                .map(|root| root.id().into_u64())
                .unwrap_or(span_id);
            write!(writer, " trace_id={} span_id={}", trace_id, span_id)?;

            let ext = span.extensions();
            match ext.get::<FormattedFields<N>>() {
                Some(fields) if !fields.is_empty() => {
                    write!(writer, " [{}{{{}}}]", span.name(), fields)?
                }
                _ => write!(writer, " [{}]", span.name())?,
            }
        }

        write!(writer, " {}:", event.metadata().level())?;
        if self.with_target {
            write!(writer, " {}:", event.metadata().target())?;
        }
        write!(writer, " ")?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone)]
    struct VecWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for VecWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture(formatter: TextWithSpanIds, f: impl FnOnce()) -> String {
        let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
        let writer = {
            let sink = Arc::clone(&sink);
            move || VecWriter(Arc::clone(&sink))
        };
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .event_format(formatter)
                .with_writer(writer)
                .with_ansi(false),
        );
        tracing::subscriber::with_default(subscriber, f);
        let out = sink.lock().unwrap().clone();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn session_lines_carry_ids_and_span_fields() {
        let output = capture(TextWithSpanIds::new(), || {
            let span = tracing::info_span!("session", mode = "polling", client = 3);
            let _guard = span.enter();
            tracing::warn!(error = "timeout", "poll failed");
        });
        assert!(output.contains("trace_id="));
        assert!(output.contains("span_id="));
        assert!(output.contains("[session{mode=\"polling\" client=3}]"), "{}", output);
        assert!(output.contains("WARN"));
        assert!(output.contains("poll failed"));
    }

    #[test]
    fn events_outside_spans_have_no_prefix() {
        let output = capture(TextWithSpanIds::new().with_target(false), || {
            tracing::info!("run started");
        });
        assert!(!output.contains("trace_id="));
        assert!(!output.contains("log_format"));
        assert!(output.contains("INFO: run started"));
    }
}
