use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Custom formatter that wraps each field in brackets for better readability
/// Format: [TIMESTAMP] [LEVEL] [STAGE] [TARGET: FILE:LINE]: MESSAGE
///
/// The stage slot holds the innermost span name (`validate`, `balance`,
/// `partition`, ...) when the event is emitted inside one.
pub struct BracketedFormatter;

impl<S, N> FormatEvent<S, N> for BracketedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let now = chrono::Local::now();
        write!(writer, "[{}]  ", now.format("%Y-%m-%dT%H:%M:%S%.6f"))?;

        write!(writer, "[{:5}] ", metadata.level())?;

        let stage = match ctx.event_scope() {
            Some(scope) => scope
                .from_root()
                .last()
                .map(|span| span.name())
                .unwrap_or("main"),
            None => metadata.target().rsplit("::").next().unwrap_or("main"),
        };
        write!(writer, "[{}] ", stage)?;

        if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
            write!(writer, "[{}: {}:{}]: ", metadata.target(), file, line)?;
        } else {
            write!(writer, "[{}]: ", metadata.target())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
