//! Diagnostic stream setup: one `[Level] message` line per event on stderr.

use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Event formatter without timestamps, targets or spans.
pub struct BracketedLevel;

fn level_tag(level: &Level) -> &'static str {
    if *level == Level::ERROR {
        "Error"
    } else if *level == Level::WARN {
        "Warn"
    } else if *level == Level::INFO {
        "Info"
    } else if *level == Level::DEBUG {
        "Debug"
    } else {
        "Trace"
    }
}

impl<S, N> FormatEvent<S, N> for BracketedLevel
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
        write!(writer, "[{}] ", level_tag(event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the subscriber. `RUST_LOG` wins over the quiet flag.
pub fn setup_logging(quiet: bool) {
    let level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(BracketedLevel)
                .with_writer(std::io::stderr),
        )
        .init();
}
