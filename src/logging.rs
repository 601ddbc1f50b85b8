//! Tracing and logging infrastructure.
//!
//! Call [`setup_tracing`] once at application startup. Output is plain text
//! suitable for log aggregation, filtered through the `RUST_LOG` environment
//! variable (default `info`):
//!
//! ```text
//! INFO confluent_gateway::clients: Connecting Kafka producer
//! ```

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Initializes the tracing subscriber with console output.
///
/// # Panics
///
/// Panics if called more than once (the tracing subscriber can only be set
/// once per process).
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(ConsoleLogFormat)
        .with_filter(filter)
        .boxed();

    Registry::default().with(console_layer).init();
    tracing::info!("Tracing initialized successfully");
}

/// Plain event formatter: `LEVEL target: message`.
///
/// The crate logs plain events (client construction, teardown, rebinds) and
/// opens no spans of its own, so the format carries no span scope.
struct ConsoleLogFormat;

impl<S, N> FormatEvent<S, N> for ConsoleLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        write!(writer, "{:<5} {}: ", metadata.level(), metadata.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
