use opentelemetry::trace::TracerProvider as _;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Installs the global tracing subscriber
///
/// Filtering follows `RUST_LOG` and falls back to `info`. If `OTEL_STDOUT` is
/// set to `true`, spans are additionally exported through OpenTelemetry.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(true);

    let otel_layer = if std::env::var("OTEL_STDOUT").map_or(false, |v| v == "true") {
        let provider = opentelemetry_sdk::trace::TracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("aether");
        opentelemetry::global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
    } else {
        None
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer);
    if let Err(e) = registry.try_init() {
        eprintln!("Tracing already initialized: {}", e);
    }
}

pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
