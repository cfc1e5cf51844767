//! Observability wiring: JSON logs on stderr, optional OTLP span export.
//!
//! `RUST_LOG` controls the filter (default `info`). When an OTLP endpoint is
//! given, spans are also batched to it over gRPC; the returned provider must
//! be shut down before exit to flush them.

use anyhow::Context as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "apiwire";

/// Installs the global subscriber.
pub fn init(otlp_endpoint: Option<&str>) -> anyhow::Result<Option<TracerProvider>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr);

    let (provider, otel) = match otlp_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()
                .context("building OTLP span exporter")?;
            let provider = TracerProvider::builder()
                .with_batch_exporter(exporter, runtime::Tokio)
                .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
                .build();
            let tracer = provider.tracer(SERVICE_NAME);
            (
                Some(provider),
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(otel)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(provider)
}

/// Flushes and stops span export.
pub fn shutdown(provider: Option<TracerProvider>) {
    if let Some(provider) = provider {
        if let Err(err) = provider.shutdown() {
            eprintln!("failed to flush spans: {err}");
        }
    }
}
