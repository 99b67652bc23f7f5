//! Telemetry setup for OpenTelemetry integration

use anyhow::Result;
use tracing_subscriber::{Layer, Registry};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the OpenTelemetry layer if an exporter endpoint is configured
///
/// Runs before the subscriber is installed, so problems are returned for the
/// caller to log once logging is up.
///
/// # Environment Variables
///
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
/// - `OTEL_SERVICE_NAME`: Service name (default: dbguard)
///
/// # Example
///
/// ```text
/// OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 \
/// OTEL_SERVICE_NAME=dbguard-staging \
///     ./dbguard
/// ```
pub fn layer() -> Result<Option<BoxedLayer>> {
    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };

    #[cfg(feature = "telemetry")]
    {
        otel_layer(&endpoint).map(Some)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        Err(anyhow::anyhow!(
            "OTEL_EXPORTER_OTLP_ENDPOINT={} set but feature 'telemetry' not enabled \
             (rebuild with: cargo build --features telemetry)",
            endpoint
        ))
    }
}

#[cfg(feature = "telemetry")]
fn otel_layer(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::TracerProvider;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "dbguard".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

/// Flush pending spans on shutdown
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
