use anyhow::{Context, Error, Result};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "parcel-sync";

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global subscriber once: `EnvFilter` (default `info`) plus a
/// JSON fmt layer, and an OTLP layer when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// # Errors
/// Fails when a global subscriber is already installed by someone else.
pub fn init() -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

        let otel = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .map(|endpoint| init_tracer(&endpoint).map(|tracer| (tracer, endpoint)));

        match otel {
            Some(Ok((tracer, endpoint))) => {
                let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(otel_layer)
                    .try_init()
                    .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;
                info!(otel_enabled = true, endpoint = %endpoint, "tracing initialized with OpenTelemetry");
            }
            other => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .try_init()
                    .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;
                match other {
                    Some(Err(error)) => warn!(
                        otel_enabled = false,
                        error = %format!("{error:#}"),
                        "tracing initialized without OpenTelemetry (init failed)"
                    ),
                    _ => info!(otel_enabled = false, "standard tracing initialized"),
                }
            }
        }

        Ok::<(), Error>(())
    })?;
    Ok(())
}

/// Builds the OTLP tracer. `OTEL_SAMPLING_RATIO` controls sampling (default 1.0).
fn init_tracer(endpoint: &str) -> Result<SdkTracer> {
    let sampling_ratio = std::env::var("OTEL_SAMPLING_RATIO")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(1.0);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::TraceIdRatioBased(sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(tracer_provider);

    Ok(tracer)
}
