use color_eyre::Result;
use color_eyre::eyre::Context;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Spans are exported over OTLP only when
/// `otlp_endpoint` is set; the returned provider must be shut down on exit so
/// the batch exporter flushes.
pub fn init_tracing(
    service_name: &str,
    otlp_endpoint: Option<&str>,
    level: &str,
) -> Result<Option<SdkTracerProvider>> {
    let filter_layer = filter(level)?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    let Some(endpoint) = otlp_endpoint else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
        return Ok(None);
    };

    let resource = Resource::builder()
        .with_attributes(vec![KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            service_name.to_string(),
        )])
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .wrap_err("Failed to create OTLP span exporter")?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();
    opentelemetry::global::set_tracer_provider(tracer_provider.clone());
    let tracer = opentelemetry::global::tracer("tuneproxy");

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(Some(tracer_provider))
}

/// A bare level such as `debug` applies to this crate and the HTTP layer
/// only; anything else is taken as a full `EnvFilter` directive.
fn filter(level: &str) -> Result<EnvFilter> {
    let directive = match level {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => {
            format!("tuneproxy={level},tower_http={level},warn")
        }
        other => other.to_string(),
    };
    EnvFilter::try_new(&directive).wrap_err_with(|| format!("Invalid log level: {level}"))
}
