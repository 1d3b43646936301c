use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use papers_portal_api::{config::Config, create_router, services::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let tracer_provider = init_telemetry()?;
    let otel_layer = tracer_provider.as_ref().map(|provider| {
        use opentelemetry::trace::TracerProvider as _;
        tracing_opentelemetry::layer().with_tracer(provider.tracer("papers-portal-api"))
    });

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let fmt_layer = if json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "papers_portal_api=debug,tower_http=debug".into()),
        )
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    tracing::info!("Starting papers portal API");

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        environment = %std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string()),
        record_store = ?config.record_store.backend,
        blob_store = ?config.blob_store.backend,
        "Configuration loaded"
    );

    let bind_addr = config.bind_addr.clone();
    let app_state = Arc::new(
        AppState::from_config(config)
            .await
            .context("Failed to initialize application state")?,
    );

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(provider) = tracer_provider {
        tracing::info!("Shutting down OpenTelemetry");
        if let Err(e) = provider.shutdown() {
            eprintln!("OpenTelemetry shutdown failed: {}", e);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

/// OTLP export is on only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn init_telemetry() -> anyhow::Result<Option<opentelemetry_sdk::trace::SdkTracerProvider>> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    let Ok(otlp_endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()
        .context("Failed to create OTLP exporter")?;

    let resource = Resource::builder_empty()
        .with_service_name("papers-portal-api")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(Some(provider))
}
