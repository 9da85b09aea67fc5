//! # Ledger Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize logging and optional OTLP trace export
//! - Build the transaction store, seed the ledger, pick a settlement gateway
//! - Create the transaction service
//! - Start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_core::{KeyRegistry, Ledger, ServiceConfig, TransactionService, inbound::HttpServer};
use ledger_repo::build_store;
use ledger_types::SettlementGateway;
use settlement_gateway::{HttpSettlementGateway, RecordingGateway};

fn init_tracer(endpoint: &str) -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("ledger-service"), provider))
}

fn settlement_gateway(config: &config::Config) -> anyhow::Result<Arc<dyn SettlementGateway>> {
    match &config.settlement_url {
        Some(url) => {
            tracing::info!("Forwarding transactions to {}", url);
            Ok(Arc::new(HttpSettlementGateway::new(
                url.clone(),
                config.settlement_timeout,
            )?))
        }
        None => {
            tracing::warn!("SETTLEMENT_URL not set, using the in-process recording gateway");
            Ok(Arc::new(RecordingGateway::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize OpenTelemetry tracing when an endpoint is configured
    let otel = match &config.otlp_endpoint {
        Some(endpoint) => Some(init_tracer(endpoint)?),
        None => None,
    };
    let telemetry = otel
        .as_ref()
        .map(|(tracer, _)| tracing_opentelemetry::layer().with_tracer(tracer.clone()));

    let (text_logs, json_logs) = if config.json_logs {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ledger_app=debug,ledger_core=debug".into()),
        )
        .with(text_logs)
        .with(json_logs)
        .with(telemetry)
        .init();

    tracing::info!("Starting ledger server on port {}", config.port);
    tracing::info!("Using transaction store: {}", config.database_url);

    // Build the transaction store (handles connection and migration)
    let store = build_store(&config.database_url).await?;

    // Seed the ledger
    let ledger = Ledger::with_accounts(config.seed_accounts.iter().copied())?;
    tracing::info!("Seeded {} accounts", ledger.len());

    // Create the transaction service
    let service = TransactionService::new(
        Arc::new(store),
        Arc::new(ledger),
        settlement_gateway(&config)?,
        Arc::new(KeyRegistry::new()),
    )
    .with_config(ServiceConfig {
        forward_timeout: config.settlement_timeout,
    });

    // Create and run the HTTP server
    let server = HttpServer::new(service);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    if let Some((_, provider)) = otel {
        let _ = provider.shutdown();
    }
    Ok(())
}
