use cardio_risk_ai::{
    api::{build_router, AppState},
    config::Config,
    ml::PredictorService,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "cardio_risk_ai={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Some(e) = config_error {
        tracing::warn!("Failed to load configuration: {}", e);
        tracing::warn!("Using default configuration");
    }
    config.inference.validate().map_err(|e| {
        tracing::error!("Invalid inference configuration: {}", e);
        e
    })?;

    tracing::info!(
        service = %config.observability.service_name,
        "Starting Cardio Risk AI v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = cardio_risk_ai::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Load model artifacts
    let service = Arc::new(PredictorService::new(
        config.artifacts.clone(),
        config.inference.clone(),
    ));
    if config.server.load_on_startup {
        match service.load_artifacts().await {
            Ok(info) => tracing::info!(
                version = %info.model_version,
                trees = info.n_trees,
                features = info.n_features,
                "Model artifacts loaded"
            ),
            Err(e) => {
                tracing::error!("Failed to load model artifacts: {}", e);
                tracing::warn!("Serving without a model; POST /model/reload once artifacts are in place");
            }
        }
    }

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let app = build_router(AppState::new(service, config));
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Prediction: POST http://{}/predict", http_addr);
    tracing::info!("   Explanation: POST http://{}/shap", http_addr);
    tracing::info!("   Metrics: http://{}/metrics", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
