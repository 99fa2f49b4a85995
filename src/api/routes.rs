use crate::api::{handlers, AppState};
use crate::metrics::{track_timing, MetricsConfig, MetricsLayer};
use axum::{
    error_handling::HandleErrorLayer,
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let metrics = MetricsConfig::from_observability(&state.config.observability);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/", get(handlers::root))
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::liveness))
        .route("/health/ready", get(handlers::readiness))
        // Prediction and explanation
        .route("/predict", post(handlers::predict))
        .route("/predict/batch", post(handlers::predict_batch))
        .route("/shap", post(handlers::explain))
        .route("/cohort/compare", post(handlers::compare_cohort))
        // Model management
        .route("/model/info", get(handlers::model_info))
        .route("/model/reload", post(handlers::reload_model))
        .route("/samples", get(handlers::list_samples))
        .route("/metrics", get(handlers::metrics))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handlers::handle_middleware_error))
                .layer(TimeoutLayer::new(timeout)),
        )
        .layer(MetricsLayer::new(metrics))
        .layer(middleware::from_fn(track_timing))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
