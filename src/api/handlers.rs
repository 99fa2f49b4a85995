use crate::api::AppState;
use crate::cohort::CohortComparison;
use crate::error::{AppError, Result};
use crate::metrics::{gather_metrics, UPTIME_SECONDS};
use crate::ml::ModelInfo;
use crate::models::*;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    BoxError, Json,
};
use serde::{Deserialize, Serialize};

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

#[derive(Debug, Serialize, Deserialize)]
pub struct AppInfo {
    pub app: String,
    pub version: String,
    pub message: String,
}

/// Application info
pub async fn root() -> Json<AppInfo> {
    Json(AppInfo {
        app: "Cardio Risk AI".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Heart disease risk prediction API is running.".to_string(),
    })
}

async fn health(state: &AppState) -> HealthResponse {
    let model_loaded = state.service.is_loaded().await;
    HealthResponse {
        status: (if model_loaded { "healthy" } else { "degraded" }).to_string(),
        model_loaded,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health(&state).await)
}

/// Liveness: the process is serving requests
pub async fn liveness(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut response = health(&state).await;
    response.status = "alive".to_string();
    Json(response)
}

/// Readiness: 503 until the model is loaded
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let response = health(&state).await;
    let status = if response.model_loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Predict heart disease risk for one patient
pub async fn predict(
    State(state): State<AppState>,
    payload: JsonBody<PatientRecord>,
) -> Result<Json<PredictionResponse>> {
    let Json(patient) = payload?;
    let response = state.service.predict(&patient).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchPredictionRequest {
    pub patients: Vec<PatientRecord>,
}

/// Predict many patients in one request
pub async fn predict_batch(
    State(state): State<AppState>,
    payload: JsonBody<BatchPredictionRequest>,
) -> Result<Json<BatchPredictionResponse>> {
    let Json(request) = payload?;
    let response = state.service.predict_batch(&request.patients).await?;
    Ok(Json(response))
}

/// SHAP explanation for one patient
pub async fn explain(
    State(state): State<AppState>,
    payload: JsonBody<PatientRecord>,
) -> Result<Json<ShapResponse>> {
    let Json(patient) = payload?;
    let response = state.service.explain(&patient).await?;
    Ok(Json(response))
}

/// Compare a patient with the reference cohort
pub async fn compare_cohort(
    State(state): State<AppState>,
    payload: JsonBody<PatientRecord>,
) -> Result<Json<CohortComparison>> {
    let Json(patient) = payload?;
    let comparison = state.service.compare_to_cohort(&patient).await?;
    Ok(Json(comparison))
}

/// Model metadata and evaluation metrics
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfo>> {
    Ok(Json(state.service.model_info().await?))
}

/// Reload artifacts from disk
pub async fn reload_model(State(state): State<AppState>) -> Result<Json<ModelInfo>> {
    tracing::info!("Model reload requested");
    Ok(Json(state.service.load_artifacts().await?))
}

/// Built-in example patients
pub async fn list_samples() -> Json<Vec<SamplePatient>> {
    Json(sample_patients())
}

/// Prometheus exposition
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    if !state.config.observability.prometheus_enabled {
        return Err(AppError::NotFound("metrics are disabled".to_string()));
    }
    UPTIME_SECONDS.set(state.started_at.elapsed().as_secs_f64());
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    ))
}

/// Map middleware failures, such as the request timeout, to the error envelope
pub async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout("request exceeded the server timeout".to_string())
    } else {
        AppError::Internal(err.to_string())
    }
}
