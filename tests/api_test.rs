//! HTTP API tests against a router with the demo model loaded

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use cardio_risk_ai::{
    api::{build_router, AppState},
    metrics::PROCESS_TIME_HEADER,
    ml::PredictorService,
    models::{find_sample, PatientRecord},
};
use common::{config_for, copy_demo_artifacts, test_app};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn sample_json(name: &str) -> Value {
    serde_json::to_value(find_sample(name).unwrap().patient).unwrap()
}

#[tokio::test]
async fn test_health_with_model() {
    let response = test_app().await.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_readiness_with_model() {
    let response = test_app().await.oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_predict_endpoint() {
    let response = test_app()
        .await
        .oneshot(post_json("/predict", &sample_json("high-risk")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(PROCESS_TIME_HEADER));

    let body = body_json(response).await;
    assert_eq!(body["prediction"], 1);
    assert_eq!(body["risk_class"], "High Risk");
    assert_eq!(body["model_version"], "1.0.0");
    let probability = body["probability"].as_f64().unwrap();
    assert!(probability > 0.7 && probability < 1.0);
    assert!(body["clinical_summary"].as_str().unwrap().starts_with("####"));
}

#[tokio::test]
async fn test_predict_rejects_out_of_range_values() {
    let mut patient = sample_json("low-risk");
    patient["age"] = json!(12);

    let response = test_app()
        .await
        .oneshot(post_json("/predict", &patient))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["status"], 400);
}

#[tokio::test]
async fn test_predict_rejects_missing_fields() {
    let response = test_app()
        .await
        .oneshot(post_json("/predict", &json!({"age": 50, "sex": 1})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_endpoint_preserves_order() {
    let request = json!({
        "patients": [sample_json("high-risk"), sample_json("low-risk"), sample_json("moderate-risk")]
    });
    let response = test_app()
        .await
        .oneshot(post_json("/predict/batch", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["count"], 3);
    let classes: Vec<&str> = body["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["risk_class"].as_str().unwrap())
        .collect();
    assert_eq!(classes, ["High Risk", "Low Risk", "Moderate Risk"]);
}

#[tokio::test]
async fn test_shap_endpoint() {
    let response = test_app()
        .await
        .oneshot(post_json("/shap", &sample_json("moderate-risk")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let contributions = body["contributions"].as_array().unwrap();
    assert_eq!(contributions.len(), 20);

    let total: f64 = contributions
        .iter()
        .map(|c| c["shap_value"].as_f64().unwrap())
        .sum();
    let base = body["base_value"].as_f64().unwrap();
    let output = body["output_value"].as_f64().unwrap();
    assert!((base + total - output).abs() < 1e-6);

    let top = &body["top_features"][0];
    assert!(["increases", "decreases"].contains(&top["impact"].as_str().unwrap()));
    assert!(!top["clinical_explanation"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_cohort_endpoint() {
    let response = test_app()
        .await
        .oneshot(post_json("/cohort/compare", &sample_json("low-risk")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["cohort_size"], 303);
    assert_eq!(body["vitals"].as_array().unwrap().len(), 5);
    assert_eq!(body["vitals"][0]["feature"], "age");
}

#[tokio::test]
async fn test_model_info_endpoint() {
    let response = test_app().await.oneshot(get("/model/info")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["n_trees"], 6);
    assert_eq!(body["feature_names"].as_array().unwrap().len(), 20);
    assert_eq!(body["thresholds"]["low_risk"], 0.3);
    assert_eq!(body["thresholds"]["high_risk"], 0.7);
    assert!(body["metrics"]["accuracy"].is_number());
}

#[tokio::test]
async fn test_reload_endpoint() {
    let dir = copy_demo_artifacts();
    let config = config_for(dir.path());
    let service = Arc::new(PredictorService::new(
        config.artifacts.clone(),
        config.inference.clone(),
    ));
    let app = build_router(AppState::new(service.clone(), config));

    assert!(!service.is_loaded().await);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/model/reload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(service.is_loaded().await);

    std::fs::remove_file(dir.path().join("scaler.json")).unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/model/reload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "ARTIFACT_ERROR");
    assert!(service.is_loaded().await);
}

#[tokio::test]
async fn test_default_patient_round_trips_through_api() {
    let patient = serde_json::to_value(PatientRecord::default()).unwrap();
    let response = test_app()
        .await
        .oneshot(post_json("/predict", &patient))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    cardio_risk_ai::metrics::init_metrics().unwrap();
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/predict", &sample_json("low-risk")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("cardio_risk_ai_predictions_total"));
    assert!(text.contains("cardio_risk_ai_model_loaded 1"));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = test_app().await;

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/predict")
        .header("origin", "http://dashboard.example.org")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "*");
    assert_eq!(headers["access-control-allow-headers"], "*");

    let mut request = post_json("/predict", &sample_json("low-risk"));
    request
        .headers_mut()
        .insert("origin", "http://dashboard.example.org".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
