//! Tests for the Prometheus metrics exposition
//!
//! Metrics live in a process-wide registry, so assertions compare deltas
//! rather than absolute values.

mod common;

use cardio_risk_ai::metrics::{gather_metrics, init_metrics, PROMETHEUS_REGISTRY};
use cardio_risk_ai::models::find_sample;
use common::{loaded_service, metric_value, parse_prometheus_output, validate_exposition_format};

#[test]
fn test_init_metrics_is_idempotent() {
    init_metrics().unwrap();
    init_metrics().unwrap();
    assert!(!PROMETHEUS_REGISTRY.gather().is_empty());
}

#[test]
fn test_exposition_format_is_valid() {
    init_metrics().unwrap();
    let output = gather_metrics();
    validate_exposition_format(&output).unwrap();
}

#[test]
fn test_metric_names_are_namespaced() {
    init_metrics().unwrap();
    for family in PROMETHEUS_REGISTRY.gather() {
        let name = family.get_name();
        assert!(name.starts_with("cardio_risk_ai_"), "{}", name);
        if family.get_field_type() == prometheus::proto::MetricType::COUNTER {
            assert!(name.ends_with("_total"), "counter {} lacks _total", name);
        }
    }
}

#[test]
fn test_build_info_is_exported() {
    init_metrics().unwrap();
    let metrics = parse_prometheus_output(&gather_metrics());
    let build_info = metrics
        .get("cardio_risk_ai_build_info")
        .expect("build info missing");
    assert!(build_info[0].contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_predictions_are_counted_by_risk_class() {
    init_metrics().unwrap();
    let service = loaded_service().await;
    let label = r#"risk_class="high""#;

    let before = metric_value(&gather_metrics(), "cardio_risk_ai_predictions_total", label)
        .unwrap_or(0.0);
    let patient = find_sample("high-risk").unwrap().patient;
    service.predict(&patient).await.unwrap();
    service.predict(&patient).await.unwrap();

    let output = gather_metrics();
    let after = metric_value(&output, "cardio_risk_ai_predictions_total", label).unwrap();
    assert!(after - before >= 2.0);

    let loads = metric_value(&output, "cardio_risk_ai_artifact_loads_total", r#"status="success""#)
        .unwrap();
    assert!(loads >= 1.0);
}
