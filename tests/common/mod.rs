//! Shared helpers for integration tests
//!
//! Tests run against the demo artifact bundle checked in under `artifacts/`,
//! copied into a temporary directory when a test needs to modify it.

#![allow(dead_code)]

use cardio_risk_ai::{
    api::{build_router, AppState},
    config::{ArtifactsConfig, Config},
    ml::PredictorService,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const ARTIFACT_FILES: [&str; 6] = [
    "xgb_model.json",
    "scaler.json",
    "feature_names.json",
    "numerical_features.json",
    "metrics.json",
    "cohort.json",
];

/// The demo artifact bundle shipped with the repository
pub fn demo_artifacts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts")
}

/// Copy the demo bundle into a fresh temporary directory
pub fn copy_demo_artifacts() -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in ARTIFACT_FILES {
        std::fs::copy(demo_artifacts_dir().join(file), dir.path().join(file)).unwrap();
    }
    dir
}

/// Config pointing at the given artifact directory
pub fn config_for(dir: impl Into<PathBuf>) -> Config {
    Config {
        artifacts: ArtifactsConfig::in_dir(dir),
        ..Config::default()
    }
}

/// Service with the demo bundle loaded
pub async fn loaded_service() -> Arc<PredictorService> {
    let config = config_for(demo_artifacts_dir());
    let service = Arc::new(PredictorService::new(
        config.artifacts.clone(),
        config.inference.clone(),
    ));
    service.load_artifacts().await.unwrap();
    service
}

/// Router backed by a loaded service
pub async fn test_app() -> axum::Router {
    let config = config_for(demo_artifacts_dir());
    let service = loaded_service().await;
    build_router(AppState::new(service, config))
}

/// Group Prometheus exposition lines by metric family
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            if let Some(name) = line.split_whitespace().nth(2) {
                current_metric = name.to_string();
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}

/// Value of the first sample line of `metric` whose labels contain `label`
pub fn metric_value(output: &str, metric: &str, label: &str) -> Option<f64> {
    output
        .lines()
        .filter(|line| line.starts_with(metric) && line.contains(label))
        .find_map(|line| line.split_whitespace().last()?.parse::<f64>().ok())
}

/// HELP lines must be followed by a TYPE line for the same metric
pub fn validate_exposition_format(output: &str) -> Result<(), String> {
    let lines: Vec<&str> = output.lines().map(str::trim).collect();

    for (i, line) in lines.iter().enumerate() {
        if let Some(rest) = line.strip_prefix("# HELP ") {
            let name = rest.split_whitespace().next().unwrap_or_default();
            let expected = format!("# TYPE {} ", name);
            if !lines.get(i + 1).is_some_and(|next| next.starts_with(&expected)) {
                return Err(format!("line {}: HELP not followed by TYPE for {}", i + 1, name));
            }
        }
        if let Some(rest) = line.strip_prefix("# TYPE ") {
            let kind = rest.split_whitespace().nth(1).unwrap_or_default();
            if !["counter", "gauge", "histogram", "summary", "untyped"].contains(&kind) {
                return Err(format!("line {}: invalid metric type '{}'", i + 1, kind));
            }
        }
    }

    Ok(())
}
