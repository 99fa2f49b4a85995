/// Prometheus metrics for the risk prediction service.
///
/// This module provides:
/// - Request/response tracking for the HTTP API
/// - Prediction counts by risk class and probability distribution
/// - Inference and SHAP explanation latency
/// - Model artifact load status
/// - Error tracking
///
/// # Example
/// ```no_run
/// use cardio_risk_ai::metrics::PREDICTIONS_TOTAL;
///
/// PREDICTIONS_TOTAL.with_label_values(&["high"]).inc();
/// ```

mod config;
pub mod middleware;

pub use config::MetricsConfig;
pub use middleware::{track_timing, MetricsLayer, PROCESS_TIME_HEADER};

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
};

const NAMESPACE: &str = "cardio_risk_ai";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5, 5.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Number of HTTP requests currently being served
    pub static ref HTTP_REQUESTS_IN_FLIGHT: Gauge = Gauge::with_opts(
        Opts::new("http_requests_in_flight", "Number of HTTP requests being served")
            .namespace(NAMESPACE)
    ).expect("Failed to create HTTP_REQUESTS_IN_FLIGHT metric");

    // ============================================================================
    // Prediction Metrics
    // ============================================================================

    /// Total number of predictions served
    ///
    /// Labels: risk_class (low/moderate/high)
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of risk predictions")
            .namespace(NAMESPACE),
        &["risk_class"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Distribution of predicted probabilities
    pub static ref PREDICTION_PROBABILITY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_probability",
            "Predicted probability of heart disease"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0])
    ).expect("Failed to create PREDICTION_PROBABILITY metric");

    /// Model inference duration in seconds
    ///
    /// Labels: operation (predict/batch)
    pub static ref INFERENCE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "inference_duration_seconds",
            "Model inference duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05, 0.1]),
        &["operation"]
    ).expect("Failed to create INFERENCE_DURATION_SECONDS metric");

    /// SHAP explanation duration in seconds
    pub static ref EXPLANATION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "explanation_duration_seconds",
            "TreeSHAP explanation duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25])
    ).expect("Failed to create EXPLANATION_DURATION_SECONDS metric");

    /// Number of patients per batch request
    pub static ref BATCH_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new("batch_size", "Number of patients per batch request")
            .namespace(NAMESPACE)
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0])
    ).expect("Failed to create BATCH_SIZE metric");

    /// Total number of cohort comparisons
    pub static ref COHORT_COMPARISONS_TOTAL: Counter = Counter::with_opts(
        Opts::new("cohort_comparisons_total", "Total number of cohort comparisons")
            .namespace(NAMESPACE)
    ).expect("Failed to create COHORT_COMPARISONS_TOTAL metric");

    // ============================================================================
    // Model Metrics
    // ============================================================================

    /// 1 when model artifacts are loaded
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether model artifacts are loaded")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");

    /// Artifact load attempts
    ///
    /// Labels: status (success/failure)
    pub static ref ARTIFACT_LOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("artifact_loads_total", "Total number of artifact load attempts")
            .namespace(NAMESPACE),
        &["status"]
    ).expect("Failed to create ARTIFACT_LOADS_TOTAL metric");

    // ============================================================================
    // Error Metrics
    // ============================================================================

    /// Total number of errors
    ///
    /// Labels: component, error_type
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("errors_total", "Total number of errors")
            .namespace(NAMESPACE),
        &["component", "error_type"]
    ).expect("Failed to create ERRORS_TOTAL metric");

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Application build info
    ///
    /// Labels: version, git_commit
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace(NAMESPACE),
        &["version", "git_commit"]
    ).expect("Failed to create BUILD_INFO metric");

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = Gauge::with_opts(
        Opts::new("uptime_seconds", "Application uptime in seconds")
            .namespace(NAMESPACE)
    ).expect("Failed to create UPTIME_SECONDS metric");
}

fn register<C>(collector: &C) -> Result<(), prometheus::Error>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    match PROMETHEUS_REGISTRY.register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics already registered are skipped.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(&*HTTP_REQUESTS_TOTAL)?;
    register(&*HTTP_REQUEST_DURATION_SECONDS)?;
    register(&*HTTP_REQUESTS_IN_FLIGHT)?;

    register(&*PREDICTIONS_TOTAL)?;
    register(&*PREDICTION_PROBABILITY)?;
    register(&*INFERENCE_DURATION_SECONDS)?;
    register(&*EXPLANATION_DURATION_SECONDS)?;
    register(&*BATCH_SIZE)?;
    register(&*COHORT_COMPARISONS_TOTAL)?;

    register(&*MODEL_LOADED)?;
    register(&*ARTIFACT_LOADS_TOTAL)?;

    register(&*ERRORS_TOTAL)?;

    register(&*BUILD_INFO)?;
    register(&*UPTIME_SECONDS)?;

    BUILD_INFO
        .with_label_values(&[
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_COMMIT").unwrap_or("unknown"),
        ])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Encode all registered metrics in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
