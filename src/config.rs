use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Model artifact locations
    pub artifacts: ArtifactsConfig,

    /// Inference and risk stratification settings
    pub inference: InferenceConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CARDIO_AI_)
            .add_source(
                config::Environment::with_prefix("CARDIO_AI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            artifacts: ArtifactsConfig::default(),
            inference: InferenceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Load artifacts at startup
    #[serde(default = "default_true")]
    pub load_on_startup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
            load_on_startup: true,
        }
    }
}

/// Where the trained model bundle lives on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Artifact directory
    #[serde(default = "default_artifact_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default = "default_scaler_file")]
    pub scaler_file: String,

    #[serde(default = "default_feature_names_file")]
    pub feature_names_file: String,

    #[serde(default = "default_numerical_features_file")]
    pub numerical_features_file: String,

    #[serde(default = "default_metrics_file")]
    pub metrics_file: String,

    /// Cohort file; the service runs without cohort comparisons when absent
    #[serde(default = "default_cohort_file")]
    pub cohort_file: String,
}

impl ArtifactsConfig {
    /// Artifacts with default file names under `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(&self.scaler_file)
    }

    pub fn feature_names_path(&self) -> PathBuf {
        self.dir.join(&self.feature_names_file)
    }

    pub fn numerical_features_path(&self) -> PathBuf {
        self.dir.join(&self.numerical_features_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(&self.metrics_file)
    }

    pub fn cohort_path(&self) -> PathBuf {
        self.dir.join(&self.cohort_file)
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
            model_file: default_model_file(),
            scaler_file: default_scaler_file(),
            feature_names_file: default_feature_names_file(),
            numerical_features_file: default_numerical_features_file(),
            metrics_file: default_metrics_file(),
            cohort_file: default_cohort_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Probability at or above which the binary prediction is positive
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,

    /// Probabilities below this are Low Risk
    #[serde(default = "default_low_risk_threshold")]
    pub low_risk_threshold: f64,

    /// Probabilities at or above this are High Risk
    #[serde(default = "default_high_risk_threshold")]
    pub high_risk_threshold: f64,

    /// Number of SHAP drivers returned in `top_features`
    #[serde(default = "default_top_features")]
    pub top_features: usize,

    /// Maximum patients per batch request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl InferenceConfig {
    /// Check threshold ordering
    pub fn validate(&self) -> Result<(), String> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.decision_threshold)
            || !in_unit(self.low_risk_threshold)
            || !in_unit(self.high_risk_threshold)
        {
            return Err("thresholds must lie within [0, 1]".to_string());
        }
        if self.low_risk_threshold > self.high_risk_threshold {
            return Err(format!(
                "low_risk_threshold ({}) exceeds high_risk_threshold ({})",
                self.low_risk_threshold, self.high_risk_threshold
            ));
        }
        if self.max_batch_size == 0 {
            return Err("max_batch_size must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            decision_threshold: default_decision_threshold(),
            low_risk_threshold: default_low_risk_threshold(),
            high_risk_threshold: default_high_risk_threshold(),
            top_features: default_top_features(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_model_file() -> String {
    "xgb_model.json".to_string()
}

fn default_scaler_file() -> String {
    "scaler.json".to_string()
}

fn default_feature_names_file() -> String {
    "feature_names.json".to_string()
}

fn default_numerical_features_file() -> String {
    "numerical_features.json".to_string()
}

fn default_metrics_file() -> String {
    "metrics.json".to_string()
}

fn default_cohort_file() -> String {
    "cohort.json".to_string()
}

fn default_decision_threshold() -> f64 {
    0.5
}

fn default_low_risk_threshold() -> f64 {
    0.3
}

fn default_high_risk_threshold() -> f64 {
    0.7
}

fn default_top_features() -> usize {
    10
}

fn default_max_batch_size() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "cardio-risk-ai".to_string()
}

fn default_true() -> bool {
    true
}
