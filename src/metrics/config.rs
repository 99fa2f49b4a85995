use crate::config::ObservabilityConfig;

/// Settings for HTTP metrics collection
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Record request duration histograms
    pub enable_histograms: bool,

    /// Paths to exclude from HTTP metrics
    pub excluded_paths: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_histograms: true,
            excluded_paths: vec!["/metrics".to_string()],
        }
    }
}

impl MetricsConfig {
    pub fn from_observability(config: &ObservabilityConfig) -> Self {
        Self {
            enabled: config.prometheus_enabled,
            ..Default::default()
        }
    }

    /// Check if a path should be excluded from metrics
    pub fn is_path_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|excluded| {
            path == excluded || path.starts_with(&format!("{}/", excluded))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(config.enable_histograms);
        assert!(config.is_path_excluded("/metrics"));
    }

    #[test]
    fn test_path_exclusion() {
        let config = MetricsConfig {
            excluded_paths: vec!["/metrics".to_string(), "/health".to_string()],
            ..Default::default()
        };
        assert!(config.is_path_excluded("/health"));
        assert!(config.is_path_excluded("/health/ready"));
        assert!(!config.is_path_excluded("/healthz"));
        assert!(!config.is_path_excluded("/predict"));
    }

    #[test]
    fn test_follows_observability_switch() {
        let observability = ObservabilityConfig {
            prometheus_enabled: false,
            ..Default::default()
        };
        assert!(!MetricsConfig::from_observability(&observability).enabled);
    }
}
