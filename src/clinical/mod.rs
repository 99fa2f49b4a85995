/// Clinical interpretation of model outputs
///
/// This module turns probabilities and SHAP attributions into what a
/// clinician reads:
/// - Risk stratification and binary decision
/// - Per-feature explanations
/// - Markdown summary with findings and recommendations

pub mod explanations;
pub mod summary;

pub use explanations::{clinical_explanation, describe_value};
pub use summary::{clinical_summary, key_findings, recommendations};

use crate::config::InferenceConfig;
use crate::models::RiskClass;

/// Interpretation of a single probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub prediction: u8,
    pub probability: f64,
    pub risk_class: RiskClass,
    pub confidence: f64,
}

impl RiskAssessment {
    pub fn from_probability(probability: f64, config: &InferenceConfig) -> Self {
        Self {
            prediction: u8::from(probability >= config.decision_threshold),
            probability,
            risk_class: RiskClass::from_probability(
                probability,
                config.low_risk_threshold,
                config.high_risk_threshold,
            ),
            confidence: probability.max(1.0 - probability),
        }
    }
}
