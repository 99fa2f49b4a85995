use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Risk stratum for a predicted probability
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum RiskClass {
    #[serde(rename = "Low Risk")]
    #[strum(serialize = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    #[strum(serialize = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    #[strum(serialize = "High Risk")]
    High,
}

impl RiskClass {
    /// Stratify a probability. `p < low` is Low, `p < high` is Moderate, otherwise High.
    pub fn from_probability(probability: f64, low: f64, high: f64) -> Self {
        if probability < low {
            RiskClass::Low
        } else if probability < high {
            RiskClass::Moderate
        } else {
            RiskClass::High
        }
    }

    /// Short label used for metric labels
    pub fn as_label(&self) -> &'static str {
        match self {
            RiskClass::Low => "low",
            RiskClass::Moderate => "moderate",
            RiskClass::High => "high",
        }
    }
}

/// Result of a single risk prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction_id: Uuid,

    /// 1 when the probability reaches the decision threshold
    pub prediction: u8,

    /// Probability of heart disease
    pub probability: f64,

    pub risk_class: RiskClass,

    /// max(p, 1 - p)
    pub confidence: f64,

    /// Markdown interpretation and recommendations
    pub clinical_summary: String,

    pub model_version: String,

    pub timestamp: DateTime<Utc>,

    pub processing_time_ms: f64,
}

/// Direction a feature pushes the prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Impact {
    Increases,
    Decreases,
    Neutral,
}

impl Impact {
    pub fn from_shap(shap_value: f64) -> Self {
        if shap_value > 0.0 {
            Impact::Increases
        } else if shap_value < 0.0 {
            Impact::Decreases
        } else {
            Impact::Neutral
        }
    }
}

/// One feature's SHAP attribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,

    /// Unscaled feature value as engineered from the patient record
    pub value: f64,

    /// Contribution in log-odds
    pub shap_value: f64,

    pub impact: Impact,

    pub clinical_explanation: String,
}

/// SHAP explanation of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapResponse {
    pub prediction_id: Uuid,

    /// Expected model output (log-odds) over the training distribution
    pub base_value: f64,

    /// Model output (log-odds) for this patient; equals base_value + sum of shap values
    pub output_value: f64,

    pub probability: f64,

    pub risk_class: RiskClass,

    /// Contributions in model feature order
    pub contributions: Vec<FeatureContribution>,

    /// Largest contributions by magnitude
    pub top_features: Vec<FeatureContribution>,

    pub processing_time_ms: f64,
}

/// Batch of predictions in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPredictionResponse {
    pub predictions: Vec<PredictionResponse>,
    pub count: usize,
    pub processing_time_ms: f64,
}

/// Service liveness and model readiness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Aggregate counts over served predictions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionStats {
    pub total_predictions: u64,
    pub total_explanations: u64,
    pub low_risk: u64,
    pub moderate_risk: u64,
    pub high_risk: u64,
}
