use crate::clinical::{clinical_explanation, clinical_summary, RiskAssessment};
use crate::cohort::CohortComparison;
use crate::config::{ArtifactsConfig, InferenceConfig};
use crate::error::{AppError, Result};
use crate::metrics::{
    ARTIFACT_LOADS_TOTAL, BATCH_SIZE, COHORT_COMPARISONS_TOTAL, EXPLANATION_DURATION_SECONDS,
    INFERENCE_DURATION_SECONDS, MODEL_LOADED, PREDICTIONS_TOTAL, PREDICTION_PROBABILITY,
};
use crate::ml::artifacts::ModelArtifacts;
use crate::ml::forest::sigmoid;
use crate::ml::shap::TreeExplainer;
use crate::models::{
    BatchPredictionResponse, FeatureContribution, Impact, PatientRecord, PredictionResponse,
    PredictionStats, RiskClass, ShapResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;
use validator::Validate;

/// Risk prediction service
///
/// Starts empty; predictions fail with `ModelNotLoaded` until
/// [`PredictorService::load_artifacts`] succeeds.
pub struct PredictorService {
    /// Artifact locations
    artifacts_config: ArtifactsConfig,

    /// Thresholds and limits
    inference: InferenceConfig,

    /// Loaded artifact bundle, swapped whole on reload
    artifacts: Arc<RwLock<Option<Arc<ModelArtifacts>>>>,

    /// Served prediction counts
    stats: Arc<RwLock<PredictionStats>>,
}

impl PredictorService {
    pub fn new(artifacts_config: ArtifactsConfig, inference: InferenceConfig) -> Self {
        Self {
            artifacts_config,
            inference,
            artifacts: Arc::new(RwLock::new(None)),
            stats: Arc::new(RwLock::new(PredictionStats::default())),
        }
    }

    pub fn inference_config(&self) -> &InferenceConfig {
        &self.inference
    }

    /// Load (or reload) artifacts from disk.
    ///
    /// On failure the previously loaded bundle, if any, stays in service.
    pub async fn load_artifacts(&self) -> Result<ModelInfo> {
        let config = self.artifacts_config.clone();
        let loaded = tokio::task::spawn_blocking(move || ModelArtifacts::load(&config))
            .await
            .map_err(|e| AppError::Internal(format!("artifact loader panicked: {}", e)))?;

        match loaded {
            Ok(artifacts) => {
                ARTIFACT_LOADS_TOTAL.with_label_values(&["success"]).inc();
                Ok(self.install(artifacts).await)
            }
            Err(e) => {
                ARTIFACT_LOADS_TOTAL.with_label_values(&["failure"]).inc();
                error!(error = %e, "Failed to load model artifacts");
                Err(e)
            }
        }
    }

    /// Serve an already assembled bundle
    pub async fn install(&self, artifacts: ModelArtifacts) -> ModelInfo {
        let info = self.describe(&artifacts);
        *self.artifacts.write().await = Some(Arc::new(artifacts));
        MODEL_LOADED.set(1.0);
        info!(
            version = %info.model_version,
            trees = info.n_trees,
            "Model ready"
        );
        info
    }

    /// Drop the loaded bundle
    pub async fn unload(&self) {
        *self.artifacts.write().await = None;
        MODEL_LOADED.set(0.0);
        info!("Model unloaded");
    }

    pub async fn is_loaded(&self) -> bool {
        self.artifacts.read().await.is_some()
    }

    async fn current(&self) -> Result<Arc<ModelArtifacts>> {
        self.artifacts
            .read()
            .await
            .clone()
            .ok_or(AppError::ModelNotLoaded)
    }

    fn assess(&self, artifacts: &ModelArtifacts, patient: &PatientRecord) -> Result<RiskAssessment> {
        let row = artifacts.prepare(&artifacts.engineer(patient))?;
        let probability = artifacts.forest.predict_proba(&row)?;
        Ok(RiskAssessment::from_probability(probability, &self.inference))
    }

    fn respond(
        &self,
        artifacts: &ModelArtifacts,
        patient: &PatientRecord,
        assessment: RiskAssessment,
        processing_time_ms: f64,
    ) -> PredictionResponse {
        PredictionResponse {
            prediction_id: Uuid::new_v4(),
            prediction: assessment.prediction,
            probability: assessment.probability,
            risk_class: assessment.risk_class,
            confidence: assessment.confidence,
            clinical_summary: clinical_summary(
                patient,
                assessment.probability,
                assessment.risk_class,
            ),
            model_version: artifacts.model_version.clone(),
            timestamp: Utc::now(),
            processing_time_ms,
        }
    }

    async fn record(&self, risk_classes: &[(RiskClass, f64)]) {
        let mut stats = self.stats.write().await;
        for &(risk_class, probability) in risk_classes {
            PREDICTIONS_TOTAL
                .with_label_values(&[risk_class.as_label()])
                .inc();
            PREDICTION_PROBABILITY.observe(probability);
            stats.total_predictions += 1;
            match risk_class {
                RiskClass::Low => stats.low_risk += 1,
                RiskClass::Moderate => stats.moderate_risk += 1,
                RiskClass::High => stats.high_risk += 1,
            }
        }
    }

    /// Predict heart disease risk for one patient
    pub async fn predict(&self, patient: &PatientRecord) -> Result<PredictionResponse> {
        let artifacts = self.current().await?;
        patient.validate()?;

        let start = Instant::now();
        let assessment = self.assess(&artifacts, patient)?;
        INFERENCE_DURATION_SECONDS
            .with_label_values(&["predict"])
            .observe(start.elapsed().as_secs_f64());

        let response = self.respond(
            &artifacts,
            patient,
            assessment,
            start.elapsed().as_secs_f64() * 1000.0,
        );
        self.record(&[(response.risk_class, response.probability)])
            .await;

        debug!(
            prediction_id = %response.prediction_id,
            probability = response.probability,
            risk_class = %response.risk_class,
            "Prediction served"
        );
        Ok(response)
    }

    /// Predict many patients, in request order
    pub async fn predict_batch(
        &self,
        patients: &[PatientRecord],
    ) -> Result<BatchPredictionResponse> {
        let artifacts = self.current().await?;
        if patients.is_empty() {
            return Err(AppError::Validation("batch contains no patients".to_string()));
        }
        if patients.len() > self.inference.max_batch_size {
            return Err(AppError::Validation(format!(
                "batch of {} exceeds the limit of {} patients",
                patients.len(),
                self.inference.max_batch_size
            )));
        }
        for (i, patient) in patients.iter().enumerate() {
            patient
                .validate()
                .map_err(|e| AppError::Validation(format!("patient {}: {}", i, e)))?;
        }

        let start = Instant::now();
        let matrix = artifacts.prepare_matrix(patients)?;
        let probabilities = artifacts.forest.predict_proba_batch(matrix.view())?;
        INFERENCE_DURATION_SECONDS
            .with_label_values(&["batch"])
            .observe(start.elapsed().as_secs_f64());
        BATCH_SIZE.observe(patients.len() as f64);

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let predictions: Vec<PredictionResponse> = patients
            .iter()
            .zip(probabilities)
            .map(|(patient, p)| {
                let assessment = RiskAssessment::from_probability(p, &self.inference);
                self.respond(&artifacts, patient, assessment, elapsed_ms)
            })
            .collect();

        let classes: Vec<(RiskClass, f64)> = predictions
            .iter()
            .map(|p| (p.risk_class, p.probability))
            .collect();
        self.record(&classes).await;

        info!(count = predictions.len(), elapsed_ms, "Batch prediction served");
        Ok(BatchPredictionResponse {
            count: predictions.len(),
            predictions,
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// SHAP explanation of one patient's prediction
    pub async fn explain(&self, patient: &PatientRecord) -> Result<ShapResponse> {
        let artifacts = self.current().await?;
        patient.validate()?;

        let start = Instant::now();
        let features = artifacts.engineer(patient);
        let row = artifacts.prepare(&features)?;
        let margin = artifacts.forest.predict_margin(&row)?;
        let shap = TreeExplainer::new(&artifacts.forest).shap_values(&row)?;
        EXPLANATION_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());

        let contributions: Vec<FeatureContribution> = artifacts
            .feature_names
            .iter()
            .zip(&shap.values)
            .map(|(name, &shap_value)| {
                // Explanations read the unscaled value
                let value = features.value_of(name).unwrap_or_default();
                FeatureContribution {
                    feature: name.clone(),
                    value,
                    shap_value,
                    impact: Impact::from_shap(shap_value),
                    clinical_explanation: clinical_explanation(name, value, shap_value),
                }
            })
            .collect();

        let top_features = shap
            .ranked()
            .into_iter()
            .take(self.inference.top_features)
            .filter(|&i| shap.values[i] != 0.0)
            .map(|i| contributions[i].clone())
            .collect();

        let probability = sigmoid(margin);
        let assessment = RiskAssessment::from_probability(probability, &self.inference);
        self.stats.write().await.total_explanations += 1;

        Ok(ShapResponse {
            prediction_id: Uuid::new_v4(),
            base_value: shap.expected_value,
            output_value: margin,
            probability,
            risk_class: assessment.risk_class,
            contributions,
            top_features,
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Place a patient's vitals within the reference cohort
    pub async fn compare_to_cohort(&self, patient: &PatientRecord) -> Result<CohortComparison> {
        let artifacts = self.current().await?;
        patient.validate()?;
        let comparison = artifacts.cohort.compare(patient)?;
        COHORT_COMPARISONS_TOTAL.inc();
        Ok(comparison)
    }

    pub async fn model_info(&self) -> Result<ModelInfo> {
        let artifacts = self.current().await?;
        Ok(self.describe(&artifacts))
    }

    fn describe(&self, artifacts: &ModelArtifacts) -> ModelInfo {
        let forest = &artifacts.forest;
        ModelInfo {
            model_version: artifacts.model_version.clone(),
            objective: forest.objective.name().to_string(),
            n_trees: forest.n_trees(),
            max_depth: forest.max_depth(),
            n_features: forest.n_features,
            feature_names: artifacts.feature_names.clone(),
            numerical_features: artifacts.numerical_features.clone(),
            base_value: forest.expected_margin(),
            cohort_size: artifacts.cohort.len(),
            metrics: artifacts.metrics.clone(),
            thresholds: RiskThresholds {
                decision: self.inference.decision_threshold,
                low_risk: self.inference.low_risk_threshold,
                high_risk: self.inference.high_risk_threshold,
            },
            loaded_at: artifacts.loaded_at,
        }
    }

    pub async fn stats(&self) -> ServiceStats {
        let loaded_at = self.artifacts.read().await.as_ref().map(|a| a.loaded_at);
        ServiceStats {
            model_loaded: loaded_at.is_some(),
            loaded_at,
            predictions: self.stats.read().await.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub decision: f64,
    pub low_risk: f64,
    pub high_risk: f64,
}

/// Metadata about the serving model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_version: String,
    pub objective: String,
    pub n_trees: usize,
    pub max_depth: usize,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    pub numerical_features: Vec<String>,
    /// Expected margin (log-odds) over the training data
    pub base_value: f64,
    pub cohort_size: usize,
    /// Evaluation metrics as shipped with the model
    pub metrics: Map<String, Value>,
    pub thresholds: RiskThresholds,
    pub loaded_at: DateTime<Utc>,
}

/// Predictor service statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub model_loaded: bool,
    pub loaded_at: Option<DateTime<Utc>>,
    pub predictions: PredictionStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{CohortData, CohortRecord};
    use crate::ml::features::default_feature_names;
    use crate::ml::forest::{Forest, Objective, Tree, LEAF};
    use crate::ml::scaler::StandardScaler;
    use crate::models::find_sample;

    /// ca (column 11) < 0.5 ? (thalach (column 7, scaled) < 0 ? 0.2 : -1.5) : 1.8
    fn artifacts() -> ModelArtifacts {
        let names = default_feature_names();
        let tree = Tree {
            left: vec![1, 3, LEAF, LEAF, LEAF],
            right: vec![2, 4, LEAF, LEAF, LEAF],
            split_feature: vec![11, 7, 0, 0, 0],
            threshold: vec![0.5, 0.0, 0.0, 0.0, 0.0],
            default_left: vec![true, true, false, false, false],
            leaf_value: vec![0.0, 0.0, 1.8, 0.2, -1.5],
            cover: vec![100.0, 60.0, 40.0, 25.0, 35.0],
        };
        let forest = Forest::new(vec![tree], 0.0, names.len(), Objective::BinaryLogistic).unwrap();
        let scaler =
            StandardScaler::new(vec!["thalach".to_string()], vec![150.0], vec![20.0]).unwrap();
        let cohort = CohortData::new(
            crate::models::sample_patients()
                .into_iter()
                .enumerate()
                .map(|(i, s)| CohortRecord {
                    patient: s.patient,
                    target: u8::from(i == 2),
                })
                .collect(),
        );
        ModelArtifacts::from_parts(
            forest,
            scaler,
            names,
            vec!["thalach".to_string()],
            Map::new(),
            cohort,
            "test-1".to_string(),
        )
        .unwrap()
    }

    async fn loaded_service() -> PredictorService {
        let service = PredictorService::new(ArtifactsConfig::default(), InferenceConfig::default());
        service.install(artifacts()).await;
        service
    }

    #[tokio::test]
    async fn test_unloaded_service_rejects_requests() {
        let service = PredictorService::new(ArtifactsConfig::default(), InferenceConfig::default());
        assert!(!service.is_loaded().await);

        let patient = PatientRecord::default();
        assert!(matches!(
            service.predict(&patient).await,
            Err(AppError::ModelNotLoaded)
        ));
        assert!(matches!(
            service.explain(&patient).await,
            Err(AppError::ModelNotLoaded)
        ));
        assert!(matches!(
            service.model_info().await,
            Err(AppError::ModelNotLoaded)
        ));
    }

    #[tokio::test]
    async fn test_unloaded_service_checked_before_validation() {
        let service = PredictorService::new(ArtifactsConfig::default(), InferenceConfig::default());
        let invalid = PatientRecord {
            age: 12,
            ..Default::default()
        };

        assert!(matches!(
            service.predict(&invalid).await,
            Err(AppError::ModelNotLoaded)
        ));
        assert!(matches!(
            service.explain(&invalid).await,
            Err(AppError::ModelNotLoaded)
        ));
        assert!(matches!(
            service.compare_to_cohort(&invalid).await,
            Err(AppError::ModelNotLoaded)
        ));
        assert!(matches!(
            service.predict_batch(&[]).await,
            Err(AppError::ModelNotLoaded)
        ));
        assert!(matches!(
            service.predict_batch(&[invalid]).await,
            Err(AppError::ModelNotLoaded)
        ));
    }

    #[tokio::test]
    async fn test_predict_risk_classes() {
        let service = loaded_service().await;

        let high = find_sample("high-risk").unwrap().patient;
        let response = service.predict(&high).await.unwrap();
        assert!((response.probability - sigmoid(1.8)).abs() < 1e-12);
        assert_eq!(response.risk_class, RiskClass::High);
        assert_eq!(response.prediction, 1);
        assert_eq!(response.model_version, "test-1");
        assert!(response.clinical_summary.contains("High Risk"));

        let low = find_sample("low-risk").unwrap().patient;
        let response = service.predict(&low).await.unwrap();
        assert!((response.probability - sigmoid(-1.5)).abs() < 1e-12);
        assert_eq!(response.risk_class, RiskClass::Low);
        assert_eq!(response.prediction, 0);

        let stats = service.stats().await;
        assert!(stats.model_loaded);
        assert_eq!(stats.predictions.total_predictions, 2);
        assert_eq!(stats.predictions.high_risk, 1);
        assert_eq!(stats.predictions.low_risk, 1);
    }

    #[tokio::test]
    async fn test_invalid_patient_is_validation_error() {
        let service = loaded_service().await;
        let patient = PatientRecord {
            age: 12,
            ..Default::default()
        };
        let err = service.predict(&patient).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_explain_is_locally_accurate() {
        let service = loaded_service().await;
        let patient = find_sample("moderate-risk").unwrap().patient;
        let shap = service.explain(&patient).await.unwrap();

        let sum: f64 = shap.contributions.iter().map(|c| c.shap_value).sum();
        assert!((shap.base_value + sum - shap.output_value).abs() < 1e-9);
        assert_eq!(shap.contributions.len(), 20);

        // Only ca and thalach are used by the tree
        assert_eq!(shap.top_features.len(), 2);
        assert_eq!(shap.top_features[0].feature, "ca");
        assert_eq!(shap.top_features[0].impact, Impact::Increases);

        let thalach = shap
            .contributions
            .iter()
            .find(|c| c.feature == "thalach")
            .unwrap();
        assert_eq!(thalach.value, patient.thalach as f64);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_limits() {
        let service = loaded_service().await;
        let patients: Vec<PatientRecord> = crate::models::sample_patients()
            .into_iter()
            .map(|s| s.patient)
            .collect();

        let batch = service.predict_batch(&patients).await.unwrap();
        assert_eq!(batch.count, 3);
        assert_eq!(batch.predictions[0].risk_class, RiskClass::Low);
        assert_eq!(batch.predictions[2].risk_class, RiskClass::High);

        assert!(service.predict_batch(&[]).await.is_err());

        let too_many = vec![PatientRecord::default(); InferenceConfig::default().max_batch_size + 1];
        let err = service.predict_batch(&too_many).await.unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"));
    }

    #[tokio::test]
    async fn test_cohort_comparison() {
        let service = loaded_service().await;
        let comparison = service
            .compare_to_cohort(&PatientRecord::default())
            .await
            .unwrap();
        assert_eq!(comparison.cohort_size, 3);
        assert!((comparison.disease_prevalence - 1.0 / 3.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_current_model() {
        let service = PredictorService::new(
            ArtifactsConfig::in_dir("/nonexistent/cardio-artifacts"),
            InferenceConfig::default(),
        );
        service.install(artifacts()).await;

        assert!(service.load_artifacts().await.is_err());
        assert!(service.is_loaded().await);

        let info = service.model_info().await.unwrap();
        assert_eq!(info.n_trees, 1);
        assert_eq!(info.n_features, 20);
        assert_eq!(info.model_version, "test-1");
    }

    #[tokio::test]
    async fn test_unload() {
        let service = loaded_service().await;
        service.unload().await;
        assert!(!service.is_loaded().await);
        assert!(!service.stats().await.model_loaded);
    }
}
