//! Trained model artifact bundle.
//!
//! All artifacts live in one directory and are loaded together. A bundle is
//! only constructed once every file has been read and cross-checked, so a
//! loaded [`ModelArtifacts`] is always internally consistent.

use crate::cohort::CohortData;
use crate::config::ArtifactsConfig;
use crate::error::{AppError, Result};
use crate::ml::features::{compute_auto_fields, EngineeredFeatures};
use crate::ml::forest::Forest;
use crate::ml::scaler::{ScalingPlan, StandardScaler};
use crate::ml::xgboost::XgbModel;
use crate::models::PatientRecord;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub forest: Forest,
    pub scaler: StandardScaler,
    /// Model input columns in training order
    pub feature_names: Vec<String>,
    /// Columns standardised before inference
    pub numerical_features: Vec<String>,
    /// Free-form evaluation metrics served as-is
    pub metrics: Map<String, Value>,
    pub cohort: CohortData,
    /// `model_version` from the metrics file, else the XGBoost version
    pub model_version: String,
    pub loaded_at: DateTime<Utc>,
    plan: ScalingPlan,
}

fn read_json<T: DeserializeOwned>(artifact: &str, path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::artifact(artifact, format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| AppError::artifact(artifact, e.to_string()))
}

impl ModelArtifacts {
    /// Load every artifact from the configured directory
    pub fn load(config: &ArtifactsConfig) -> Result<Self> {
        info!(dir = %config.dir.display(), "Loading model artifacts");

        let model = XgbModel::from_file(config.model_path())
            .map_err(|e| rename_artifact(e, "model"))?;
        let forest = model.to_forest()?;
        debug!(
            trees = forest.n_trees(),
            max_depth = forest.max_depth(),
            objective = forest.objective.name(),
            "Model parsed"
        );

        let scaler: StandardScaler = read_json("scaler", &config.scaler_path())?;
        scaler.validate()?;
        let feature_names: Vec<String> =
            read_json("feature_names", &config.feature_names_path())?;
        let numerical_features: Vec<String> =
            read_json("numerical_features", &config.numerical_features_path())?;
        let metrics: Map<String, Value> = read_json("metrics", &config.metrics_path())?;
        let model_version = metrics
            .get("model_version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("xgboost-{}", model.version_string()));

        let cohort_path = config.cohort_path();
        let cohort = if cohort_path.exists() {
            CohortData::from_file(&cohort_path)?
        } else {
            warn!(path = %cohort_path.display(), "Cohort file not found, comparisons disabled");
            CohortData::default()
        };

        let artifacts = Self::from_parts(
            forest,
            scaler,
            feature_names,
            numerical_features,
            metrics,
            cohort,
            model_version,
        )?;

        info!(
            features = artifacts.feature_names.len(),
            scaled = artifacts.numerical_features.len(),
            trees = artifacts.forest.n_trees(),
            cohort_size = artifacts.cohort.len(),
            version = %artifacts.model_version,
            "Model artifacts loaded"
        );
        Ok(artifacts)
    }

    /// Assemble a bundle from already parsed parts, cross-checking them
    pub fn from_parts(
        forest: Forest,
        scaler: StandardScaler,
        feature_names: Vec<String>,
        numerical_features: Vec<String>,
        metrics: Map<String, Value>,
        cohort: CohortData,
        model_version: String,
    ) -> Result<Self> {
        if forest.n_features != feature_names.len() {
            return Err(AppError::artifact(
                "feature_names",
                format!(
                    "model expects {} features but {} names were given",
                    forest.n_features,
                    feature_names.len()
                ),
            ));
        }
        if !forest.feature_names.is_empty() && forest.feature_names != feature_names {
            return Err(AppError::artifact(
                "feature_names",
                "names differ from those stored in the model",
            ));
        }
        if let Some(unknown) = scaler
            .feature_names
            .iter()
            .find(|f| !feature_names.contains(*f))
        {
            return Err(AppError::artifact(
                "scaler",
                format!("'{}' is not a model feature", unknown),
            ));
        }

        // Catch names that feature engineering cannot produce before serving
        compute_auto_fields(&PatientRecord::default()).to_vector(&feature_names)?;

        let plan = scaler.plan(&feature_names, &numerical_features)?;

        Ok(Self {
            forest,
            scaler,
            feature_names,
            numerical_features,
            metrics,
            cohort,
            model_version,
            loaded_at: Utc::now(),
            plan,
        })
    }

    /// Engineered features for a patient, unscaled
    pub fn engineer(&self, patient: &PatientRecord) -> EngineeredFeatures {
        compute_auto_fields(patient)
    }

    /// Model input row: engineered, ordered and scaled
    pub fn prepare(&self, features: &EngineeredFeatures) -> Result<Vec<f64>> {
        let mut row = features.to_vector(&self.feature_names)?;
        self.plan.apply(&self.scaler, &mut row);
        Ok(row)
    }

    /// Feature matrix with one prepared row per patient
    pub fn prepare_matrix(&self, patients: &[PatientRecord]) -> Result<Array2<f64>> {
        let n_features = self.feature_names.len();
        let mut flat = Vec::with_capacity(patients.len() * n_features);
        for patient in patients {
            flat.extend(self.prepare(&self.engineer(patient))?);
        }
        Array2::from_shape_vec((patients.len(), n_features), flat)
            .map_err(|e| AppError::Inference(e.to_string()))
    }
}

fn rename_artifact(err: AppError, artifact: &str) -> AppError {
    match err {
        AppError::Artifact { message, .. } => AppError::artifact(artifact, message),
        other => other,
    }
}
