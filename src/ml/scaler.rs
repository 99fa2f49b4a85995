use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Standardisation parameters fitted on the training set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Features the parameters apply to
    pub feature_names: Vec<String>,

    pub mean: Vec<f64>,

    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(feature_names: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self {
            feature_names,
            mean,
            scale,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Check that the parameter vectors line up
    pub fn validate(&self) -> Result<()> {
        let n = self.feature_names.len();
        if self.mean.len() != n || self.scale.len() != n {
            return Err(AppError::artifact(
                "scaler",
                format!(
                    "expected {} means and scales, found {} and {}",
                    n,
                    self.mean.len(),
                    self.scale.len()
                ),
            ));
        }
        if let Some(pos) = self
            .mean
            .iter()
            .chain(self.scale.iter())
            .position(|v| !v.is_finite())
        {
            return Err(AppError::artifact(
                "scaler",
                format!("non-finite parameter at position {}", pos),
            ));
        }
        Ok(())
    }

    /// Index of a feature in the scaler's parameters
    pub fn position(&self, feature: &str) -> Option<usize> {
        self.feature_names.iter().position(|f| f == feature)
    }

    /// Standardise a single value
    pub fn scale_value(&self, index: usize, value: f64) -> f64 {
        // A zero scale marks a constant feature; it is only centred
        let scale = if self.scale[index] == 0.0 {
            1.0
        } else {
            self.scale[index]
        };
        (value - self.mean[index]) / scale
    }

    /// Build an index plan mapping model columns to scaler parameters.
    ///
    /// Only columns listed in `numerical_features` are scaled.
    pub fn plan(
        &self,
        model_features: &[String],
        numerical_features: &[String],
    ) -> Result<ScalingPlan> {
        let mut columns = Vec::with_capacity(numerical_features.len());
        for feature in numerical_features {
            let column = model_features
                .iter()
                .position(|f| f == feature)
                .ok_or_else(|| {
                    AppError::artifact(
                        "numerical_features",
                        format!("'{}' is not a model feature", feature),
                    )
                })?;
            let param = self.position(feature).ok_or_else(|| {
                AppError::artifact(
                    "scaler",
                    format!("no scaling parameters for '{}'", feature),
                )
            })?;
            columns.push((column, param));
        }
        Ok(ScalingPlan { columns })
    }

    /// Standardise the numerical columns of one row in place
    pub fn transform(
        &self,
        model_features: &[String],
        numerical_features: &[String],
        row: &mut [f64],
    ) -> Result<()> {
        if row.len() != model_features.len() {
            return Err(AppError::Inference(format!(
                "row has {} values but {} features are named",
                row.len(),
                model_features.len()
            )));
        }
        self.plan(model_features, numerical_features)?.apply(self, row);
        Ok(())
    }
}

/// Precomputed (model column, scaler parameter) pairs
#[derive(Debug, Clone, Default)]
pub struct ScalingPlan {
    columns: Vec<(usize, usize)>,
}

impl ScalingPlan {
    /// Scale the numerical columns of a feature row in place
    pub fn apply(&self, scaler: &StandardScaler, row: &mut [f64]) {
        for &(column, param) in &self.columns {
            row[column] = scaler.scale_value(param, row[column]);
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
