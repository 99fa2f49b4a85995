//! Reference population used to put a patient's vitals in context.

use crate::error::{AppError, Result};
use crate::models::PatientRecord;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Continuous vitals reported by a comparison, with display names
pub const COMPARED_VITALS: [(&str, &str); 5] = [
    ("age", "Age"),
    ("trestbps", "Resting Blood Pressure"),
    ("chol", "Cholesterol"),
    ("thalach", "Max Heart Rate"),
    ("oldpeak", "ST Depression"),
];

/// A labelled patient from the reference population
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CohortRecord {
    #[serde(flatten)]
    pub patient: PatientRecord,

    /// 1 when heart disease was diagnosed
    pub target: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortData {
    pub records: Vec<CohortRecord>,
}

/// Where a patient sits for one vital
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalComparison {
    pub feature: String,
    pub label: String,
    pub patient_value: f64,
    pub cohort_mean: f64,
    /// Share of cohort values at or below the patient's value, 0-100
    pub percentile: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortComparison {
    pub cohort_size: usize,
    /// Share of the cohort with heart disease, 0-1
    pub disease_prevalence: f64,
    pub vitals: Vec<VitalComparison>,
}

impl CohortData {
    pub fn new(records: Vec<CohortRecord>) -> Self {
        Self { records }
    }

    /// Load a JSON array of cohort records
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::artifact("cohort", format!("{}: {}", path.display(), e)))?;
        let records: Vec<CohortRecord> = serde_json::from_str(&raw)
            .map_err(|e| AppError::artifact("cohort", e.to_string()))?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn disease_prevalence(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let positives = self.records.iter().filter(|r| r.target == 1).count();
        positives as f64 / self.records.len() as f64
    }

    fn values(&self, feature: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| r.patient.value_of(feature))
            .collect()
    }

    /// Compare a patient's vitals against the cohort
    pub fn compare(&self, patient: &PatientRecord) -> Result<CohortComparison> {
        if self.records.is_empty() {
            return Err(AppError::NotFound("cohort data is empty".to_string()));
        }

        let vitals = COMPARED_VITALS
            .iter()
            .map(|&(feature, label)| {
                let values = self.values(feature);
                let patient_value = patient.value_of(feature).unwrap_or_default();
                let cohort_mean = values.iter().sum::<f64>() / values.len() as f64;
                let at_or_below = values.iter().filter(|&&v| v <= patient_value).count();
                VitalComparison {
                    feature: feature.to_string(),
                    label: label.to_string(),
                    patient_value,
                    cohort_mean,
                    percentile: at_or_below as f64 / values.len() as f64 * 100.0,
                }
            })
            .collect();

        Ok(CohortComparison {
            cohort_size: self.records.len(),
            disease_prevalence: self.disease_prevalence(),
            vitals,
        })
    }
}
