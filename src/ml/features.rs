use crate::error::{AppError, Result};
use crate::models::PatientRecord;
use serde::{Deserialize, Serialize};

/// Names of the derived fields, in the order they are appended to the raw inputs
pub const DERIVED_FEATURES: [&str; 7] = [
    "age_group",
    "cp_severity",
    "bp_category",
    "chol_risk",
    "hr_achievement",
    "age_chol_interaction",
    "cp_exang_interaction",
];

/// Patient record enriched with derived clinical fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeatures {
    /// Raw inputs
    #[serde(flatten)]
    pub patient: PatientRecord,

    /// 0 young (<40), 1 middle-aged (<55), 2 older (<65), 3 elderly
    pub age_group: u8,

    /// Chest pain severity, 4 for typical angina down to 1 for asymptomatic
    pub cp_severity: u8,

    /// 0 normal, 1 elevated, 2 stage 1, 3 stage 2 hypertension
    pub bp_category: u8,

    /// 0 desirable, 1 borderline, 2 high cholesterol
    pub chol_risk: u8,

    /// Achieved fraction of age-predicted maximum heart rate
    pub hr_achievement: f64,

    pub age_chol_interaction: f64,

    pub cp_exang_interaction: f64,
}

impl EngineeredFeatures {
    /// Look up any raw or derived feature by name
    pub fn value_of(&self, name: &str) -> Option<f64> {
        let value = match name {
            "age_group" => self.age_group as f64,
            "cp_severity" => self.cp_severity as f64,
            "bp_category" => self.bp_category as f64,
            "chol_risk" => self.chol_risk as f64,
            "hr_achievement" => self.hr_achievement,
            "age_chol_interaction" => self.age_chol_interaction,
            "cp_exang_interaction" => self.cp_exang_interaction,
            other => return self.patient.value_of(other),
        };
        Some(value)
    }

    /// Values ordered by the model's feature names
    pub fn to_vector(&self, feature_names: &[String]) -> Result<Vec<f64>> {
        feature_names
            .iter()
            .map(|name| {
                self.value_of(name).ok_or_else(|| {
                    AppError::artifact(
                        "feature_names",
                        format!("unknown feature '{}'", name),
                    )
                })
            })
            .collect()
    }
}

/// Compute the derived clinical fields from the raw inputs
pub fn compute_auto_fields(patient: &PatientRecord) -> EngineeredFeatures {
    let age = patient.age;

    let age_group = if age < 40 {
        0
    } else if age < 55 {
        1
    } else if age < 65 {
        2
    } else {
        3
    };

    let cp_severity = match patient.cp {
        0 => 4,
        1 => 3,
        2 => 2,
        _ => 1,
    };

    let bp_category = if patient.trestbps < 120 {
        0
    } else if patient.trestbps < 130 {
        1
    } else if patient.trestbps < 140 {
        2
    } else {
        3
    };

    let chol_risk = if patient.chol < 200 {
        0
    } else if patient.chol < 240 {
        1
    } else {
        2
    };

    // Validated ages stop at 100, so the denominator stays positive
    let max_predicted_hr = 220.0 - age as f64;
    let hr_achievement = patient.thalach as f64 / max_predicted_hr;

    EngineeredFeatures {
        patient: *patient,
        age_group,
        cp_severity,
        bp_category,
        chol_risk,
        hr_achievement,
        age_chol_interaction: age as f64 * patient.chol as f64 / 1000.0,
        cp_exang_interaction: (patient.cp as f64) * (patient.exang as f64),
    }
}

/// Default model input layout: raw inputs followed by derived fields
pub fn default_feature_names() -> Vec<String> {
    PatientRecord::FIELDS
        .iter()
        .chain(DERIVED_FEATURES.iter())
        .map(|s| s.to_string())
        .collect()
}
