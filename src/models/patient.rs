use serde::{Deserialize, Serialize};
use validator::Validate;

/// Raw clinical inputs for one patient, in the encoding the model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct PatientRecord {
    /// Age in years
    #[validate(range(min = 18, max = 100))]
    pub age: u32,

    /// 0 = female, 1 = male
    #[validate(range(min = 0, max = 1))]
    pub sex: u8,

    /// Chest pain type (0 typical angina .. 3 asymptomatic)
    #[validate(range(min = 0, max = 3))]
    pub cp: u8,

    /// Resting blood pressure (mmHg)
    #[validate(range(min = 80, max = 300))]
    pub trestbps: u32,

    /// Serum cholesterol (mg/dl)
    #[validate(range(min = 100, max = 600))]
    pub chol: u32,

    /// Fasting blood sugar > 120 mg/dl
    #[validate(range(min = 0, max = 1))]
    pub fbs: u8,

    /// Resting ECG (0 normal, 1 ST-T abnormality, 2 LV hypertrophy)
    #[validate(range(min = 0, max = 2))]
    pub restecg: u8,

    /// Maximum heart rate achieved
    #[validate(range(min = 60, max = 220))]
    pub thalach: u32,

    /// Exercise induced angina
    #[validate(range(min = 0, max = 1))]
    pub exang: u8,

    /// ST depression induced by exercise relative to rest
    #[validate(range(min = 0.0, max = 10.0))]
    pub oldpeak: f64,

    /// Slope of the peak exercise ST segment (0 up, 1 flat, 2 down)
    #[validate(range(min = 0, max = 2))]
    pub slope: u8,

    /// Major vessels coloured by fluoroscopy
    #[validate(range(min = 0, max = 3))]
    pub ca: u8,

    /// Thalassemia (1 normal, 2 fixed defect, 3 reversible defect)
    #[validate(range(min = 1, max = 3))]
    pub thal: u8,
}

impl PatientRecord {
    /// Raw input names in model order
    pub const FIELDS: [&'static str; 13] = [
        "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
        "slope", "ca", "thal",
    ];

    /// Look up a raw input by name
    pub fn value_of(&self, field: &str) -> Option<f64> {
        let value = match field {
            "age" => self.age as f64,
            "sex" => self.sex as f64,
            "cp" => self.cp as f64,
            "trestbps" => self.trestbps as f64,
            "chol" => self.chol as f64,
            "fbs" => self.fbs as f64,
            "restecg" => self.restecg as f64,
            "thalach" => self.thalach as f64,
            "exang" => self.exang as f64,
            "oldpeak" => self.oldpeak,
            "slope" => self.slope as f64,
            "ca" => self.ca as f64,
            "thal" => self.thal as f64,
            _ => return None,
        };
        Some(value)
    }

    pub fn sex_label(&self) -> &'static str {
        if self.sex == 0 {
            "Female"
        } else {
            "Male"
        }
    }

    pub fn chest_pain_label(&self) -> &'static str {
        match self.cp {
            0 => "Typical Angina",
            1 => "Atypical Angina",
            2 => "Non-anginal Pain",
            _ => "Asymptomatic",
        }
    }

    pub fn restecg_label(&self) -> &'static str {
        match self.restecg {
            0 => "Normal",
            1 => "ST-T Abnormality",
            _ => "LV Hypertrophy",
        }
    }

    pub fn slope_label(&self) -> &'static str {
        match self.slope {
            0 => "Upsloping",
            1 => "Flat",
            _ => "Downsloping",
        }
    }

    pub fn thal_label(&self) -> &'static str {
        match self.thal {
            1 => "Normal",
            2 => "Fixed Defect",
            _ => "Reversible Defect",
        }
    }
}

impl Default for PatientRecord {
    /// Mid-range defaults used by the input panel
    fn default() -> Self {
        Self {
            age: 54,
            sex: 1,
            cp: 0,
            trestbps: 132,
            chol: 246,
            fbs: 0,
            restecg: 0,
            thalach: 150,
            exang: 0,
            oldpeak: 1.0,
            slope: 1,
            ca: 0,
            thal: 2,
        }
    }
}

/// A named example patient for quick demos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePatient {
    pub name: String,
    pub description: String,
    pub patient: PatientRecord,
}

/// Built-in example patients spanning the risk range
pub fn sample_patients() -> Vec<SamplePatient> {
    vec![
        SamplePatient {
            name: "low-risk".to_string(),
            description: "Young woman, atypical pain, normal stress test".to_string(),
            patient: PatientRecord {
                age: 38,
                sex: 0,
                cp: 1,
                trestbps: 115,
                chol: 190,
                fbs: 0,
                restecg: 0,
                thalach: 178,
                exang: 0,
                oldpeak: 0.0,
                slope: 0,
                ca: 0,
                thal: 1,
            },
        },
        SamplePatient {
            name: "moderate-risk".to_string(),
            description: "Middle-aged man, borderline lipids, mild ST depression".to_string(),
            patient: PatientRecord {
                age: 56,
                sex: 1,
                cp: 2,
                trestbps: 134,
                chol: 228,
                fbs: 0,
                restecg: 1,
                thalach: 148,
                exang: 0,
                oldpeak: 1.2,
                slope: 1,
                ca: 1,
                thal: 2,
            },
        },
        SamplePatient {
            name: "high-risk".to_string(),
            description: "Elderly man, exertional angina, multi-vessel disease".to_string(),
            patient: PatientRecord {
                age: 67,
                sex: 1,
                cp: 0,
                trestbps: 160,
                chol: 286,
                fbs: 1,
                restecg: 2,
                thalach: 108,
                exang: 1,
                oldpeak: 3.5,
                slope: 2,
                ca: 3,
                thal: 3,
            },
        },
    ]
}

/// Find a built-in sample by name
pub fn find_sample(name: &str) -> Option<SamplePatient> {
    sample_patients().into_iter().find(|s| s.name == name)
}
