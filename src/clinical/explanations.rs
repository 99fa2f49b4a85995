use crate::models::Impact;

fn direction(shap_value: f64) -> &'static str {
    match Impact::from_shap(shap_value) {
        Impact::Increases => "raises",
        Impact::Decreases => "lowers",
        Impact::Neutral => "does not change",
    }
}

/// Clinical reading of a raw or derived feature value
pub fn describe_value(feature: &str, value: f64) -> String {
    let code = value.round() as i64;
    match feature {
        "age" => format!("Age {:.0} years", value),
        "sex" => (if code == 1 { "Male sex" } else { "Female sex" }).to_string(),
        "cp" => (match code {
            0 => "Typical angina",
            1 => "Atypical angina",
            2 => "Non-anginal chest pain",
            _ => "Asymptomatic chest pain presentation",
        })
        .to_string(),
        "trestbps" => format!("Resting blood pressure {:.0} mmHg", value),
        "chol" => format!("Serum cholesterol {:.0} mg/dl", value),
        "fbs" => (if code == 1 {
            "Fasting blood sugar above 120 mg/dl"
        } else {
            "Normal fasting blood sugar"
        })
        .to_string(),
        "restecg" => (match code {
            0 => "Normal resting ECG",
            1 => "ST-T wave abnormality on resting ECG",
            _ => "Left ventricular hypertrophy on resting ECG",
        })
        .to_string(),
        "thalach" => format!("Maximum heart rate {:.0} bpm", value),
        "exang" => (if code == 1 {
            "Exercise-induced angina"
        } else {
            "No exercise-induced angina"
        })
        .to_string(),
        "oldpeak" => format!("ST depression of {:.1} mm", value),
        "slope" => (match code {
            0 => "Upsloping ST segment",
            1 => "Flat ST segment",
            _ => "Downsloping ST segment",
        })
        .to_string(),
        "ca" => format!("{} major vessel(s) coloured by fluoroscopy", code),
        "thal" => (match code {
            1 => "Normal thalassemia scan",
            2 => "Fixed thalassemia defect",
            _ => "Reversible thalassemia defect",
        })
        .to_string(),
        "age_group" => (match code {
            0 => "Age group under 40",
            1 => "Age group 40 to 54",
            2 => "Age group 55 to 64",
            _ => "Age group 65 and over",
        })
        .to_string(),
        "cp_severity" => format!("Chest pain severity {} of 4", code),
        "bp_category" => (match code {
            0 => "Normal blood pressure",
            1 => "Elevated blood pressure",
            2 => "Stage 1 hypertension",
            _ => "Stage 2 hypertension",
        })
        .to_string(),
        "chol_risk" => (match code {
            0 => "Desirable cholesterol",
            1 => "Borderline high cholesterol",
            _ => "High cholesterol",
        })
        .to_string(),
        "hr_achievement" => format!(
            "Reached {:.0}% of age-predicted maximum heart rate",
            value * 100.0
        ),
        "age_chol_interaction" => format!("Combined age and cholesterol load {:.1}", value),
        "cp_exang_interaction" => {
            if value > 0.0 {
                "Chest pain together with exercise-induced angina".to_string()
            } else {
                "No combined chest pain and exercise angina".to_string()
            }
        }
        other => format!("{} = {:.2}", other, value),
    }
}

/// One-sentence explanation of a feature's contribution
pub fn clinical_explanation(feature: &str, value: f64, shap_value: f64) -> String {
    format!(
        "{} {} the predicted risk",
        describe_value(feature, value),
        direction(shap_value)
    )
}
