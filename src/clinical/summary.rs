use crate::ml::features::compute_auto_fields;
use crate::models::{PatientRecord, RiskClass};
use std::fmt::Write;

/// Findings worth calling out, most significant first
pub fn key_findings(patient: &PatientRecord) -> Vec<String> {
    let features = compute_auto_fields(patient);
    let mut findings = Vec::new();

    if patient.ca > 0 {
        findings.push(format!(
            "{} major vessel(s) with significant narrowing on fluoroscopy",
            patient.ca
        ));
    }
    if patient.exang == 1 {
        findings.push("Angina induced by exercise".to_string());
    }
    if patient.oldpeak >= 2.0 {
        findings.push(format!(
            "Marked ST depression ({:.1} mm) suggesting exercise-induced ischemia",
            patient.oldpeak
        ));
    } else if patient.oldpeak >= 1.0 {
        findings.push(format!("Moderate ST depression ({:.1} mm)", patient.oldpeak));
    }
    match features.bp_category {
        3 => findings.push(format!(
            "Stage 2 hypertension ({} mmHg resting)",
            patient.trestbps
        )),
        2 => findings.push(format!(
            "Stage 1 hypertension ({} mmHg resting)",
            patient.trestbps
        )),
        _ => {}
    }
    match features.chol_risk {
        2 => findings.push(format!("High cholesterol ({} mg/dl)", patient.chol)),
        1 => findings.push(format!(
            "Borderline high cholesterol ({} mg/dl)",
            patient.chol
        )),
        _ => {}
    }
    if features.hr_achievement < 0.85 {
        findings.push(format!(
            "Reduced exercise capacity: {:.0}% of age-predicted maximum heart rate",
            features.hr_achievement * 100.0
        ));
    }
    match patient.cp {
        0 => findings.push("Typical anginal chest pain".to_string()),
        3 => findings.push("Asymptomatic presentation despite other findings".to_string()),
        _ => {}
    }
    match patient.thal {
        3 => findings.push("Reversible perfusion defect on thalassemia scan".to_string()),
        2 => findings.push("Fixed perfusion defect on thalassemia scan".to_string()),
        _ => {}
    }
    findings
}

pub fn recommendations(risk_class: RiskClass) -> &'static [&'static str] {
    match risk_class {
        RiskClass::Low => &[
            "Continue routine cardiovascular screening",
            "Maintain a heart-healthy diet and regular physical activity",
            "Reassess risk factors annually",
        ],
        RiskClass::Moderate => &[
            "Schedule follow-up with a primary care physician",
            "Consider stress testing or further cardiac evaluation",
            "Address modifiable risk factors such as blood pressure and cholesterol",
        ],
        RiskClass::High => &[
            "Refer for prompt cardiology evaluation",
            "Consider coronary angiography or advanced cardiac imaging",
            "Review medications and aggressively manage risk factors",
        ],
    }
}

/// Markdown interpretation shown alongside a prediction
pub fn clinical_summary(
    patient: &PatientRecord,
    probability: f64,
    risk_class: RiskClass,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "#### {}: {:.1}% probability of heart disease\n",
        risk_class,
        probability * 100.0
    );
    let _ = writeln!(
        out,
        "**Patient:** {}-year-old {}, {}\n",
        patient.age,
        patient.sex_label().to_lowercase(),
        patient.chest_pain_label().to_lowercase()
    );

    let findings = key_findings(patient);
    let _ = writeln!(out, "**Key clinical findings:**\n");
    if findings.is_empty() {
        let _ = writeln!(out, "- No major abnormal findings in the provided inputs");
    }
    for finding in &findings {
        let _ = writeln!(out, "- {}", finding);
    }

    let _ = writeln!(out, "\n**Recommendations:**\n");
    for recommendation in recommendations(risk_class) {
        let _ = writeln!(out, "- {}", recommendation);
    }
    let _ = write!(
        out,
        "\n_This assessment supports, and does not replace, clinical judgement._"
    );
    out
}
