use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::enums::UrgencyLevel;
use super::ModelError;

/// Knowledge-base entry describing one condition. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalCondition {
    pub condition_id: String,
    pub condition_name: String,
    #[serde(default)]
    pub icd_codes: Vec<String>,
    #[serde(default)]
    pub snomed_codes: Vec<String>,
    /// Fraction of the population affected, in [0, 1]. Absent on malformed entries.
    #[serde(default)]
    pub prevalence: Option<f64>,
    #[serde(default)]
    pub is_rare_disease: bool,
    #[serde(default)]
    pub typical_symptoms: Vec<String>,
    #[serde(default)]
    pub rare_symptoms: Vec<String>,
    #[serde(default)]
    pub red_flag_symptoms: Vec<String>,
    #[serde(default)]
    pub temporal_pattern: Option<String>,
    #[serde(default)]
    pub diagnostic_criteria: Vec<String>,
    #[serde(default)]
    pub differential_diagnoses: Vec<String>,
    #[serde(default)]
    pub distinguishing_features: BTreeMap<String, String>,
    #[serde(default)]
    pub urgency_level: UrgencyLevel,
    #[serde(default)]
    pub recommended_tests: Vec<String>,
    #[serde(default)]
    pub specialist_referral: Option<String>,
    #[serde(default)]
    pub evidence_sources: Vec<String>,
}

impl MedicalCondition {
    /// Minimal entry, mostly for building fixtures.
    pub fn new(condition_id: impl Into<String>, condition_name: impl Into<String>) -> Self {
        Self {
            condition_id: condition_id.into(),
            condition_name: condition_name.into(),
            icd_codes: Vec::new(),
            snomed_codes: Vec::new(),
            prevalence: None,
            is_rare_disease: false,
            typical_symptoms: Vec::new(),
            rare_symptoms: Vec::new(),
            red_flag_symptoms: Vec::new(),
            temporal_pattern: None,
            diagnostic_criteria: Vec::new(),
            differential_diagnoses: Vec::new(),
            distinguishing_features: BTreeMap::new(),
            urgency_level: UrgencyLevel::default(),
            recommended_tests: Vec::new(),
            specialist_referral: None,
            evidence_sources: Vec::new(),
        }
    }

    /// Missing prevalence is scored as zero rather than rejected.
    pub fn prevalence_or_zero(&self) -> f64 {
        self.prevalence.unwrap_or(0.0)
    }

    /// Typical symptoms followed by rare symptoms.
    pub fn all_symptoms(&self) -> impl Iterator<Item = &String> {
        self.typical_symptoms.iter().chain(self.rare_symptoms.iter())
    }

    /// Text a condition is indexed under: name, symptom lists, temporal pattern.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.condition_name.clone()];
        if !self.typical_symptoms.is_empty() {
            parts.push(format!("Typical symptoms: {}", self.typical_symptoms.join(", ")));
        }
        if !self.rare_symptoms.is_empty() {
            parts.push(format!("Rare symptoms: {}", self.rare_symptoms.join(", ")));
        }
        if let Some(pattern) = self.temporal_pattern.as_deref().filter(|p| !p.is_empty()) {
            parts.push(format!("Temporal pattern: {pattern}"));
        }
        parts.join(". ")
    }
}

/// Read a JSON array of conditions, e.g. a knowledge-base export.
pub fn load_conditions_json<R: Read>(reader: R) -> Result<Vec<MedicalCondition>, ModelError> {
    let conditions: Vec<MedicalCondition> = serde_json::from_reader(reader)?;
    Ok(conditions)
}
