use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ReviewTier, UrgencyLevel};

/// One scored candidate condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialDiagnosis {
    pub condition_id: String,
    pub condition_name: String,
    pub icd_codes: Vec<String>,
    pub snomed_codes: Vec<String>,
    /// Raw retrieval score.
    pub similarity_score: f64,
    /// Adjusted score used for ranking and tiering.
    pub confidence_score: f64,
    pub probability: f64,
    pub matching_symptoms: Vec<String>,
    pub missing_symptoms: Vec<String>,
    pub supporting_evidence: Vec<String>,
    pub urgency_level: UrgencyLevel,
    pub distinguishing_features: BTreeMap<String, String>,
    pub diagnostic_criteria_met: Vec<String>,
    pub recommended_next_steps: Vec<String>,
}

/// Outcome of one case analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub result_id: String,
    pub case_id: String,
    pub differential_diagnoses: Vec<DifferentialDiagnosis>,
    pub primary_diagnosis: Option<DifferentialDiagnosis>,
    pub review_tier: ReviewTier,
    pub overall_confidence: f64,
    pub red_flags_detected: Vec<String>,
    pub requires_emergency_care: bool,
    pub rare_diseases_considered: Vec<DifferentialDiagnosis>,
    pub recommended_specialists: Vec<String>,
    pub recommended_tests: Vec<String>,
    pub reasoning_summary: String,
    pub feature_importance: BTreeMap<String, f64>,
    pub processing_time_ms: f64,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
}

impl DiagnosticResult {
    pub fn top_diagnosis(&self) -> Option<&DifferentialDiagnosis> {
        self.differential_diagnoses.first()
    }
}
