//! Per-candidate scoring: confidence, probability and symptom evidence.
//!
//! Confidence drives ranking and tiering. Probability is a separate
//! prevalence/similarity blend reported alongside it, never used for tiers.

use crate::models::{DifferentialDiagnosis, MedicalCondition};
use crate::pipeline::retrieval::ScoredCondition;

pub const MATCHING_SYMPTOM_CAP: usize = 5;
pub const MISSING_SYMPTOM_CAP: usize = 3;
/// Cited sources copied into supporting evidence.
pub const EVIDENCE_SOURCE_CAP: usize = 2;
/// Criteria and next steps copied from the condition.
pub const DETAIL_CAP: usize = 3;

/// A diagnosis together with the knowledge-base record it was scored from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDiagnosis {
    pub diagnosis: DifferentialDiagnosis,
    pub condition: MedicalCondition,
}

impl ScoredDiagnosis {
    pub fn confidence(&self) -> f64 {
        self.diagnosis.confidence_score
    }

    pub fn condition_id(&self) -> &str {
        &self.diagnosis.condition_id
    }
}

/// Similarity nudged up for prevalent conditions and down for rare diseases, capped at 1.
pub fn confidence(similarity: f64, prevalence: f64, is_rare_disease: bool) -> f64 {
    let prevalence_factor = (prevalence * 10.0).min(1.0);
    let mut confidence = similarity * (0.9 + 0.1 * prevalence_factor);
    if is_rare_disease {
        confidence *= 0.9;
    }
    confidence.min(1.0)
}

/// `prior*lik / (prior*lik + (1-prior)*(1-lik))`; a zero denominator yields 0.
pub fn probability(prior: f64, likelihood: f64) -> f64 {
    let numerator = prior * likelihood;
    let denominator = numerator + (1.0 - prior) * (1.0 - likelihood);
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Which condition symptoms may be reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingFrom {
    TypicalAndRare,
    TypicalOnly,
}

/// Case-insensitive containment in either direction between patient terms and
/// the condition's typical and rare symptoms.
pub fn compare_symptoms(
    patient_terms: &[String],
    condition: &MedicalCondition,
    missing_from: MissingFrom,
) -> (Vec<String>, Vec<String>) {
    let lowered_terms: Vec<String> = patient_terms.iter().map(|t| t.to_lowercase()).collect();

    let mut matching: Vec<String> = Vec::new();
    for symptom in condition.all_symptoms() {
        let lowered = symptom.to_lowercase();
        let hit = lowered_terms
            .iter()
            .any(|term| term.contains(&lowered) || lowered.contains(term.as_str()));
        if hit && !matching.contains(symptom) {
            matching.push(symptom.clone());
        }
    }

    let missing: Vec<String> = match missing_from {
        MissingFrom::TypicalAndRare => condition
            .all_symptoms()
            .filter(|s| !matching.contains(s))
            .take(MISSING_SYMPTOM_CAP)
            .cloned()
            .collect(),
        MissingFrom::TypicalOnly => condition
            .typical_symptoms
            .iter()
            .filter(|s| !matching.contains(s))
            .take(MISSING_SYMPTOM_CAP)
            .cloned()
            .collect(),
    };

    matching.truncate(MATCHING_SYMPTOM_CAP);
    (matching, missing)
}

/// Score line first, then prevalence, then up to two cited sources.
pub fn supporting_evidence(score_line: String, condition: &MedicalCondition) -> Vec<String> {
    let mut evidence = vec![
        score_line,
        format!("Prevalence: {:.6}", condition.prevalence_or_zero()),
    ];
    evidence.extend(condition.evidence_sources.iter().take(EVIDENCE_SOURCE_CAP).cloned());
    evidence
}

/// Scores produced by a strategy for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScores {
    pub similarity: f64,
    pub confidence: f64,
    pub probability: f64,
}

/// Assemble the diagnosis record from a condition and its scores.
pub fn build_diagnosis(
    condition: &MedicalCondition,
    scores: CandidateScores,
    symptoms: (Vec<String>, Vec<String>),
    supporting_evidence: Vec<String>,
) -> ScoredDiagnosis {
    let (matching_symptoms, missing_symptoms) = symptoms;
    let diagnosis = DifferentialDiagnosis {
        condition_id: condition.condition_id.clone(),
        condition_name: condition.condition_name.clone(),
        icd_codes: condition.icd_codes.clone(),
        snomed_codes: condition.snomed_codes.clone(),
        similarity_score: scores.similarity,
        confidence_score: scores.confidence,
        probability: scores.probability,
        matching_symptoms,
        missing_symptoms,
        supporting_evidence,
        urgency_level: condition.urgency_level,
        distinguishing_features: condition.distinguishing_features.clone(),
        diagnostic_criteria_met: condition.diagnostic_criteria.iter().take(DETAIL_CAP).cloned().collect(),
        recommended_next_steps: condition.recommended_tests.iter().take(DETAIL_CAP).cloned().collect(),
    };
    ScoredDiagnosis {
        diagnosis,
        condition: condition.clone(),
    }
}

/// Scorer for vector-retrieved candidates.
pub struct DiagnosisScorer;

impl DiagnosisScorer {
    pub fn score(candidate: &ScoredCondition, descriptors: &[String]) -> ScoredDiagnosis {
        let condition = &candidate.condition;
        let prevalence = condition.prevalence_or_zero();
        let scores = CandidateScores {
            similarity: candidate.similarity,
            confidence: confidence(candidate.similarity, prevalence, condition.is_rare_disease)
                .clamp(0.0, 1.0),
            probability: probability(prevalence, candidate.similarity),
        };
        let symptoms = compare_symptoms(descriptors, condition, MissingFrom::TypicalAndRare);
        let evidence = supporting_evidence(
            format!("Vector similarity score: {:.2}", candidate.similarity),
            condition,
        );
        build_diagnosis(condition, scores, symptoms, evidence)
    }
}
