//! Candidate retrieval and scoring variants.
//!
//! `EmbeddingStrategy` searches a vector index with the constellation
//! embedding. `KeywordStrategy` scores every catalog entry by substring
//! overlap and needs no embedding provider. Both feed the same ranking,
//! tiering and reporting stages.

use std::cmp::Ordering;

use super::scoring::{
    build_diagnosis, compare_symptoms, probability, supporting_evidence,
    CandidateScores, DiagnosisScorer, MissingFrom, ScoredDiagnosis,
};
use crate::config::EngineConfig;
use crate::models::{MedicalCondition, PatientCase};
use crate::pipeline::embedding::{ConstellationEncoder, EmbeddingModel};
use crate::pipeline::normalize::NormalizedSymptoms;
use crate::pipeline::retrieval::{
    CandidateRetriever, CandidateSet, ConditionCatalog, ConditionIndex, IndexError,
    ScoredCondition, SearchFilter,
};
use crate::pipeline::{CancellationFlag, DiagnosticError};

/// Raw keyword score mapped to confidence by dividing by this and capping at 1.
const KEYWORD_SCORE_SCALE: f64 = 10.0;

pub trait CandidateStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Completes "based on ..." in the reasoning summary.
    fn basis(&self) -> &'static str;

    /// Common and rare candidate passes. Checks `cancel` before each external call.
    fn retrieve(
        &self,
        case: &PatientCase,
        symptoms: &NormalizedSymptoms,
        cancel: &CancellationFlag,
    ) -> Result<CandidateSet, DiagnosticError>;

    fn score(
        &self,
        candidate: &ScoredCondition,
        case: &PatientCase,
        symptoms: &NormalizedSymptoms,
    ) -> ScoredDiagnosis;
}

// ═══════════════════════════════════════════
// Embedding strategy
// ═══════════════════════════════════════════

pub struct EmbeddingStrategy<E, I> {
    embedder: E,
    index: I,
    retriever: CandidateRetriever,
}

impl<E: EmbeddingModel, I: ConditionIndex> EmbeddingStrategy<E, I> {
    pub fn new(embedder: E, index: I, retriever: CandidateRetriever) -> Self {
        Self {
            embedder,
            index,
            retriever,
        }
    }

    pub fn from_config(config: &EngineConfig, embedder: E, index: I) -> Self {
        Self::new(embedder, index, CandidateRetriever::from_config(config))
    }
}

impl<E: EmbeddingModel, I: ConditionIndex> CandidateStrategy for EmbeddingStrategy<E, I> {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn basis(&self) -> &'static str {
        "symptom pattern matching and clinical presentation"
    }

    fn retrieve(
        &self,
        _case: &PatientCase,
        symptoms: &NormalizedSymptoms,
        cancel: &CancellationFlag,
    ) -> Result<CandidateSet, DiagnosticError> {
        cancel.check()?;
        let query = ConstellationEncoder::encode(&self.embedder, symptoms)?;
        self.retriever.retrieve(&self.index, &query, cancel)
    }

    fn score(
        &self,
        candidate: &ScoredCondition,
        _case: &PatientCase,
        symptoms: &NormalizedSymptoms,
    ) -> ScoredDiagnosis {
        DiagnosisScorer::score(candidate, symptoms.descriptors())
    }
}

// ═══════════════════════════════════════════
// Keyword strategy
// ═══════════════════════════════════════════

pub struct KeywordStrategy<C> {
    catalog: C,
    common_limit: usize,
    rare_enabled: bool,
    rare_limit: usize,
}

impl<C: ConditionCatalog> KeywordStrategy<C> {
    pub fn from_config(config: &EngineConfig, catalog: C) -> Self {
        Self {
            catalog,
            common_limit: config.top_k_candidates,
            rare_enabled: config.enable_rare_disease_detection,
            rare_limit: config.rare_result_limit,
        }
    }

    /// Positive-scoring conditions, best first, at most `limit`.
    fn search(
        &self,
        keywords: &[String],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ScoredCondition>, IndexError> {
        let mut hits: Vec<ScoredCondition> = self
            .catalog
            .conditions(filter)?
            .into_iter()
            .filter_map(|condition| {
                let score = keyword_match_score(keywords, &condition);
                (score > 0.0).then_some(ScoredCondition {
                    condition,
                    similarity: score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

impl<C: ConditionCatalog> CandidateStrategy for KeywordStrategy<C> {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn basis(&self) -> &'static str {
        "keyword matching of reported symptoms"
    }

    fn retrieve(
        &self,
        case: &PatientCase,
        _symptoms: &NormalizedSymptoms,
        cancel: &CancellationFlag,
    ) -> Result<CandidateSet, DiagnosticError> {
        let keywords = symptom_keywords(case);

        cancel.check()?;
        let common_filter = SearchFilter {
            rare_disease: Some(false),
            ..SearchFilter::default()
        };
        let common = self.search(&keywords, &common_filter, self.common_limit)?;

        let rare = if self.rare_enabled {
            cancel.check()?;
            self.search(&keywords, &SearchFilter::rare(), self.rare_limit)?
        } else {
            Vec::new()
        };

        tracing::debug!(common = common.len(), rare = rare.len(), "Keyword candidates scored");
        Ok(CandidateSet { common, rare })
    }

    /// `candidate.similarity` carries the raw keyword score.
    fn score(
        &self,
        candidate: &ScoredCondition,
        case: &PatientCase,
        _symptoms: &NormalizedSymptoms,
    ) -> ScoredDiagnosis {
        let condition = &candidate.condition;
        let raw = candidate.similarity;
        let confidence = (raw / KEYWORD_SCORE_SCALE).min(1.0);
        let scores = CandidateScores {
            similarity: confidence,
            confidence,
            probability: probability(condition.prevalence_or_zero(), confidence),
        };
        let symptoms = compare_symptoms(&symptom_keywords(case), condition, MissingFrom::TypicalOnly);
        let evidence = supporting_evidence(format!("Keyword match score: {raw:.2}"), condition);
        build_diagnosis(condition, scores, symptoms, evidence)
    }
}

/// Lower-cased, trimmed chief complaint followed by each symptom description.
pub fn symptom_keywords(case: &PatientCase) -> Vec<String> {
    std::iter::once(case.chief_complaint.as_str())
        .chain(case.symptoms.iter().map(|s| s.description.as_str()))
        .map(|text| text.trim().to_lowercase())
        .collect()
}

/// Weighted substring overlap between keywords and a condition's symptom lists.
///
/// Per keyword: 2.0 for the first overlapping red-flag symptom; per rare symptom
/// 1.5 exact or 1.0 partial; per typical symptom 1.0 exact or 0.5 partial.
/// Prevalent conditions get up to a 20% boost, then the total is divided by
/// the square root of the typical-symptom count.
pub fn keyword_match_score(keywords: &[String], condition: &MedicalCondition) -> f64 {
    let normalize = |items: &[String]| -> Vec<String> {
        items.iter().map(|s| s.trim().to_lowercase()).collect()
    };
    let typical = normalize(&condition.typical_symptoms);
    let rare = normalize(&condition.rare_symptoms);
    let red_flags = normalize(&condition.red_flag_symptoms);

    let overlaps = |a: &str, b: &str| a.contains(b) || b.contains(a);

    let mut score = 0.0;
    for keyword in keywords {
        if red_flags.iter().any(|flag| overlaps(keyword, flag)) {
            score += 2.0;
        }
        for symptom in &rare {
            if keyword == symptom {
                score += 1.5;
            } else if overlaps(keyword, symptom) {
                score += 1.0;
            }
        }
        for symptom in &typical {
            if keyword == symptom {
                score += 1.0;
            } else if overlaps(keyword, symptom) {
                score += 0.5;
            }
        }
    }

    if let Some(prevalence) = condition.prevalence.filter(|p| *p > 0.0) {
        score += score * (prevalence * 2.0).min(0.2);
    }
    if !typical.is_empty() {
        score /= (typical.len() as f64).sqrt();
    }
    score
}
