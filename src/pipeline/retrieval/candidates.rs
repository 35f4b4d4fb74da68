use super::{ConditionIndex, ScoredCondition, SearchFilter};
use crate::config::EngineConfig;
use crate::pipeline::{CancellationFlag, DiagnosticError};

/// Hits from the two retrieval passes, kept apart so rare-pass membership can be reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    pub common: Vec<ScoredCondition>,
    pub rare: Vec<ScoredCondition>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.common.len() + self.rare.len()
    }

    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && self.rare.is_empty()
    }

    /// Condition ids returned by the rare-disease pass.
    pub fn rare_ids(&self) -> Vec<String> {
        self.rare.iter().map(|c| c.condition.condition_id.clone()).collect()
    }
}

/// Two-pass retrieval: common conditions, then (optionally) rare diseases.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRetriever {
    pub common_score_threshold: f64,
    pub common_limit: usize,
    pub common_min_prevalence: f64,
    pub rare_enabled: bool,
    pub rare_score_threshold: f64,
    pub rare_limit: usize,
}

impl CandidateRetriever {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            common_score_threshold: config.common_score_threshold,
            common_limit: config.top_k_candidates,
            common_min_prevalence: config.common_min_prevalence,
            rare_enabled: config.enable_rare_disease_detection,
            rare_score_threshold: config.rare_score_threshold,
            rare_limit: config.rare_result_limit,
        }
    }

    /// Run both passes with the same query. `cancel` is checked before each search.
    pub fn retrieve<I: ConditionIndex + ?Sized>(
        &self,
        index: &I,
        query: &[f32],
        cancel: &CancellationFlag,
    ) -> Result<CandidateSet, DiagnosticError> {
        cancel.check()?;
        let common = index.search(
            query,
            self.common_limit,
            self.common_score_threshold,
            &SearchFilter::common(self.common_min_prevalence),
        )?;

        let rare = if self.rare_enabled {
            cancel.check()?;
            index.search(query, self.rare_limit, self.rare_score_threshold, &SearchFilter::rare())?
        } else {
            Vec::new()
        };

        tracing::debug!(common = common.len(), rare = rare.len(), "Candidates retrieved");
        Ok(CandidateSet { common, rare })
    }
}
