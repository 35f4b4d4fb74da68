use std::cmp::Ordering;

use super::scoring::ScoredDiagnosis;
use crate::models::DifferentialDiagnosis;

pub struct Ranker;

impl Ranker {
    /// Common then rare, stable-sorted by descending confidence.
    /// Ties keep retrieval order.
    pub fn rank(common: Vec<ScoredDiagnosis>, rare: Vec<ScoredDiagnosis>) -> Vec<ScoredDiagnosis> {
        let mut all = common;
        all.extend(rare);
        all.sort_by(|a, b| b.confidence().partial_cmp(&a.confidence()).unwrap_or(Ordering::Equal));
        all
    }

    /// Externally visible prefix of the ranked list.
    pub fn visible(ranked: &[ScoredDiagnosis], limit: usize) -> Vec<DifferentialDiagnosis> {
        ranked.iter().take(limit).map(|s| s.diagnosis.clone()).collect()
    }

    /// Ranked entries whose condition came back from the rare-disease pass.
    pub fn rare_considered(
        ranked: &[ScoredDiagnosis],
        rare_ids: &[String],
        cap: usize,
    ) -> Vec<DifferentialDiagnosis> {
        ranked
            .iter()
            .filter(|s| rare_ids.iter().any(|id| id == s.condition_id()))
            .take(cap)
            .map(|s| s.diagnosis.clone())
            .collect()
    }
}
