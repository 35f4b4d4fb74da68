use serde::{Deserialize, Serialize};

use super::scoring::ScoredDiagnosis;

/// Diagnoses considered for referrals and tests.
pub const RECOMMENDATION_DEPTH: usize = 3;
pub const RECOMMENDED_TEST_CAP: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub specialists: Vec<String>,
    pub tests: Vec<String>,
}

pub struct RecommendationAggregator;

impl RecommendationAggregator {
    /// Deduplicated referrals and next steps from the top ranked diagnoses, in insertion order.
    pub fn aggregate(ranked: &[ScoredDiagnosis]) -> Recommendations {
        let mut recs = Recommendations::default();
        for scored in ranked.iter().take(RECOMMENDATION_DEPTH) {
            if let Some(specialist) = scored.condition.specialist_referral.as_ref() {
                if !specialist.is_empty() && !recs.specialists.contains(specialist) {
                    recs.specialists.push(specialist.clone());
                }
            }
            for test in &scored.diagnosis.recommended_next_steps {
                if !recs.tests.contains(test) {
                    recs.tests.push(test.clone());
                }
            }
        }
        recs.tests.truncate(RECOMMENDED_TEST_CAP);
        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicalCondition;
    use crate::pipeline::diagnosis::scoring::{build_diagnosis, CandidateScores};

    fn scored(id: &str, specialist: Option<&str>, tests: &[&str]) -> ScoredDiagnosis {
        let mut c = MedicalCondition::new(id, id);
        c.specialist_referral = specialist.map(String::from);
        c.recommended_tests = tests.iter().map(|s| s.to_string()).collect();
        build_diagnosis(
            &c,
            CandidateScores {
                similarity: 0.5,
                confidence: 0.5,
                probability: 0.0,
            },
            (vec![], vec![]),
            vec![],
        )
    }

    #[test]
    fn empty_ranking_recommends_nothing() {
        assert_eq!(RecommendationAggregator::aggregate(&[]), Recommendations::default());
    }

    #[test]
    fn specialists_deduplicated_in_order() {
        let ranked = vec![
            scored("a", Some("Cardiology"), &[]),
            scored("b", None, &[]),
            scored("c", Some("Cardiology"), &[]),
        ];
        let recs = RecommendationAggregator::aggregate(&ranked);
        assert_eq!(recs.specialists, vec!["Cardiology"]);
    }

    #[test]
    fn only_top_three_contribute() {
        let ranked = vec![
            scored("a", Some("A"), &["t1"]),
            scored("b", Some("B"), &["t2"]),
            scored("c", Some("C"), &["t3"]),
            scored("d", Some("D"), &["t4"]),
        ];
        let recs = RecommendationAggregator::aggregate(&ranked);
        assert_eq!(recs.specialists, vec!["A", "B", "C"]);
        assert_eq!(recs.tests, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn tests_deduplicated_and_capped_at_five() {
        let ranked = vec![
            scored("a", None, &["ECG", "Troponin", "CXR"]),
            scored("b", None, &["ECG", "D-dimer", "CT"]),
            scored("c", None, &["Echo", "MRI"]),
        ];
        let recs = RecommendationAggregator::aggregate(&ranked);
        assert_eq!(recs.tests, vec!["ECG", "Troponin", "CXR", "D-dimer", "CT"]);
    }
}
