use super::scoring::ScoredDiagnosis;

/// Alternatives named after the top diagnosis.
const ALTERNATIVES_NAMED: usize = 3;

pub struct ReasoningNarrator;

impl ReasoningNarrator {
    /// Fixed-template summary of the ranked outcome.
    ///
    /// `basis` completes "based on ..." and names how candidates were ranked.
    pub fn narrate(
        chief_complaint: &str,
        symptom_count: usize,
        ranked: &[ScoredDiagnosis],
        basis: &str,
    ) -> String {
        let mut parts = vec![
            format!("Patient presents with {chief_complaint}."),
            format!("Analysis of {symptom_count} reported symptoms reveals:"),
        ];

        match ranked.split_first() {
            Some((top, rest)) => {
                parts.push(format!(
                    "Most likely diagnosis is {} with {:.1}% confidence, based on {basis}.",
                    top.diagnosis.condition_name,
                    top.confidence() * 100.0
                ));
                if !rest.is_empty() {
                    let others: Vec<&str> = rest
                        .iter()
                        .take(ALTERNATIVES_NAMED)
                        .map(|s| s.diagnosis.condition_name.as_str())
                        .collect();
                    parts.push(format!(
                        "Differential diagnoses to consider: {}.",
                        others.join(", ")
                    ));
                }
            }
            None => parts.push(
                "Unable to identify a high-confidence diagnosis. Recommend specialist consultation."
                    .to_string(),
            ),
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicalCondition;
    use crate::pipeline::diagnosis::scoring::{build_diagnosis, CandidateScores};

    fn scored(name: &str, confidence: f64) -> ScoredDiagnosis {
        build_diagnosis(
            &MedicalCondition::new(name.to_lowercase(), name),
            CandidateScores {
                similarity: confidence,
                confidence,
                probability: 0.0,
            },
            (vec![], vec![]),
            vec![],
        )
    }

    const BASIS: &str = "symptom pattern matching and clinical presentation";

    #[test]
    fn empty_ranking_recommends_consultation() {
        let text = ReasoningNarrator::narrate("fatigue", 3, &[], BASIS);
        assert_eq!(
            text,
            "Patient presents with fatigue. Analysis of 3 reported symptoms reveals: \
             Unable to identify a high-confidence diagnosis. Recommend specialist consultation."
        );
    }

    #[test]
    fn single_diagnosis_has_no_differential_sentence() {
        let text = ReasoningNarrator::narrate("cough", 2, &[scored("Bronchitis", 0.7234)], BASIS);
        assert_eq!(
            text,
            "Patient presents with cough. Analysis of 2 reported symptoms reveals: \
             Most likely diagnosis is Bronchitis with 72.3% confidence, based on \
             symptom pattern matching and clinical presentation."
        );
    }

    #[test]
    fn names_at_most_three_alternatives() {
        let ranked: Vec<ScoredDiagnosis> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|n| scored(n, 0.5))
            .collect();
        let text = ReasoningNarrator::narrate("x", 1, &ranked, "keyword matching of reported symptoms");
        assert!(text.ends_with("Differential diagnoses to consider: B, C, D."));
        assert!(text.contains("based on keyword matching of reported symptoms."));
    }
}
