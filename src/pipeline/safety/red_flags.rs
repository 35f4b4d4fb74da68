//! Deterministic emergency screen.
//!
//! Runs on the raw case before any provider call. Independent of retrieval
//! and scoring: a non-empty report forces Tier 1 regardless of confidence.

use serde::{Deserialize, Serialize};

use crate::models::{PatientCase, Severity};

/// Emergency phrases matched as lower-case substrings. Order is reporting order.
pub const RED_FLAG_KEYWORDS: &[&str] = &[
    "chest pain",
    "severe headache",
    "difficulty breathing",
    "shortness of breath",
    "loss of consciousness",
    "seizure",
    "stroke",
    "paralysis",
    "severe bleeding",
    "severe abdominal pain",
    "sudden vision loss",
    "confusion",
    "altered mental status",
    "severe trauma",
    "choking",
    "anaphylaxis",
    "suicide",
    "severe burn",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlagReport {
    /// Triggered flags, first occurrence order, no duplicates.
    pub flags: Vec<String>,
}

impl RedFlagReport {
    pub fn requires_emergency_care(&self) -> bool {
        !self.flags.is_empty()
    }

    fn push(&mut self, flag: String) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }
}

pub struct RedFlagScreen;

impl RedFlagScreen {
    /// Check the chief complaint, then each symptom in order.
    pub fn screen(case: &PatientCase) -> RedFlagReport {
        let mut report = RedFlagReport::default();

        let complaint = case.chief_complaint.to_lowercase();
        for keyword in matching_keywords(&complaint) {
            report.push(keyword.to_string());
        }

        for symptom in &case.symptoms {
            let description = symptom.description.to_lowercase();
            for keyword in matching_keywords(&description) {
                report.push(keyword.to_string());
            }
            if symptom.severity == Severity::Critical {
                report.push(format!("Critical severity: {}", symptom.description));
            }
        }

        if report.requires_emergency_care() {
            let flag_count = report.flags.len();
            tracing::warn!(
                case_id = %case.case_id,
                flag_count,
                "Red flags detected"
            );
        }
        report
    }
}

fn matching_keywords(lowered: &str) -> impl Iterator<Item = &'static str> + '_ {
    RED_FLAG_KEYWORDS
        .iter()
        .copied()
        .filter(move |keyword| lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sex, SymptomInput};

    fn case_with(complaint: &str, symptoms: Vec<SymptomInput>) -> PatientCase {
        PatientCase {
            case_id: "case_rf".into(),
            patient_id: None,
            age: 60,
            sex: Sex::Female,
            chief_complaint: complaint.into(),
            symptoms,
            medical_history: vec![],
            family_history: vec![],
            current_medications: vec![],
            geographic_location: None,
        }
    }

    #[test]
    fn benign_case_has_no_flags() {
        let case = case_with("Mild sore throat", vec![SymptomInput::new("Scratchy throat")]);
        let report = RedFlagScreen::screen(&case);
        assert!(report.flags.is_empty());
        assert!(!report.requires_emergency_care());
    }

    #[test]
    fn chief_complaint_keyword_is_case_insensitive() {
        let case = case_with("Sudden CHEST PAIN at rest", vec![SymptomInput::new("Sweating")]);
        let report = RedFlagScreen::screen(&case);
        assert_eq!(report.flags, vec!["chest pain"]);
        assert!(report.requires_emergency_care());
    }

    #[test]
    fn keyword_in_complaint_and_symptom_reported_once() {
        let case = case_with(
            "chest pain",
            vec![SymptomInput::new("Crushing chest pain radiating to arm")],
        );
        let report = RedFlagScreen::screen(&case);
        assert_eq!(report.flags, vec!["chest pain"]);
    }

    #[test]
    fn multiple_keywords_follow_list_order() {
        let case = case_with(
            "Confusion and severe headache",
            vec![SymptomInput::new("had a seizure this morning")],
        );
        let report = RedFlagScreen::screen(&case);
        assert_eq!(report.flags, vec!["severe headache", "confusion", "seizure"]);
    }

    #[test]
    fn critical_severity_adds_annotated_flag() {
        let case = case_with(
            "Feeling unwell",
            vec![SymptomInput::new("Vomiting blood").with_severity(Severity::Critical)],
        );
        let report = RedFlagScreen::screen(&case);
        assert_eq!(report.flags, vec!["Critical severity: Vomiting blood"]);
        assert!(report.requires_emergency_care());
    }

    #[test]
    fn severe_chest_pain_scenario() {
        let case = case_with(
            "severe chest pain",
            vec![SymptomInput::new("Pressure in chest").with_severity(Severity::Critical)],
        );
        let report = RedFlagScreen::screen(&case);
        assert!(report.flags.contains(&"chest pain".to_string()));
        assert!(report
            .flags
            .contains(&"Critical severity: Pressure in chest".to_string()));
    }

    #[test]
    fn duplicate_critical_descriptions_deduplicated() {
        let case = case_with(
            "Unwell",
            vec![
                SymptomInput::new("Fainting").with_severity(Severity::Critical),
                SymptomInput::new("Fainting").with_severity(Severity::Critical),
            ],
        );
        assert_eq!(RedFlagScreen::screen(&case).flags.len(), 1);
    }
}
