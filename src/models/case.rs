use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::{Frequency, Severity, Sex};

/// Oldest age accepted on intake.
pub const MAX_AGE: u16 = 150;
/// Bounds on a symptom description, counted in characters after trimming.
pub const MIN_DESCRIPTION_CHARS: usize = 3;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// A patient-reported symptom as entered on intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomInput {
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub onset_date: Option<NaiveDate>,
}

impl SymptomInput {
    /// Symptom with default severity/frequency and no optional detail.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            severity: Severity::default(),
            frequency: Frequency::default(),
            duration_days: None,
            location: None,
            onset_date: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.duration_days = Some(days);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// De-identified case submitted for analysis. Immutable once the pipeline starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientCase {
    pub case_id: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    pub age: u16,
    pub sex: Sex,
    pub chief_complaint: String,
    pub symptoms: Vec<SymptomInput>,
    #[serde(default)]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub family_history: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub geographic_location: Option<String>,
}

/// Structural problems with a case, detected before any provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("At least one symptom is required")]
    NoSymptoms,

    #[error("Too many symptoms: {count} (maximum {max})")]
    TooManySymptoms { count: usize, max: usize },

    #[error("Age {0} is outside 0-150")]
    AgeOutOfRange(u16),

    #[error("Chief complaint is empty")]
    EmptyChiefComplaint,

    #[error("Symptom {index} description has {chars} characters (allowed 3-1000)")]
    DescriptionLength { index: usize, chars: usize },
}

impl PatientCase {
    /// Check the structural invariants of the case.
    pub fn validate(&self, max_symptoms: usize) -> Result<(), ValidationError> {
        if self.symptoms.is_empty() {
            return Err(ValidationError::NoSymptoms);
        }
        if self.symptoms.len() > max_symptoms {
            return Err(ValidationError::TooManySymptoms {
                count: self.symptoms.len(),
                max: max_symptoms,
            });
        }
        if self.age > MAX_AGE {
            return Err(ValidationError::AgeOutOfRange(self.age));
        }
        if self.chief_complaint.trim().is_empty() {
            return Err(ValidationError::EmptyChiefComplaint);
        }
        for (index, symptom) in self.symptoms.iter().enumerate() {
            let chars = symptom.description.trim().chars().count();
            if !(MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&chars) {
                return Err(ValidationError::DescriptionLength { index, chars });
            }
        }
        Ok(())
    }
}
