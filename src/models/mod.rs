pub mod enums;
pub mod case;
pub mod condition;
pub mod result;

pub use case::{PatientCase, SymptomInput, ValidationError};
pub use condition::{load_conditions_json, MedicalCondition};
pub use enums::{Frequency, ReviewTier, Severity, Sex, UrgencyLevel};
pub use result::{DiagnosticResult, DifferentialDiagnosis};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Knowledge base parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
