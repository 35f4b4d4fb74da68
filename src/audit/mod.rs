//! Per-analysis audit trail.
//!
//! The orchestrator hands every completed analysis to an `AuditSink` with the
//! raw case. Anonymization is the sink's concern, never the caller's.

pub mod anonymize;
mod phi_scan;
pub mod sink;

pub use anonymize::AnonymizationPolicy;
pub use sink::{JsonlAuditSink, MemoryAuditSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DiagnosticResult, PatientCase, ReviewTier};

pub const ACTION_DIAGNOSTIC_ANALYSIS: &str = "diagnostic_analysis";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pseudonym derivation failed")]
    KeyDerivation,

    #[error("Audit buffer lock poisoned")]
    LockPoisoned,
}

/// Who requested the analysis. Both fields are opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub user_id: Option<String>,
    pub user_role: Option<String>,
}

impl CallerContext {
    pub fn new(user_id: impl Into<String>, user_role: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            user_role: Some(user_role.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Decision-level summary of a result, without the per-diagnosis detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSummary {
    pub review_tier: ReviewTier,
    pub overall_confidence: f64,
    pub top_diagnosis: Option<String>,
    pub primary_diagnosis: Option<String>,
    pub num_differential_diagnoses: usize,
    pub red_flags_detected: Vec<String>,
    pub requires_emergency_care: bool,
}

impl OutputSummary {
    pub fn from_result(result: &DiagnosticResult) -> Self {
        Self {
            review_tier: result.review_tier,
            overall_confidence: result.overall_confidence,
            top_diagnosis: result.top_diagnosis().map(|d| d.condition_name.clone()),
            primary_diagnosis: result.primary_diagnosis.as_ref().map(|d| d.condition_name.clone()),
            num_differential_diagnoses: result.differential_diagnoses.len(),
            red_flags_detected: result.red_flags_detected.clone(),
            requires_emergency_care: result.requires_emergency_care,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: String,
    pub case_id: String,
    pub result_id: String,
    pub action_type: String,
    pub caller: CallerContext,
    pub input: PatientCase,
    pub output: OutputSummary,
    /// Similarity of every scored candidate, in ranked order.
    pub similarity_scores: Vec<f64>,
    pub data_anonymized: bool,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn diagnostic_analysis(
        case: &PatientCase,
        result: &DiagnosticResult,
        caller: &CallerContext,
        similarity_scores: Vec<f64>,
    ) -> Self {
        Self {
            audit_id: new_audit_id(),
            case_id: case.case_id.clone(),
            result_id: result.result_id.clone(),
            action_type: ACTION_DIAGNOSTIC_ANALYSIS.to_string(),
            caller: caller.clone(),
            input: case.clone(),
            output: OutputSummary::from_result(result),
            similarity_scores,
            data_anonymized: false,
            timestamp: Utc::now(),
        }
    }
}

/// "audit_" followed by 16 hex characters.
pub fn new_audit_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("audit_{}", &hex[..16])
}

/// Destination for audit records. Returns the stored record's id.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<String, AuditError>;
}
